//! Integration tests against a small hand-written merge list.
//!
//! The fixture merges build exactly "hello</w>" and "world</w>", so expected
//! IDs can be read off the file: merges start at 512 and the control tokens
//! follow the eight merges.

use std::path::PathBuf;

use clip_bpe::core::clean_text;
use clip_bpe::{Tokenizer, TokenizerError, VocabError, CONTEXT_LENGTH, PAD_ID};

const HELLO: u32 = 515;
const WORLD: u32 = 519;
const START: u32 = 520;
const END: u32 = 521;

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join("hello_world_merges.txt")
}

fn create_tokenizer() -> Tokenizer {
    Tokenizer::from_file_with_merge_count(fixture_path(), 8).unwrap()
}

/// Test the canonical two-word scenario.
#[test]
fn test_hello_world() {
    let tokenizer = create_tokenizer();

    let tokens = tokenizer.encode("Hello World");
    assert_eq!(tokens, vec![HELLO, WORLD]);
    assert_eq!(tokenizer.decode(&tokens).unwrap(), "hello world ");
}

/// Test that cleaning makes case, whitespace and entities irrelevant.
#[test]
fn test_cleaning_is_applied() {
    let tokenizer = create_tokenizer();

    for text in ["hello world", "  HELLO \n\t World ", "hello&nbsp;world", "Hello&amp;nbsp;WORLD"] {
        assert_eq!(tokenizer.encode(text), vec![HELLO, WORLD], "input: {:?}", text);
    }
}

/// Test that decoding reproduces the cleaned chunks, one space after each.
#[test]
fn test_encode_decode_roundtrip() {
    let tokenizer = create_tokenizer();

    let test_cases = [
        "Hello World",
        "The quick brown fox",
        "jumps over 13 lazy dogs",
        "hello hello world",
        "  Spaced   OUT  ",
    ];

    for text in test_cases {
        let cleaned = clean_text(text);
        let expected: String = tokenizer
            .pre_tokenizer()
            .segment(&cleaned)
            .map(|chunk| format!("{chunk} "))
            .collect();

        let decoded = tokenizer.decode(&tokenizer.encode(text)).unwrap();
        assert_eq!(decoded, expected, "Roundtrip failed for: {:?}", text);
        assert_eq!(decoded.trim_end(), cleaned.replace("13", "1 3"));
    }
}

/// Test the fixed-length packing.
#[test]
fn test_encode_for_clip_layout() {
    let tokenizer = create_tokenizer();

    let packed = tokenizer.encode_for_clip("Hello World");
    assert_eq!(packed.len(), CONTEXT_LENGTH);
    assert_eq!(packed[0], START);
    assert_eq!(&packed[1..4], &[HELLO, WORLD, END]);
    assert!(packed[4..].iter().all(|&id| id == PAD_ID));

    let empty = tokenizer.encode_for_clip("");
    assert_eq!(&empty[..2], &[START, END]);
    assert!(empty[2..].iter().all(|&id| id == PAD_ID));
}

/// Test that long inputs keep 75 content tokens.
#[test]
fn test_encode_for_clip_truncates() {
    let tokenizer = create_tokenizer();

    let text = "hello ".repeat(100);
    let packed = tokenizer.encode_for_clip(&text);
    assert_eq!(packed[0], START);
    assert!(packed[1..CONTEXT_LENGTH - 1].iter().all(|&id| id == HELLO));
    assert_eq!(packed[CONTEXT_LENGTH - 1], END);
}

/// Test exactly 75 content tokens: everything fits and the end token is last.
#[test]
fn test_encode_for_clip_exact_fit() {
    let tokenizer = create_tokenizer();

    let text = format!("{}world", "hello ".repeat(74));
    assert_eq!(tokenizer.encode(&text).len(), CONTEXT_LENGTH - 2);

    let packed = tokenizer.encode_for_clip(&text);
    assert_eq!(packed[0], START);
    assert!(packed[1..CONTEXT_LENGTH - 2].iter().all(|&id| id == HELLO));
    assert_eq!(packed[CONTEXT_LENGTH - 2], WORLD);
    assert_eq!(packed[CONTEXT_LENGTH - 1], END);
}

/// Test 76 content tokens: the last one is dropped to make room for the end token.
#[test]
fn test_encode_for_clip_one_over() {
    let tokenizer = create_tokenizer();

    let text = format!("{}world", "hello ".repeat(75));
    assert_eq!(tokenizer.encode(&text).len(), CONTEXT_LENGTH - 1);

    let packed = tokenizer.encode_for_clip(&text);
    assert_eq!(packed[0], START);
    assert!(packed[1..CONTEXT_LENGTH - 1].iter().all(|&id| id == HELLO));
    assert_eq!(packed[CONTEXT_LENGTH - 1], END);
    assert!(!packed.contains(&WORLD));
}

/// Test legacy entities without a semicolon are decoded before encoding.
#[test]
fn test_legacy_entities() {
    let tokenizer = create_tokenizer();

    assert_eq!(tokenizer.encode("hello &amp world"), tokenizer.encode("hello & world"));
    assert_eq!(tokenizer.encode("hello&nbsp world"), vec![HELLO, WORLD]);
    assert_eq!(tokenizer.encode("\u{feff}hello world"), vec![HELLO, WORLD]);
}

/// Test characters above U+00FF go through their UTF-8 bytes.
#[test]
fn test_wide_characters() {
    let tokenizer = create_tokenizer();

    // E6 9D B1: 'æ', the synthetic symbol for 0x9D, then '±</w>'
    let tokens = tokenizer.encode("東");
    assert_eq!(tokens, vec![162, 251, 365]);
    assert_eq!(tokenizer.decode_lossy(&tokens).unwrap(), "東 ");
    assert_eq!(tokenizer.decode(&tokens).unwrap(), "æ\u{9d}± ");
}

/// Test Latin-1 characters map by code point.
#[test]
fn test_latin1_characters() {
    let tokenizer = create_tokenizer();

    let tokens = tokenizer.encode("É");
    assert_eq!(tokens, vec![421]);
    assert_eq!(tokenizer.id_to_token(421), Some("é</w>"));
    assert_eq!(tokenizer.decode(&tokens).unwrap(), "é ");
    assert_eq!(tokenizer.decode_bytes(&tokens).unwrap(), vec![0xE9, b' ']);
}

/// Test every ID decodes and maps back to itself.
#[test]
fn test_vocabulary_bijection() {
    let tokenizer = create_tokenizer();

    assert_eq!(tokenizer.vocab_size(), 522);
    for id in 0..tokenizer.vocab_size() as u32 {
        let token = tokenizer.id_to_token(id).unwrap();
        assert_eq!(tokenizer.token_to_id(token), Some(id));
    }
    assert_eq!(tokenizer.id_to_token(522), None);
}

/// Test that the control tokens survive encoding and decoding verbatim.
#[test]
fn test_control_tokens() {
    let tokenizer = create_tokenizer();

    let tokens = tokenizer.encode("<|startoftext|>Hello<|endoftext|>");
    assert_eq!(tokens, vec![START, HELLO, END]);
    assert_eq!(
        tokenizer.decode(&tokens).unwrap(),
        "<|startoftext|>hello <|endoftext|>"
    );
}

/// Test that the merge memo is shared by threads and stays consistent.
#[test]
fn test_shared_across_threads() {
    let tokenizer = create_tokenizer();
    let expected = tokenizer.clone().encode("hello world help");

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| tokenizer.encode("hello world help")))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });

    // two control tokens plus three distinct chunks
    assert_eq!(tokenizer.cache_len(), 5);
}

/// Test batch helpers agree with single calls.
#[test]
fn test_batch_matches_individual() {
    let tokenizer = create_tokenizer();

    let texts = vec![
        "Hello World".to_string(),
        "world hello".to_string(),
        "".to_string(),
    ];

    let batch = tokenizer.encode_batch(&texts);
    for (text, tokens) in texts.iter().zip(&batch) {
        assert_eq!(tokens, &tokenizer.encode(text));
    }

    let packed = tokenizer.encode_for_clip_batch(&texts);
    assert_eq!(packed[1][..4], [START, WORLD, HELLO, END]);

    let decoded = tokenizer.decode_batch(&batch).unwrap();
    assert_eq!(decoded, vec!["hello world ", "world hello ", ""]);
}

/// Test that unknown IDs are reported rather than skipped.
#[test]
fn test_decode_unknown_id() {
    let tokenizer = create_tokenizer();

    let err = tokenizer.decode(&[HELLO, 100_000]).unwrap_err();
    assert!(matches!(err, TokenizerError::UnknownToken(100_000)));
}

/// Test construction failures surface immediately.
#[test]
fn test_construction_errors() {
    // The fixture is far shorter than the CLIP merge list.
    let data = std::fs::read(fixture_path()).unwrap();
    let err = Tokenizer::from_reader(data.as_slice()).err().unwrap();
    assert!(matches!(
        err,
        TokenizerError::Vocab(VocabError::TooFewMerges { found: 8, .. })
    ));

    let err = Tokenizer::from_file("does/not/exist.txt").err().unwrap();
    assert!(matches!(err, TokenizerError::Vocab(VocabError::Io(_))));

    let err = Tokenizer::with_merge_count("#version: 0.2\nhe\n", 1).err().unwrap();
    assert!(matches!(
        err,
        TokenizerError::Vocab(VocabError::MalformedMerge { line: 2, .. })
    ));
}
