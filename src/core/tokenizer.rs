use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::io::Read;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use super::bpe::byte_pair_merge;
use super::byte_level::{byte_to_char, char_to_byte, chunk_bytes};
use super::pretokenize::{clean_text, PreTokenizer};
use super::vocab::{
    parse_merges, MergeRanks, VocabError, Vocabulary, CLIP_MERGE_COUNT, END_OF_TEXT, END_OF_WORD,
    START_OF_TEXT,
};

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Vocabulary error: {0}")]
    Vocab(#[from] VocabError),
    #[error("Regex compilation error: {0}")]
    Regex(#[from] regex::Error),
    #[error("Unknown token id: {0}")]
    UnknownToken(u32),
    #[error("Character {0:?} is not part of the byte-level alphabet")]
    InvalidSymbol(char),
}

/// ID of `<|startoftext|>` in the CLIP vocabulary.
pub const START_OF_TEXT_ID: u32 = 49406;

/// ID of `<|endoftext|>` in the CLIP vocabulary.
pub const END_OF_TEXT_ID: u32 = 49407;

/// Value used to pad packed sequences.
pub const PAD_ID: u32 = 0;

/// Sequence length expected by the CLIP text encoder.
pub const CONTEXT_LENGTH: usize = 77;

/// Byte-level BPE tokenizer for the CLIP vocabulary.
///
/// Tokenization runs in four steps: text cleaning, pre-tokenization into
/// chunks, byte remapping, and rank-ordered pair merging. Merged chunks are
/// memoized per tokenizer; the memo only grows.
///
/// The tokenizer is `Send + Sync`. The vocabulary and merge table are
/// read-only, the chunk cache sits behind a mutex.
///
/// # Example
///
/// ```
/// use clip_bpe::Tokenizer;
///
/// let merges = "#version: 0.2\nh i</w>\n";
/// let tokenizer = Tokenizer::with_merge_count(merges, 1).unwrap();
/// let tokens = tokenizer.encode("Hi hi");
/// assert_eq!(tokens, vec![tokenizer.token_to_id("hi</w>").unwrap(); 2]);
/// assert_eq!(tokenizer.decode(&tokens).unwrap(), "hi hi ");
/// ```
pub struct Tokenizer {
    vocab: Vocabulary,
    ranks: MergeRanks,
    pre_tokenizer: PreTokenizer,
    /// Vocabulary ID of each byte's base symbol.
    byte_ids: [u32; 256],
    /// Vocabulary ID of each byte's base symbol with the end-of-word marker.
    end_of_word_ids: [u32; 256],
    start_of_text: u32,
    end_of_text: u32,
    chunk_cache: Mutex<FxHashMap<Vec<u8>, Vec<u32>>>,
}

impl Tokenizer {
    /// Create a tokenizer from the CLIP merge list, keeping its first
    /// [`CLIP_MERGE_COUNT`] merges.
    pub fn new(merges: &str) -> Result<Self, TokenizerError> {
        Self::with_merge_count(merges, CLIP_MERGE_COUNT)
    }

    /// Create a tokenizer from a merge list, keeping its first `merge_count`
    /// merges.
    ///
    /// Fails if the list holds fewer merges or any of them is malformed.
    pub fn with_merge_count(merges: &str, merge_count: usize) -> Result<Self, TokenizerError> {
        let merges = parse_merges(merges, merge_count)?;
        let vocab = Vocabulary::new(&merges);
        let ranks = MergeRanks::new(&vocab, &merges)?;
        let pre_tokenizer = PreTokenizer::new()?;

        let mut byte_ids = [0u32; 256];
        let mut end_of_word_ids = [0u32; 256];
        for byte in 0..=255u8 {
            let symbol = byte_to_char(byte).to_string();
            byte_ids[byte as usize] = base_id(&vocab, &symbol)?;
            end_of_word_ids[byte as usize] = base_id(&vocab, &format!("{symbol}{END_OF_WORD}"))?;
        }

        let start_of_text = base_id(&vocab, START_OF_TEXT)?;
        let end_of_text = base_id(&vocab, END_OF_TEXT)?;

        let mut cache = FxHashMap::default();
        cache.insert(START_OF_TEXT.as_bytes().to_vec(), vec![start_of_text]);
        cache.insert(END_OF_TEXT.as_bytes().to_vec(), vec![end_of_text]);

        log::debug!(
            "tokenizer ready: {} tokens, {} merge rules",
            vocab.len(),
            ranks.len()
        );

        Ok(Self {
            vocab,
            ranks,
            pre_tokenizer,
            byte_ids,
            end_of_word_ids,
            start_of_text,
            end_of_text,
            chunk_cache: Mutex::new(cache),
        })
    }

    /// Create a tokenizer from a CLIP merge list file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TokenizerError> {
        Self::from_file_with_merge_count(path, CLIP_MERGE_COUNT)
    }

    /// Create a tokenizer from a merge list file, keeping `merge_count` merges.
    pub fn from_file_with_merge_count(
        path: impl AsRef<Path>,
        merge_count: usize,
    ) -> Result<Self, TokenizerError> {
        let path = path.as_ref();
        log::debug!("loading merge list from {}", path.display());
        let data = std::fs::read_to_string(path).map_err(VocabError::from)?;
        Self::with_merge_count(&data, merge_count)
    }

    /// Create a tokenizer by reading a CLIP merge list from `reader`.
    pub fn from_reader(mut reader: impl Read) -> Result<Self, TokenizerError> {
        let mut data = String::new();
        reader
            .read_to_string(&mut data)
            .map_err(VocabError::from)?;
        Self::new(&data)
    }

    /// Merge one chunk of raw bytes into vocabulary IDs, with caching.
    fn encode_chunk(&self, bytes: &[u8]) -> Vec<u32> {
        let Some((&last, rest)) = bytes.split_last() else {
            return Vec::new();
        };

        // Control tokens are never remapped or merged.
        if bytes == START_OF_TEXT.as_bytes() {
            return vec![self.start_of_text];
        }
        if bytes == END_OF_TEXT.as_bytes() {
            return vec![self.end_of_text];
        }

        if let Some(cached) = self.lock_cache().get(bytes) {
            return cached.clone();
        }

        log::trace!("bpe cache miss for {} byte chunk", bytes.len());

        let mut word: Vec<u32> = rest.iter().map(|&b| self.byte_ids[b as usize]).collect();
        word.push(self.end_of_word_ids[last as usize]);
        byte_pair_merge(&mut word, &self.ranks);

        self.lock_cache().insert(bytes.to_vec(), word.clone());

        word
    }

    /// Lock the chunk cache. A poisoned lock is recovered: entries are only
    /// ever inserted whole, so the map stays consistent.
    fn lock_cache(&self) -> MutexGuard<'_, FxHashMap<Vec<u8>, Vec<u32>>> {
        self.chunk_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Encode text to token IDs.
    ///
    /// The text is cleaned and lowercased first, so the result does not
    /// depend on case or on the layout of whitespace.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        let text = clean_text(text);
        let mut tokens = Vec::with_capacity(text.len() / 2);
        let mut bytes = Vec::new();

        for chunk in self.pre_tokenizer.segment(&text) {
            bytes.clear();
            chunk_bytes(chunk, &mut bytes);
            tokens.extend(self.encode_chunk(&bytes));
        }

        tokens
    }

    /// Encode text and pack it into exactly `context_length` IDs.
    ///
    /// The sequence starts with `<|startoftext|>`, keeps as many content
    /// tokens as fit before `<|endoftext|>`, and is right-padded with
    /// [`PAD_ID`].
    pub fn encode_padded(&self, text: &str, context_length: usize) -> Vec<u32> {
        if context_length == 0 {
            return Vec::new();
        }

        let mut tokens = Vec::with_capacity(context_length);
        tokens.push(self.start_of_text);
        tokens.extend(self.encode(text));
        tokens.truncate(context_length - 1);
        tokens.push(self.end_of_text);
        tokens.resize(context_length, PAD_ID);
        tokens
    }

    /// Encode text into the fixed 77-token layout of the CLIP text encoder.
    pub fn encode_for_clip(&self, text: &str) -> [u32; CONTEXT_LENGTH] {
        let mut packed = [PAD_ID; CONTEXT_LENGTH];
        packed.copy_from_slice(&self.encode_padded(text, CONTEXT_LENGTH));
        packed
    }

    /// Run BPE on one byte-remapped chunk and return its space-separated
    /// symbols.
    ///
    /// Control tokens are returned unchanged.
    pub fn bpe(&self, token: &str) -> Result<String, TokenizerError> {
        if token == START_OF_TEXT || token == END_OF_TEXT {
            return Ok(token.to_string());
        }

        let bytes = token
            .chars()
            .map(|ch| char_to_byte(ch).ok_or(TokenizerError::InvalidSymbol(ch)))
            .collect::<Result<Vec<u8>, _>>()?;

        let symbols = self
            .encode_chunk(&bytes)
            .into_iter()
            .map(|id| self.vocab.token(id).ok_or(TokenizerError::UnknownToken(id)))
            .collect::<Result<Vec<&str>, _>>()?;

        Ok(symbols.join(" "))
    }

    /// Decode token IDs back to raw bytes, with every end-of-word marker
    /// turned into a space.
    pub fn decode_bytes(&self, tokens: &[u32]) -> Result<Vec<u8>, TokenizerError> {
        let mut result = Vec::with_capacity(tokens.len() * 4);
        for &id in tokens {
            let token = self
                .vocab
                .token(id)
                .ok_or(TokenizerError::UnknownToken(id))?;
            for ch in token.chars() {
                result.push(char_to_byte(ch).ok_or(TokenizerError::InvalidSymbol(ch))?);
            }
        }
        Ok(replace_end_of_word(&result))
    }

    /// Decode token IDs to text.
    ///
    /// Every decoded byte is read as the code point of the same value, and
    /// each end-of-word marker becomes a space. Multi-byte UTF-8 sequences
    /// therefore come back as their Latin-1 spelling; use
    /// [`decode_lossy`](Self::decode_lossy) to reassemble them.
    pub fn decode(&self, tokens: &[u32]) -> Result<String, TokenizerError> {
        let bytes = self.decode_bytes(tokens)?;
        Ok(bytes.into_iter().map(char::from).collect())
    }

    /// Decode token IDs to text, reading the bytes as UTF-8 and replacing
    /// invalid sequences.
    pub fn decode_lossy(&self, tokens: &[u32]) -> Result<String, TokenizerError> {
        let bytes = self.decode_bytes(tokens)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Batch encode multiple texts in parallel.
    pub fn encode_batch(&self, texts: &[String]) -> Vec<Vec<u32>> {
        texts.par_iter().map(|text| self.encode(text)).collect()
    }

    /// Batch encode multiple texts into the CLIP layout in parallel.
    pub fn encode_for_clip_batch(&self, texts: &[String]) -> Vec<[u32; CONTEXT_LENGTH]> {
        texts
            .par_iter()
            .map(|text| self.encode_for_clip(text))
            .collect()
    }

    /// Batch decode multiple token lists in parallel.
    pub fn decode_batch(&self, token_lists: &[Vec<u32>]) -> Result<Vec<String>, TokenizerError> {
        token_lists
            .par_iter()
            .map(|tokens| self.decode(tokens))
            .collect()
    }

    /// Number of token IDs, control tokens included.
    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    /// ID of `<|startoftext|>`.
    pub fn start_of_text(&self) -> u32 {
        self.start_of_text
    }

    /// ID of `<|endoftext|>`.
    pub fn end_of_text(&self) -> u32 {
        self.end_of_text
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.vocab.id(token)
    }

    pub fn id_to_token(&self, id: u32) -> Option<&str> {
        self.vocab.token(id)
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn merge_ranks(&self) -> &MergeRanks {
        &self.ranks
    }

    pub fn pre_tokenizer(&self) -> &PreTokenizer {
        &self.pre_tokenizer
    }

    /// Number of memoized chunks, the two control tokens included.
    pub fn cache_len(&self) -> usize {
        self.lock_cache().len()
    }
}

impl Clone for Tokenizer {
    fn clone(&self) -> Self {
        // Caches are not shared; the clone starts from the seeded state.
        let mut cache = FxHashMap::default();
        cache.insert(START_OF_TEXT.as_bytes().to_vec(), vec![self.start_of_text]);
        cache.insert(END_OF_TEXT.as_bytes().to_vec(), vec![self.end_of_text]);

        Self {
            vocab: self.vocab.clone(),
            ranks: self.ranks.clone(),
            pre_tokenizer: self.pre_tokenizer.clone(),
            byte_ids: self.byte_ids,
            end_of_word_ids: self.end_of_word_ids,
            start_of_text: self.start_of_text,
            end_of_text: self.end_of_text,
            chunk_cache: Mutex::new(cache),
        }
    }
}

/// Look up a token the vocabulary construction always inserts.
fn base_id(vocab: &Vocabulary, symbol: &str) -> Result<u32, VocabError> {
    vocab
        .id(symbol)
        .ok_or_else(|| VocabError::MissingBaseSymbol(symbol.to_string()))
}

/// Replace every `</w>` byte sequence with a single space.
fn replace_end_of_word(bytes: &[u8]) -> Vec<u8> {
    let marker = END_OF_WORD.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i..].starts_with(marker) {
            out.push(b' ');
            i += marker.len();
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}
