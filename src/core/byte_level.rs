//! Byte-level remapping between raw bytes and printable Unicode characters.
//!
//! BPE over raw bytes needs every byte value to be representable as a visible
//! symbol. Control characters and whitespace would otherwise collide with the
//! separators used by the merge table, so each byte gets a unique printable
//! stand-in.
//!
//! # Mapping Strategy
//!
//! - Bytes 33-126 (`!` to `~`): map to themselves
//! - Bytes 161-172 (`¡` to `¬`): map to themselves
//! - Bytes 174-255 (`®` to `ÿ`): map to themselves
//! - Other bytes (0-32, 127-160, 173): map to U+0100 onwards, in byte order
//!
//! The table determines every token ID of the CLIP vocabulary, so it must be
//! reproduced exactly.
//!
//! # Example
//!
//! ```
//! use clip_bpe::core::byte_level::{byte_level_encode, byte_to_char};
//!
//! // Space (0x20 = 32) maps to 'Ġ' (U+0120)
//! assert_eq!(byte_to_char(b' '), 'Ġ');
//! assert_eq!(byte_level_encode(b" hi"), "Ġhi");
//! ```

use rustc_hash::FxHashMap;
use std::sync::LazyLock;

/// First code point handed out to bytes that are not printable on their own.
const SYNTHETIC_BASE: u32 = 256;

/// Bytes that keep their own code point, in vocabulary order.
fn direct_bytes() -> impl Iterator<Item = u8> {
    (b'!'..=b'~').chain(0xA1..=0xAC).chain(0xAE..=0xFF)
}

/// Byte to Unicode character mapping (256 entries).
static BYTE_TO_CHAR: LazyLock<[char; 256]> = LazyLock::new(|| {
    let mut mapping = ['\0'; 256];
    let mut mapped = [false; 256];

    for b in direct_bytes() {
        mapping[b as usize] = char::from(b);
        mapped[b as usize] = true;
    }

    let mut next_char = SYNTHETIC_BASE;
    for b in 0..256usize {
        if mapped[b] {
            continue;
        }
        // All synthetic code points stay below U+0144.
        if let Some(ch) = char::from_u32(next_char) {
            mapping[b] = ch;
        }
        next_char += 1;
    }

    mapping
});

/// Unicode character to byte mapping (reverse of BYTE_TO_CHAR).
static CHAR_TO_BYTE: LazyLock<FxHashMap<char, u8>> = LazyLock::new(|| {
    BYTE_TO_CHAR
        .iter()
        .enumerate()
        .map(|(byte, &ch)| (ch, byte as u8))
        .collect()
});

/// Encode a byte slice, one printable character per byte.
#[inline]
pub fn byte_level_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| BYTE_TO_CHAR[b as usize]).collect()
}

/// Decode a byte-level string back to raw bytes.
///
/// Returns `None` if the string contains a character outside the byte-level
/// alphabet.
#[inline]
pub fn byte_level_decode(text: &str) -> Option<Vec<u8>> {
    text.chars().map(char_to_byte).collect()
}

/// Get the byte-level character for a byte value.
#[inline]
pub fn byte_to_char(byte: u8) -> char {
    BYTE_TO_CHAR[byte as usize]
}

/// Get the byte value for a byte-level character.
#[inline]
pub fn char_to_byte(ch: char) -> Option<u8> {
    CHAR_TO_BYTE.get(&ch).copied()
}

/// Check if a character is part of the byte-level alphabet.
#[inline]
pub fn is_byte_level_char(ch: char) -> bool {
    CHAR_TO_BYTE.contains_key(&ch)
}

/// The 256 alphabet symbols in construction order: the self-mapped bytes
/// first, then the synthetic code points.
///
/// This is the order in which the base symbols enter the vocabulary.
pub fn byte_level_alphabet() -> impl Iterator<Item = char> {
    let synthetic = (0..=255u8)
        .filter(|b| !direct_bytes().any(|d| d == *b))
        .map(byte_to_char);
    direct_bytes().map(byte_to_char).chain(synthetic)
}

/// Append the bytes a pre-tokenized chunk contributes to the BPE input.
///
/// Characters up to U+00FF stand for the byte with the same value. Wider
/// characters contribute their UTF-8 encoding.
///
/// The mapping is not injective: a run of Latin-1 characters can spell the
/// UTF-8 bytes of a wider character (`"éªª"` and `"\u{9AAA}"` both give
/// `E9 AA AA`), and such inputs encode to the same IDs.
pub fn chunk_bytes(chunk: &str, out: &mut Vec<u8>) {
    for ch in chunk.chars() {
        match u8::try_from(u32::from(ch)) {
            Ok(b) => out.push(b),
            Err(_) => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_level_mapping_is_bijective() {
        let mut seen: std::collections::HashSet<char> = std::collections::HashSet::new();
        for b in 0u8..=255 {
            let ch = BYTE_TO_CHAR[b as usize];
            assert!(seen.insert(ch), "Duplicate mapping for byte {}", b);
        }
        assert_eq!(seen.len(), 256);
    }

    #[test]
    fn test_byte_level_roundtrip() {
        for b in 0u8..=255 {
            assert_eq!(char_to_byte(byte_to_char(b)), Some(b), "byte {}", b);
        }
    }

    #[test]
    fn test_space_mapping() {
        let space_char = byte_to_char(b' ');
        assert_eq!(space_char, 'Ġ');
        assert_eq!(space_char as u32, 0x0120);
    }

    #[test]
    fn test_synthetic_range() {
        assert_eq!(byte_to_char(0), '\u{100}');
        assert_eq!(byte_to_char(127), '\u{121}');
        assert_eq!(byte_to_char(173), '\u{143}');
    }

    #[test]
    fn test_printable_preserved() {
        for b in direct_bytes() {
            assert_eq!(byte_to_char(b) as u32, b as u32);
        }
    }

    #[test]
    fn test_alphabet_order() {
        let alphabet: Vec<char> = byte_level_alphabet().collect();
        assert_eq!(alphabet.len(), 256);
        assert_eq!(alphabet[0], '!');
        assert_eq!(alphabet[93], '~');
        assert_eq!(alphabet[94], '¡');
        assert_eq!(alphabet[188], 'Ā');
        assert_eq!(alphabet[255], 'Ń');
    }

    #[test]
    fn test_decode_rejects_foreign_chars() {
        assert_eq!(byte_level_decode("Ġhi"), Some(b" hi".to_vec()));
        assert_eq!(byte_level_decode("東"), None);
        assert!(!is_byte_level_char(' '));
        assert!(is_byte_level_char('Ġ'));
    }

    #[test]
    fn test_chunk_bytes_latin1_by_code_point() {
        let mut out = Vec::new();
        chunk_bytes("bé", &mut out);
        assert_eq!(out, vec![b'b', 0xE9]);
    }

    #[test]
    fn test_chunk_bytes_wide_chars_as_utf8() {
        let mut out = Vec::new();
        chunk_bytes("東", &mut out);
        assert_eq!(out, "東".as_bytes());
    }

    #[test]
    fn test_chunk_bytes_latin1_can_spell_utf8() {
        let mut latin1 = Vec::new();
        let mut wide = Vec::new();
        chunk_bytes("éªª", &mut latin1);
        chunk_bytes("\u{9AAA}", &mut wide);
        assert_eq!(latin1, vec![0xE9, 0xAA, 0xAA]);
        assert_eq!(latin1, wide);
    }
}
