//! Text cleaning and pre-tokenization.
//!
//! Before BPE runs, input text is normalized and split into candidate chunks:
//!
//! 1. HTML entities are decoded twice (some captions are escaped twice)
//! 2. Whitespace runs collapse to a single space and the ends are trimmed
//! 3. Everything is lowercased
//! 4. [`CLIP_PATTERN`] cuts the result into chunks, left to right
//!
//! Whitespace never ends up inside a chunk; word boundaries are carried by the
//! end-of-word marker instead.

use regex::{Matches, Regex};

use super::html::decode_entities;

/// Pre-tokenization pattern for the CLIP tokenizer.
///
/// Alternatives are tried in order at each position:
/// - the two control tokens, verbatim
/// - English contraction suffixes
/// - a run of letters
/// - a single digit
/// - a run of anything that is not whitespace, a letter, or a digit
///
/// Whitespace here is the set [`is_whitespace`] accepts, spelled out as a
/// class: `\s` would also match U+0085 and miss U+FEFF.
pub const CLIP_PATTERN: &str = r"(?i)<\|startoftext\|>|<\|endoftext\|>|'s|'t|'re|'ve|'m|'ll|'d|\p{L}+|\p{N}|[^\t\n\x0B\f\r \x{A0}\x{1680}\x{2000}-\x{200A}\x{2028}\x{2029}\x{202F}\x{205F}\x{3000}\x{FEFF}\p{L}\p{N}]+";

/// Whitespace as far as cleaning and segmentation are concerned.
///
/// This is the Unicode `Zs` category plus tab, the line terminators, vertical
/// tab, form feed and the byte order mark. Unlike [`char::is_whitespace`] it
/// excludes U+0085, which is kept as a symbol.
pub fn is_whitespace(ch: char) -> bool {
    matches!(
        ch,
        '\t' | '\n'
            | '\u{0B}'
            | '\u{0C}'
            | '\r'
            | ' '
            | '\u{A0}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200A}'
            | '\u{2028}'
            | '\u{2029}'
            | '\u{202F}'
            | '\u{205F}'
            | '\u{3000}'
            | '\u{FEFF}'
    )
}

/// Decode HTML entities (twice) and trim.
pub fn basic_clean(text: &str) -> String {
    let once = decode_entities(text);
    let twice = decode_entities(&once);
    twice.trim_matches(is_whitespace).to_string()
}

/// Collapse every whitespace run into a single space and trim.
pub fn whitespace_clean(text: &str) -> String {
    text.split(is_whitespace)
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Full normalization applied before segmentation.
pub fn clean_text(text: &str) -> String {
    whitespace_clean(&basic_clean(text)).to_lowercase()
}

/// Splits cleaned text into the chunks BPE operates on.
#[derive(Debug, Clone)]
pub struct PreTokenizer {
    regex: Regex,
}

impl PreTokenizer {
    /// Create a pre-tokenizer using [`CLIP_PATTERN`].
    pub fn new() -> Result<Self, regex::Error> {
        Self::with_pattern(CLIP_PATTERN)
    }

    /// Create a pre-tokenizer with a custom pattern.
    pub fn with_pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    /// Lazily yield the chunks of `text`.
    ///
    /// Each call starts over from the beginning of `text`.
    pub fn segment<'r, 't>(&'r self, text: &'t str) -> Segments<'r, 't> {
        Segments {
            inner: self.regex.find_iter(text),
        }
    }

    /// The pattern this pre-tokenizer was built from.
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

/// Iterator over the chunks of a text, see [`PreTokenizer::segment`].
pub struct Segments<'r, 't> {
    inner: Matches<'r, 't>,
}

impl<'t> Iterator for Segments<'_, 't> {
    type Item = &'t str;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|m| m.as_str())
    }
}
