//! Vocabulary and merge-rank construction for the CLIP BPE merge list.
//!
//! # Merge List Format
//!
//! The merge asset (`bpe_simple_vocab_16e6.txt`) is plain text:
//! - The first line is a header (e.g. `#version: 0.2`) and is skipped
//! - Every following line holds two symbols separated by a single space
//! - Line order is merge priority: the first pair merges before all others
//!
//! ```text
//! #version: 0.2
//! i n
//! t h
//! a n
//! ```
//!
//! # Vocabulary Order
//!
//! Token IDs are positions in a fixed construction:
//! 1. the 256 base symbols ([`BASE_SYMBOLS`])
//! 2. the same 256 symbols with the end-of-word marker `</w>` appended
//! 3. the concatenation of every merge pair, in merge-list order
//! 4. `<|startoftext|>` and `<|endoftext|>`
//!
//! For the CLIP asset only the first [`CLIP_MERGE_COUNT`] merges are used,
//! which yields [`CLIP_VOCAB_SIZE`] tokens.

use rustc_hash::FxHashMap;
use thiserror::Error;

/// Marker appended to the last symbol of every word.
pub const END_OF_WORD: &str = "</w>";

/// Control token opening a sequence.
pub const START_OF_TEXT: &str = "<|startoftext|>";

/// Control token closing a sequence.
pub const END_OF_TEXT: &str = "<|endoftext|>";

/// Number of merges taken from the CLIP asset (49152 - 256 - 2).
pub const CLIP_MERGE_COUNT: usize = 49152 - 256 - 2;

/// Size of the CLIP vocabulary: 512 base symbols, the merges, two control tokens.
pub const CLIP_VOCAB_SIZE: usize = 2 * BASE_SYMBOLS.len() + CLIP_MERGE_COUNT + 2;

/// The 256 base symbols in vocabulary order.
///
/// This is the byte-level alphabet listed self-mapped bytes first. Reordering
/// any entry shifts every token ID, so the sequence is pinned here rather than
/// derived.
#[rustfmt::skip]
pub const BASE_SYMBOLS: [char; 256] = [
    '!', '"', '#', '$', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/', '0',
    '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?', '@',
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P',
    'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', '[', '\\', ']', '^', '_', '`',
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p',
    'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', '{', '|', '}', '~', '¡', '¢',
    '£', '¤', '¥', '¦', '§', '¨', '©', 'ª', '«', '¬', '®', '¯', '°', '±', '²', '³',
    '´', 'µ', '¶', '·', '¸', '¹', 'º', '»', '¼', '½', '¾', '¿', 'À', 'Á', 'Â', 'Ã',
    'Ä', 'Å', 'Æ', 'Ç', 'È', 'É', 'Ê', 'Ë', 'Ì', 'Í', 'Î', 'Ï', 'Ð', 'Ñ', 'Ò', 'Ó',
    'Ô', 'Õ', 'Ö', '×', 'Ø', 'Ù', 'Ú', 'Û', 'Ü', 'Ý', 'Þ', 'ß', 'à', 'á', 'â', 'ã',
    'ä', 'å', 'æ', 'ç', 'è', 'é', 'ê', 'ë', 'ì', 'í', 'î', 'ï', 'ð', 'ñ', 'ò', 'ó',
    'ô', 'õ', 'ö', '÷', 'ø', 'ù', 'ú', 'û', 'ü', 'ý', 'þ', 'ÿ', 'Ā', 'ā', 'Ă', 'ă',
    'Ą', 'ą', 'Ć', 'ć', 'Ĉ', 'ĉ', 'Ċ', 'ċ', 'Č', 'č', 'Ď', 'ď', 'Đ', 'đ', 'Ē', 'ē',
    'Ĕ', 'ĕ', 'Ė', 'ė', 'Ę', 'ę', 'Ě', 'ě', 'Ĝ', 'ĝ', 'Ğ', 'ğ', 'Ġ', 'ġ', 'Ģ', 'ģ',
    'Ĥ', 'ĥ', 'Ħ', 'ħ', 'Ĩ', 'ĩ', 'Ī', 'ī', 'Ĭ', 'ĭ', 'Į', 'į', 'İ', 'ı', 'Ĳ', 'ĳ',
    'Ĵ', 'ĵ', 'Ķ', 'ķ', 'ĸ', 'Ĺ', 'ĺ', 'Ļ', 'ļ', 'Ľ', 'ľ', 'Ŀ', 'ŀ', 'Ł', 'ł', 'Ń',];

/// Errors that can occur when loading the merge list.
#[derive(Error, Debug)]
pub enum VocabError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Merge list is empty (missing header line)")]
    MissingHeader,
    #[error("Merge list too short: expected {expected} merges, found {found}")]
    TooFewMerges { expected: usize, found: usize },
    #[error("Malformed merge on line {line}: {content:?}")]
    MalformedMerge { line: usize, content: String },
    #[error("Merge on line {line} references unknown symbol {symbol:?}")]
    UnknownSymbol { line: usize, symbol: String },
    #[error("Base symbol {0:?} missing from vocabulary")]
    MissingBaseSymbol(String),
}

/// One entry of the merge list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePair {
    pub first: String,
    pub second: String,
}

impl MergePair {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }

    /// The symbol produced by applying this merge.
    pub fn merged(&self) -> String {
        let mut merged = String::with_capacity(self.first.len() + self.second.len());
        merged.push_str(&self.first);
        merged.push_str(&self.second);
        merged
    }
}

/// Parse the first `merge_count` merges of a merge list.
///
/// The header line is skipped. Lines past `merge_count` are ignored, which is
/// how the CLIP asset is truncated to its vocabulary size.
pub fn parse_merges(data: &str, merge_count: usize) -> Result<Vec<MergePair>, VocabError> {
    let mut lines = data.lines();
    if lines.next().is_none() {
        return Err(VocabError::MissingHeader);
    }

    let mut merges = Vec::with_capacity(merge_count);
    for (idx, line) in lines.take(merge_count).enumerate() {
        let mut parts = line.split(' ');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(first), Some(second), None) if !first.is_empty() && !second.is_empty() => {
                merges.push(MergePair::new(first, second));
            }
            _ => {
                return Err(VocabError::MalformedMerge {
                    // header + 1-based numbering
                    line: idx + 2,
                    content: line.to_string(),
                });
            }
        }
    }

    if merges.len() < merge_count {
        return Err(VocabError::TooFewMerges {
            expected: merge_count,
            found: merges.len(),
        });
    }

    Ok(merges)
}

/// Token string to ID mapping and its inverse.
///
/// IDs are dense: every ID below [`Vocabulary::len`] has a string.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    encoder: FxHashMap<String, u32>,
    decoder: Vec<String>,
}

impl Vocabulary {
    /// Build the vocabulary in CLIP order from a parsed merge list.
    pub fn new(merges: &[MergePair]) -> Self {
        let mut decoder = Vec::with_capacity(2 * BASE_SYMBOLS.len() + merges.len() + 2);
        decoder.extend(BASE_SYMBOLS.iter().map(|ch| ch.to_string()));
        decoder.extend(BASE_SYMBOLS.iter().map(|ch| format!("{ch}{END_OF_WORD}")));
        decoder.extend(merges.iter().map(MergePair::merged));
        decoder.push(START_OF_TEXT.to_string());
        decoder.push(END_OF_TEXT.to_string());

        let mut encoder = FxHashMap::default();
        encoder.reserve(decoder.len());
        for (id, token) in decoder.iter().enumerate() {
            // Later entries win, so the string keeps its highest ID.
            if let Some(previous) = encoder.insert(token.clone(), id as u32) {
                log::warn!("duplicate vocabulary entry {token:?}: ids {previous} and {id}");
            }
        }

        log::debug!(
            "built vocabulary: {} tokens ({} merges)",
            decoder.len(),
            merges.len()
        );

        Self { encoder, decoder }
    }

    /// Look up the ID of a token string.
    #[inline]
    pub fn id(&self, token: &str) -> Option<u32> {
        self.encoder.get(token).copied()
    }

    /// Look up the string of a token ID.
    #[inline]
    pub fn token(&self, id: u32) -> Option<&str> {
        self.decoder.get(id as usize).map(String::as_str)
    }

    /// Number of token IDs.
    pub fn len(&self) -> usize {
        self.decoder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoder.is_empty()
    }

    /// Get the encoder map (token string -> ID).
    pub fn encoder(&self) -> &FxHashMap<String, u32> {
        &self.encoder
    }
}

/// Outcome of merging one adjacent symbol pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRule {
    /// Priority: lower ranks merge first.
    pub rank: u32,
    /// Vocabulary ID of the merged symbol.
    pub merged: u32,
}

/// Merge priority table keyed by the vocabulary IDs of the two symbols.
#[derive(Debug, Clone, Default)]
pub struct MergeRanks {
    rules: FxHashMap<(u32, u32), MergeRule>,
}

impl MergeRanks {
    /// Build the table from the merge list; a pair's rank is its position.
    ///
    /// Every symbol named by a merge must already be in `vocab`.
    pub fn new(vocab: &Vocabulary, merges: &[MergePair]) -> Result<Self, VocabError> {
        let mut rules = FxHashMap::default();
        rules.reserve(merges.len());

        for (rank, pair) in merges.iter().enumerate() {
            let line = rank + 2;
            let lookup = |symbol: &str| {
                vocab.id(symbol).ok_or_else(|| VocabError::UnknownSymbol {
                    line,
                    symbol: symbol.to_string(),
                })
            };
            let first = lookup(&pair.first)?;
            let second = lookup(&pair.second)?;
            let merged = lookup(&pair.merged())?;
            rules.insert(
                (first, second),
                MergeRule {
                    rank: rank as u32,
                    merged,
                },
            );
        }

        Ok(Self { rules })
    }

    /// Look up the merge for an adjacent pair of symbol IDs.
    #[inline]
    pub fn get(&self, first: u32, second: u32) -> Option<MergeRule> {
        self.rules.get(&(first, second)).copied()
    }

    /// Look up the rank of a pair of symbol strings.
    pub fn rank(&self, vocab: &Vocabulary, first: &str, second: &str) -> Option<u32> {
        self.get(vocab.id(first)?, vocab.id(second)?)
            .map(|rule| rule.rank)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
