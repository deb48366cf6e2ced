//! Core tokenization engine for clip-bpe.
//!
//! This module contains the byte-level BPE tokenizer for the CLIP text
//! vocabulary:
//! - Byte-to-character remapping so any byte sequence becomes printable text
//! - Vocabulary and merge-rank tables built from the ordered merge list
//! - Text cleaning and pattern-based pre-tokenization
//! - Rank-ordered pair merging with per-chunk memoization
//!
//! # Architecture
//!
//! - [`Tokenizer`]: encode/decode API, CLIP packing, chunk cache, Rayon batch helpers
//! - [`bpe`]: the merge loop over a single word
//! - [`vocab`]: merge list parsing, [`Vocabulary`] and [`MergeRanks`]
//! - [`pretokenize`]: cleaning and the [`PreTokenizer`] segmenter
//! - [`html`]: character reference decoding used by cleaning
//! - [`byte_level`]: the byte/character bijection

pub mod bpe;
pub mod byte_level;
pub mod html;
pub mod pretokenize;
mod tokenizer;
pub mod vocab;

pub use bpe::byte_pair_merge;
pub use byte_level::{byte_level_decode, byte_level_encode, byte_to_char, char_to_byte};
pub use html::decode_entities;
pub use pretokenize::{
    basic_clean, clean_text, is_whitespace, whitespace_clean, PreTokenizer, CLIP_PATTERN,
};
pub use tokenizer::{
    Tokenizer, TokenizerError, CONTEXT_LENGTH, END_OF_TEXT_ID, PAD_ID, START_OF_TEXT_ID,
};
pub use vocab::{
    parse_merges, MergePair, MergeRanks, MergeRule, VocabError, Vocabulary, BASE_SYMBOLS,
    CLIP_MERGE_COUNT, CLIP_VOCAB_SIZE, END_OF_TEXT, END_OF_WORD, START_OF_TEXT,
};
