pub mod core;
#[cfg(feature = "python")]
mod python;

pub use crate::core::{
    PreTokenizer, Tokenizer, TokenizerError, VocabError, CLIP_MERGE_COUNT, CLIP_PATTERN,
    CLIP_VOCAB_SIZE, CONTEXT_LENGTH, END_OF_TEXT_ID, PAD_ID, START_OF_TEXT_ID,
};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// clip-bpe - CLIP text tokenizer with Python bindings
///
/// A byte-level BPE tokenizer featuring:
/// - Exact CLIP vocabulary construction from the merge list
/// - Rank-ordered merging with a per-tokenizer chunk cache
/// - FxHashMap for fast lookups
/// - Rayon parallelism for batch encoding
/// - Fixed 77-token packing for the CLIP text encoder
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::PyTokenizer>()?;
    m.add("CLIP_PATTERN", CLIP_PATTERN)?;
    m.add("START_OF_TEXT_ID", START_OF_TEXT_ID)?;
    m.add("END_OF_TEXT_ID", END_OF_TEXT_ID)?;
    m.add("PAD_ID", PAD_ID)?;
    m.add("CONTEXT_LENGTH", CONTEXT_LENGTH)?;
    Ok(())
}
