//! Python bindings for the clip-bpe tokenizer.
//!
//! This module provides PyO3 wrappers around the core Rust tokenizer,
//! exposing a Python-friendly API while maintaining Rust performance.
//!
//! # Thread Safety
//!
//! The tokenizer is thread-safe and can be shared across Python threads.
//! Batch operations use Rayon for parallelism across texts.
//!
//! # Example
//!
//! ```python
//! from clip_bpe import Tokenizer
//!
//! tokenizer = Tokenizer.from_file("bpe_simple_vocab_16e6.txt")
//!
//! tokens = tokenizer.encode("A photo of a cat")
//! text = tokenizer.decode(tokens)
//!
//! # Fixed 77-token input for the CLIP text encoder
//! packed = tokenizer.encode_for_clip("A photo of a cat")
//! ```

use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;

use crate::core::{Tokenizer, TokenizerError, VocabError, CLIP_MERGE_COUNT};

/// Map load failures to `IOError` and everything else to `ValueError`.
fn to_py_err(err: TokenizerError) -> PyErr {
    match err {
        TokenizerError::Vocab(VocabError::Io(io)) => PyIOError::new_err(io.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

/// Python wrapper for the Rust Tokenizer.
#[pyclass(name = "Tokenizer")]
pub struct PyTokenizer {
    inner: Tokenizer,
}

#[pymethods]
impl PyTokenizer {
    /// Create a new tokenizer from a merge list file.
    ///
    /// Args:
    ///     merges_path: Path to bpe_simple_vocab_16e6.txt (or a compatible file)
    ///     merge_count: Number of merges to keep (default: CLIP's 48894)
    #[new]
    #[pyo3(signature = (merges_path, merge_count=CLIP_MERGE_COUNT))]
    fn new(merges_path: &str, merge_count: usize) -> PyResult<Self> {
        let inner =
            Tokenizer::from_file_with_merge_count(merges_path, merge_count).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Create a tokenizer from a merge list file.
    ///
    /// Args:
    ///     merges_path: Path to bpe_simple_vocab_16e6.txt (or a compatible file)
    ///     merge_count: Number of merges to keep (default: CLIP's 48894)
    ///
    /// Raises:
    ///     IOError: If the file cannot be read
    ///     ValueError: If the merge list is malformed or too short
    #[staticmethod]
    #[pyo3(signature = (merges_path, merge_count=CLIP_MERGE_COUNT))]
    fn from_file(merges_path: &str, merge_count: usize) -> PyResult<Self> {
        Self::new(merges_path, merge_count)
    }

    /// Create a tokenizer from the text of a merge list.
    ///
    /// Args:
    ///     merges: Merge list contents, header line included
    ///     merge_count: Number of merges to keep (default: CLIP's 48894)
    #[staticmethod]
    #[pyo3(signature = (merges, merge_count=CLIP_MERGE_COUNT))]
    fn from_str(merges: &str, merge_count: usize) -> PyResult<Self> {
        let inner = Tokenizer::with_merge_count(merges, merge_count).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Encode text to token IDs.
    ///
    /// The text is HTML-unescaped, whitespace-normalized and lowercased first.
    ///
    /// Args:
    ///     text: Input text to encode
    ///
    /// Returns:
    ///     List of token IDs
    fn encode(&self, text: &str) -> Vec<u32> {
        self.inner.encode(text)
    }

    /// Encode text into exactly 77 IDs: start token, content, end token, zero padding.
    ///
    /// Args:
    ///     text: Input text to encode
    ///
    /// Returns:
    ///     List of 77 token IDs
    fn encode_for_clip(&self, text: &str) -> Vec<u32> {
        self.inner.encode_for_clip(text).to_vec()
    }

    /// Encode text into exactly `context_length` IDs.
    fn encode_padded(&self, text: &str, context_length: usize) -> Vec<u32> {
        self.inner.encode_padded(text, context_length)
    }

    /// Batch encode multiple texts in parallel.
    ///
    /// Args:
    ///     texts: List of texts to encode
    ///
    /// Returns:
    ///     List of token ID lists
    fn encode_batch(&self, texts: Vec<String>) -> Vec<Vec<u32>> {
        self.inner.encode_batch(&texts)
    }

    /// Batch encode multiple texts into the 77-token layout.
    fn encode_for_clip_batch(&self, texts: Vec<String>) -> Vec<Vec<u32>> {
        self.inner
            .encode_for_clip_batch(&texts)
            .into_iter()
            .map(|packed| packed.to_vec())
            .collect()
    }

    /// Decode token IDs to a string.
    ///
    /// Each decoded byte becomes the character with the same code point.
    ///
    /// Raises:
    ///     ValueError: If a token ID is not in the vocabulary
    fn decode(&self, tokens: Vec<u32>) -> PyResult<String> {
        self.inner.decode(&tokens).map_err(to_py_err)
    }

    /// Decode token IDs to bytes.
    fn decode_bytes(&self, tokens: Vec<u32>) -> PyResult<Vec<u8>> {
        self.inner.decode_bytes(&tokens).map_err(to_py_err)
    }

    /// Decode token IDs to a string, reading the bytes as UTF-8 and
    /// replacing invalid sequences.
    fn decode_lossy(&self, tokens: Vec<u32>) -> PyResult<String> {
        self.inner.decode_lossy(&tokens).map_err(to_py_err)
    }

    /// Batch decode multiple token lists in parallel.
    fn decode_batch(&self, token_lists: Vec<Vec<u32>>) -> PyResult<Vec<String>> {
        self.inner.decode_batch(&token_lists).map_err(to_py_err)
    }

    /// Run BPE on a single byte-remapped chunk.
    ///
    /// Returns:
    ///     The merged symbols separated by spaces
    fn bpe(&self, token: &str) -> PyResult<String> {
        self.inner.bpe(token).map_err(to_py_err)
    }

    /// Get the vocabulary size (including control tokens).
    #[getter]
    fn vocab_size(&self) -> usize {
        self.inner.vocab_size()
    }

    /// ID of <|startoftext|>.
    #[getter]
    fn start_of_text(&self) -> u32 {
        self.inner.start_of_text()
    }

    /// ID of <|endoftext|>.
    #[getter]
    fn end_of_text(&self) -> u32 {
        self.inner.end_of_text()
    }

    /// Get the number of entries in the cache.
    #[getter]
    fn cache_len(&self) -> usize {
        self.inner.cache_len()
    }

    /// Look up the ID of a token string.
    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.inner.token_to_id(token)
    }

    /// Look up the string of a token ID.
    fn id_to_token(&self, id: u32) -> Option<String> {
        self.inner.id_to_token(id).map(str::to_string)
    }

    /// String representation.
    fn __repr__(&self) -> String {
        format!("Tokenizer(vocab_size={})", self.inner.vocab_size())
    }
}
