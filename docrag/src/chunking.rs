//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`FixedSizeChunker`]: sliding character window with configurable overlap
//! - [`RecursiveChunker`]: same window, but prefers to end chunks at paragraph,
//!   sentence, then word boundaries before falling back to a hard cut
//!
//! Sizes are counted in characters. Every chunk records the byte range it
//! covers in the source text, whatever strategy produced it.

use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// Separators tried in order when looking for a natural chunk boundary.
/// Whitespace is the last resort before a hard cut.
const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", "! ", "? "];

/// A strategy for splitting documents into chunks.
///
/// Implementations return chunks in text order with sequence indices starting
/// at zero. An empty document yields an empty `Vec`.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    fn chunk(&self, document: &Document) -> Result<Vec<Chunk>>;
}

/// The byte range `[start, end)` of one chunk within a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    /// Sequence index of the chunk.
    pub index: usize,
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl ChunkSpan {
    /// Borrow the covered text.
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

fn validate(chunk_size: usize, overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
    }
    if overlap >= chunk_size {
        return Err(RagError::ConfigError(format!(
            "chunk_overlap ({overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Byte offset of every char boundary in `text`, including `text.len()`.
fn char_boundaries(text: &str) -> Vec<usize> {
    text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect()
}

/// Split `text` with a plain sliding window.
///
/// Windows are `chunk_size` characters long and advance by
/// `chunk_size - overlap`; the walk stops at the first window that reaches
/// the end of the text, so the last chunk may be shorter.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] unless `chunk_size > 0` and `overlap < chunk_size`.
pub fn split_fixed(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<ChunkSpan>> {
    validate(chunk_size, overlap)?;
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let bounds = char_boundaries(text);
    let char_count = bounds.len() - 1;
    let step = chunk_size - overlap;

    let mut spans = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(char_count);
        spans.push(ChunkSpan { index: spans.len(), start: bounds[start], end: bounds[end] });
        if end == char_count {
            break;
        }
        start += step;
    }
    Ok(spans)
}

/// Split `text` into overlapping chunks, preferring natural boundaries.
///
/// Each chunk is at most `chunk_size` characters. Within a window the chunk
/// ends after the last paragraph break, else line break, else sentence end,
/// else whitespace found in the tail of the window; if none is found the
/// window is cut at exactly `chunk_size` characters. The next chunk starts
/// `overlap` characters before the previous one ended.
///
/// A tail boundary is only accepted when it leaves the chunk longer than both
/// half the window and the overlap, which guarantees forward progress.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] unless `chunk_size > 0` and `overlap < chunk_size`.
pub fn split(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<ChunkSpan>> {
    validate(chunk_size, overlap)?;
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let bounds = char_boundaries(text);
    let char_count = bounds.len() - 1;

    let mut spans = Vec::new();
    let mut start = 0;
    loop {
        let hard_end = (start + chunk_size).min(char_count);
        let end = if hard_end == char_count {
            hard_end
        } else {
            let min_end = start + (chunk_size / 2).max(overlap + 1);
            preferred_break(text, &bounds, start, hard_end, min_end).unwrap_or(hard_end)
        };

        spans.push(ChunkSpan { index: spans.len(), start: bounds[start], end: bounds[end] });
        if end == char_count {
            break;
        }
        start = end - overlap;
    }
    Ok(spans)
}

/// Find the char index just past the best separator in `[start, hard_end)`,
/// provided it is at least `min_end`.
fn preferred_break(
    text: &str,
    bounds: &[usize],
    start: usize,
    hard_end: usize,
    min_end: usize,
) -> Option<usize> {
    let window_start = bounds[start];
    let window = &text[window_start..bounds[hard_end]];
    let to_char_index = |byte: usize| bounds.binary_search(&(window_start + byte)).ok();

    for separator in SEPARATORS {
        if let Some(pos) = window.rfind(separator) {
            match to_char_index(pos + separator.len()) {
                Some(end) if end >= min_end => return Some(end),
                _ => continue,
            }
        }
    }

    let (pos, c) = window.char_indices().rev().find(|(_, c)| c.is_whitespace())?;
    to_char_index(pos + c.len_utf8()).filter(|end| *end >= min_end)
}

/// Turn spans over `document.text` into [`Chunk`]s.
///
/// Chunk IDs are `{document_id}_{index}`; each chunk inherits the document's
/// metadata plus a `chunk_index` field.
fn spans_to_chunks(document: &Document, spans: Vec<ChunkSpan>) -> Vec<Chunk> {
    spans
        .into_iter()
        .map(|span| {
            let mut metadata = document.metadata.clone();
            metadata.insert("chunk_index".to_string(), span.index.to_string());
            Chunk {
                id: format!("{}_{}", document.id, span.index),
                document_id: document.id.clone(),
                index: span.index,
                start: span.start,
                end: span.end,
                text: span.slice(&document.text).to_string(),
                metadata,
            }
        })
        .collect()
}

/// Splits text with a plain sliding character window. See [`split_fixed`].
///
/// # Example
///
/// ```rust,ignore
/// use docrag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(256, 50)?;
/// let chunks = chunker.chunk(&document)?;
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] unless `chunk_size > 0` and
    /// `chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Result<Vec<Chunk>> {
        let spans = split_fixed(&document.text, self.chunk_size, self.chunk_overlap)?;
        Ok(spans_to_chunks(document, spans))
    }
}

/// Splits text at paragraph → sentence → word boundaries, falling back to
/// character offsets. See [`split`].
///
/// # Example
///
/// ```rust,ignore
/// use docrag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(500, 80)?;
/// let chunks = chunker.chunk(&document)?;
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] unless `chunk_size > 0` and
    /// `chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Result<Vec<Chunk>> {
        let spans = split(&document.text, self.chunk_size, self.chunk_overlap)?;
        Ok(spans_to_chunks(document, spans))
    }
}
