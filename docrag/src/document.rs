//! Data types for documents, chunks, index entries, and answers.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A source document containing text content and metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata associated with the document.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Optional URI pointing to the original source (e.g. a file path).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

impl Document {
    /// Create a document with no metadata and no source URI.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), metadata: HashMap::new(), source_uri: None }
    }

    /// Attach a metadata field.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the source URI.
    pub fn with_source_uri(mut self, uri: impl Into<String>) -> Self {
        self.source_uri = Some(uri.into());
        self
    }
}

/// A contiguous, offset-tracked segment of a [`Document`].
///
/// `start` and `end` are byte offsets into the parent document's text and
/// always fall on UTF-8 character boundaries, so `text == document.text[start..end]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk, `{document_id}_{index}`.
    pub id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Sequence index of this chunk within its document.
    pub index: usize,
    /// Start byte offset (inclusive) into the document text.
    pub start: usize,
    /// End byte offset (exclusive) into the document text.
    pub end: usize,
    /// The text content of the chunk.
    pub text: String,
    /// Metadata inherited from the parent document plus `chunk_index`.
    pub metadata: HashMap<String, String>,
}

/// A chunk paired with its embedding vector, owned by a
/// [`VectorIndex`](crate::index::VectorIndex).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// The chunk whose text is the entry's payload.
    pub chunk: Chunk,
    /// The chunk's embedding.
    pub vector: Vec<f32>,
}

impl IndexEntry {
    /// Create an entry from a chunk and its embedding.
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self { chunk, vector }
    }

    /// The payload text returned to the answerer.
    pub fn text(&self) -> &str {
        &self.chunk.text
    }
}

/// A retrieved [`IndexEntry`] with its similarity score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredEntry {
    /// The retrieved entry, shared with the index it came from.
    pub entry: Arc<IndexEntry>,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

/// Ranked retrieval hits, descending by score.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalResult {
    hits: Vec<ScoredEntry>,
}

impl RetrievalResult {
    pub(crate) fn new(hits: Vec<ScoredEntry>) -> Self {
        Self { hits }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn hits(&self) -> &[ScoredEntry] {
        &self.hits
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScoredEntry> {
        self.hits.iter()
    }

    /// Concatenate payload texts in ranked order, separated by blank lines.
    pub fn context(&self) -> String {
        self.hits.iter().map(|hit| hit.entry.text()).collect::<Vec<_>>().join("\n\n")
    }

    /// Drop hits scoring below `threshold`. Order is preserved.
    pub(crate) fn retain_above(&mut self, threshold: f32) {
        self.hits.retain(|hit| hit.score >= threshold);
    }
}

impl IntoIterator for RetrievalResult {
    type Item = ScoredEntry;
    type IntoIter = std::vec::IntoIter<ScoredEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.into_iter()
    }
}

impl<'a> IntoIterator for &'a RetrievalResult {
    type Item = &'a ScoredEntry;
    type IntoIter = std::slice::Iter<'a, ScoredEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.iter()
    }
}

/// A generated answer together with the retrieval that grounded it.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// The query text.
    pub query: String,
    /// The retrieved context, in the order it was given to the answerer.
    pub retrieval: RetrievalResult,
    /// The generated answer text.
    pub text: String,
}

impl Answer {
    /// IDs of the documents whose chunks were used as context, first-seen order.
    pub fn source_documents(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for hit in &self.retrieval {
            let id = hit.entry.chunk.document_id.as_str();
            if !seen.contains(&id) {
                seen.push(id);
            }
        }
        seen
    }
}
