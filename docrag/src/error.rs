//! Error types for the `docrag` crate.

use thiserror::Error;

/// Errors that can occur while chunking, indexing, retrieving, or answering.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid construction parameters (chunk size, overlap, `k`, builder fields).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A vector's length does not match the dimensionality of its index.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimensionality the index was built with.
        expected: usize,
        /// The length of the offending vector.
        actual: usize,
    },

    /// The embedding collaborator failed.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// The underlying cause.
        message: String,
        /// Position of the failing input inside a batch, when known.
        input_index: Option<usize>,
    },

    /// The answering collaborator failed.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The answerer that produced the error.
        provider: String,
        /// The underlying cause.
        message: String,
    },

    /// A build-phase failure, with the document and chunk that triggered it.
    #[error("Ingest failed for document '{document_id}'{}: {source}", fmt_chunk(.chunk_index))]
    IngestError {
        /// The document being ingested when the failure occurred.
        document_id: String,
        /// The sequence index of the offending chunk, if the failure is chunk-specific.
        chunk_index: Option<usize>,
        /// The first failure encountered.
        #[source]
        source: Box<RagError>,
    },

    /// An error in the pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// A persisted index could not be decoded.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// An I/O error while loading documents or reading/writing an index.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn fmt_chunk(chunk_index: &Option<usize>) -> String {
    match chunk_index {
        Some(index) => format!(" (chunk {index})"),
        None => String::new(),
    }
}

impl RagError {
    /// Build an [`RagError::EmbeddingError`] without batch position information.
    pub fn embedding(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingError {
            provider: provider.into(),
            message: message.into(),
            input_index: None,
        }
    }

    /// Build a [`RagError::GenerationError`].
    pub fn generation(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GenerationError { provider: provider.into(), message: message.into() }
    }

    /// Return the batch position recorded on an embedding failure, if any.
    pub fn input_index(&self) -> Option<usize> {
        match self {
            Self::EmbeddingError { input_index, .. } => *input_index,
            _ => None,
        }
    }

    /// Coerce a collaborator failure into an [`RagError::EmbeddingError`].
    ///
    /// Errors that already are embedding errors pass through unchanged.
    pub(crate) fn into_embedding_error(self, provider: &str) -> Self {
        match self {
            err @ Self::EmbeddingError { .. } => err,
            other => Self::embedding(provider, other.to_string()),
        }
    }

    /// Coerce a collaborator failure into an [`RagError::GenerationError`].
    pub(crate) fn into_generation_error(self, provider: &str) -> Self {
        match self {
            err @ Self::GenerationError { .. } => err,
            other => Self::generation(provider, other.to_string()),
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_error_names_document_and_chunk() {
        let err = RagError::IngestError {
            document_id: "report".to_string(),
            chunk_index: Some(5),
            source: Box::new(RagError::embedding("fake", "rate limited")),
        };
        assert_eq!(
            err.to_string(),
            "Ingest failed for document 'report' (chunk 5): Embedding error (fake): rate limited"
        );
    }

    #[test]
    fn ingest_error_without_chunk() {
        let err = RagError::IngestError {
            document_id: "report".to_string(),
            chunk_index: None,
            source: Box::new(RagError::ConfigError("bad".to_string())),
        };
        assert_eq!(
            err.to_string(),
            "Ingest failed for document 'report': Configuration error: bad"
        );
    }

    #[test]
    fn coercion_keeps_existing_variant() {
        let err = RagError::EmbeddingError {
            provider: "a".into(),
            message: "m".into(),
            input_index: Some(3),
        }
        .into_embedding_error("b");
        assert_eq!(err.input_index(), Some(3));

        let err = RagError::PipelineError("boom".into()).into_generation_error("llm");
        assert!(matches!(err, RagError::GenerationError { ref provider, .. } if provider == "llm"));
    }
}
