//! Query-time retrieval: embed the query, then search a [`VectorIndex`].

use std::sync::Arc;

use tracing::{debug, error};

use crate::document::RetrievalResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;

/// Retrieves the chunks most relevant to a query text.
///
/// A retriever pins one index instance; rebuilding the index elsewhere does
/// not affect a retriever that is already in use.
#[derive(Clone)]
pub struct Retriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    similarity_threshold: Option<f32>,
}

impl Retriever {
    pub fn new(embedding_provider: Arc<dyn EmbeddingProvider>, index: Arc<VectorIndex>) -> Self {
        Self { embedding_provider, index, similarity_threshold: None }
    }

    /// Drop hits scoring below `threshold` after ranking.
    pub fn with_similarity_threshold(mut self, threshold: Option<f32>) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Embed `query` and return the top `k` matches.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] if `k == 0` (checked before embedding).
    /// - [`RagError::EmbeddingError`] if the embedder fails. The call is not retried.
    /// - [`RagError::DimensionMismatch`] if the query embedding does not match the index.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(RagError::ConfigError("k must be greater than zero".to_string()));
        }

        let provider = self.embedding_provider.name().to_string();
        let query_embedding = self.embedding_provider.embed(query).await.map_err(|e| {
            error!(provider = %provider, error = %e, "embedding failed during retrieval");
            e.into_embedding_error(&provider)
        })?;

        let mut result = self.index.query(&query_embedding, k)?;
        if let Some(threshold) = self.similarity_threshold {
            result.retain_above(threshold);
        }

        debug!(k, hits = result.len(), "retrieved chunks");
        Ok(result)
    }
}
