//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface and are injected into the pipeline as `Arc<dyn EmbeddingProvider>`.
/// The default [`embed_batch`](EmbeddingProvider::embed_batch) implementation
/// calls [`embed`](EmbeddingProvider::embed) sequentially; backends that
/// support native batching should override it.
///
/// Failures are reported as [`RagError::EmbeddingError`]. Nothing in this
/// crate retries a failed call.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// Must return one vector per input, in input order. The default
    /// implementation stops at the first failing input and records its
    /// position in the error's `input_index`.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for (position, text) in texts.iter().enumerate() {
            let embedding = self.embed(text).await.map_err(|e| {
                match e.into_embedding_error(self.name()) {
                    RagError::EmbeddingError { provider, message, input_index: None } => {
                        RagError::EmbeddingError { provider, message, input_index: Some(position) }
                    }
                    other => other,
                }
            })?;
            results.push(embedding);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Short name used in error messages and logs.
    fn name(&self) -> &str {
        "embedding"
    }
}
