//! Answer generation trait.

use async_trait::async_trait;

use crate::error::Result;

/// A collaborator that turns a query plus retrieved context into an answer.
///
/// Implementations typically call a hosted chat-completion API. Failures are
/// reported as [`RagError::GenerationError`](crate::RagError::GenerationError)
/// and are never retried by the pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::Answerer;
///
/// let text = answerer.generate("What are the key risks?", &context).await?;
/// ```
#[async_trait]
pub trait Answerer: Send + Sync {
    /// Generate an answer to `query` grounded in `context`.
    async fn generate(&self, query: &str, context: &str) -> Result<String>;

    /// Short name used in error messages and logs.
    fn name(&self) -> &str {
        "answerer"
    }
}
