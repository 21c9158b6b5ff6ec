//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates the build phase (chunk → embed → index)
//! and the query phase (embed query → retrieve → generate) by composing an
//! [`EmbeddingProvider`], an [`Answerer`], and a [`Chunker`].
//!
//! Ingestion is all-or-nothing: a successful [`ingest`](RagPipeline::ingest)
//! builds a fresh [`VectorIndex`] and swaps it in; a failed one leaves the
//! previous index untouched. Queries that are already running keep using the
//! index they started with.
//!
//! # Example
//!
//! ```rust,ignore
//! use docrag::{RagPipeline, RagConfig};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .answerer(Arc::new(my_answerer))
//!     .build()?;
//!
//! pipeline.ingest(&documents).await?;
//! let answer = pipeline.answer("What are the key risks?", 4).await?;
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::answer::Answerer;
use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::{Answer, Chunk, Document, IndexEntry, RetrievalResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::loader::DocumentSource;
use crate::retriever::Retriever;

/// One `embed_batch` call's worth of consecutive chunks from a single document.
struct EmbedJob<'a> {
    chunks: &'a [Chunk],
}

/// The RAG pipeline orchestrator.
///
/// Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    answerer: Arc<dyn Answerer>,
    chunker: Arc<dyn Chunker>,
    index: RwLock<Option<Arc<VectorIndex>>>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// The index queries currently run against, if one has been built.
    pub async fn current_index(&self) -> Option<Arc<VectorIndex>> {
        self.index.read().await.clone()
    }

    /// Replace the current index, e.g. with one loaded from disk.
    pub async fn install_index(&self, index: Arc<VectorIndex>) {
        info!(entries = index.len(), "installed vector index");
        *self.index.write().await = Some(index);
    }

    /// Ingest `documents` using the configured chunker.
    ///
    /// Every document is chunked, every chunk embedded, and a single
    /// [`VectorIndex`] built over the whole set, which then becomes the
    /// pipeline's current index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IngestError`] naming the document (and chunk,
    /// when known) of the first failure in chunk order. A provider error
    /// that covers a whole batch leaves the chunk unset. No index is
    /// returned and the current index is left as it was.
    pub async fn ingest(&self, documents: &[Document]) -> Result<Arc<VectorIndex>> {
        self.ingest_with_chunker(documents, self.chunker.as_ref()).await
    }

    /// Ingest `documents` with explicit chunking parameters, using
    /// boundary-aware splitting.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] for invalid parameters, otherwise as
    /// [`RagPipeline::ingest`].
    pub async fn ingest_with(
        &self,
        documents: &[Document],
        chunk_size: usize,
        overlap: usize,
    ) -> Result<Arc<VectorIndex>> {
        let chunker = RecursiveChunker::new(chunk_size, overlap)?;
        self.ingest_with_chunker(documents, &chunker).await
    }

    /// Load documents from `source` and ingest them.
    pub async fn ingest_source(&self, source: &dyn DocumentSource) -> Result<Arc<VectorIndex>> {
        let documents = source.load().map_err(|e| {
            error!(error = %e, "failed to load documents");
            e
        })?;
        self.ingest(&documents).await
    }

    async fn ingest_with_chunker(
        &self,
        documents: &[Document],
        chunker: &dyn Chunker,
    ) -> Result<Arc<VectorIndex>> {
        // 1. Chunk every document
        let mut chunked = Vec::with_capacity(documents.len());
        for document in documents {
            let chunks = chunker.chunk(document).map_err(|e| {
                error!(document.id = %document.id, error = %e, "chunking failed during ingestion");
                RagError::IngestError {
                    document_id: document.id.clone(),
                    chunk_index: None,
                    source: Box::new(e),
                }
            })?;
            chunked.push(chunks);
        }

        // 2. Embed in batches; `buffered` yields in submission order, so the
        //    first error seen is the first failure in chunk order.
        let jobs: Vec<EmbedJob<'_>> = chunked
            .iter()
            .flat_map(|chunks| chunks.chunks(self.config.embed_batch_size))
            .map(|chunks| EmbedJob { chunks })
            .collect();
        let job_count = jobs.len();

        let vectors: Vec<Vec<Vec<f32>>> = stream::iter(jobs.iter().map(|job| self.embed_job(job)))
            .buffered(self.config.embed_concurrency)
            .try_collect()
            .await?;

        // 3. Assemble entries in chunk order, checking each vector with provenance
        let mut entries = Vec::new();
        let mut expected_dimensions = None;
        let mut seen_ids = HashSet::new();
        for (job, batch) in jobs.iter().zip(vectors) {
            for (chunk, vector) in job.chunks.iter().zip(batch) {
                let expected = *expected_dimensions.get_or_insert(vector.len());
                let problem = if vector.len() != expected {
                    Some(RagError::DimensionMismatch { expected, actual: vector.len() })
                } else if vector.iter().any(|x| !x.is_finite()) {
                    Some(RagError::embedding(
                        self.embedding_provider.name(),
                        "embedding contains non-finite values",
                    ))
                } else if !seen_ids.insert(chunk.id.as_str()) {
                    Some(RagError::ConfigError(format!("duplicate chunk id '{}'", chunk.id)))
                } else {
                    None
                };

                if let Some(source) = problem {
                    error!(
                        document.id = %chunk.document_id,
                        chunk.index = chunk.index,
                        error = %source,
                        "rejected embedding during ingestion"
                    );
                    return Err(RagError::IngestError {
                        document_id: chunk.document_id.clone(),
                        chunk_index: Some(chunk.index),
                        source: Box::new(source),
                    });
                }
                entries.push(IndexEntry::new(chunk.clone(), vector));
            }
        }

        // 4. Build once over the full set, then swap it in
        let index = VectorIndex::build_with_metric(entries, self.config.metric)?;
        let index = Arc::new(index);
        *self.index.write().await = Some(Arc::clone(&index));

        info!(
            documents = documents.len(),
            chunk_count = index.len(),
            batches = job_count,
            dimensions = index.dimensions(),
            "ingested documents"
        );
        Ok(index)
    }

    async fn embed_job(&self, job: &EmbedJob<'_>) -> Result<Vec<Vec<f32>>> {
        let first = &job.chunks[0];
        let texts: Vec<&str> = job.chunks.iter().map(|c| c.text.as_str()).collect();
        let provider = self.embedding_provider.name().to_string();
        debug!(
            document.id = %first.document_id,
            first_chunk = first.index,
            batch_size = texts.len(),
            "embedding batch"
        );

        // Without an input index the failure covers the whole batch.
        let ingest_error = |source: RagError| {
            let chunk_index = source.input_index().map(|i| first.index + i);
            error!(
                document.id = %first.document_id,
                chunk.index = ?chunk_index,
                first_chunk = first.index,
                batch_size = texts.len(),
                error = %source,
                "embedding failed during ingestion"
            );
            RagError::IngestError {
                document_id: first.document_id.clone(),
                chunk_index,
                source: Box::new(source),
            }
        };

        let vectors = self
            .embedding_provider
            .embed_batch(&texts)
            .await
            .map_err(|e| ingest_error(e.into_embedding_error(&provider)))?;

        if vectors.len() != texts.len() {
            return Err(ingest_error(RagError::embedding(
                provider,
                format!("expected {} embeddings, got {}", texts.len(), vectors.len()),
            )));
        }
        Ok(vectors)
    }

    /// Retrieve the top `k` chunks for `query` from the current index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if no index has been built, and the
    /// errors of [`Retriever::retrieve`] otherwise.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        self.retriever().await?.retrieve(query, k).await
    }

    /// Answer `query` from the top `k` retrieved chunks.
    ///
    /// Payload texts are concatenated in ranked order and passed to the
    /// [`Answerer`] as context. Retrieval failures are returned without
    /// calling the answerer.
    ///
    /// # Errors
    ///
    /// - [`RagError::PipelineError`] if no index has been built.
    /// - [`RagError::ConfigError`], [`RagError::EmbeddingError`] or
    ///   [`RagError::DimensionMismatch`] from retrieval.
    /// - [`RagError::GenerationError`] if the answerer fails.
    pub async fn answer(&self, query: &str, k: usize) -> Result<Answer> {
        let retrieval = self.retrieve(query, k).await?;
        let context = retrieval.context();

        let provider = self.answerer.name().to_string();
        let text = self.answerer.generate(query, &context).await.map_err(|e| {
            error!(provider = %provider, error = %e, "generation failed");
            e.into_generation_error(&provider)
        })?;

        info!(k, hits = retrieval.len(), context_len = context.len(), "answered query");
        Ok(Answer { query: query.to_string(), retrieval, text })
    }

    /// Answer `query` using the configured `top_k`.
    pub async fn ask(&self, query: &str) -> Result<Answer> {
        self.answer(query, self.config.top_k).await
    }

    async fn retriever(&self) -> Result<Retriever> {
        let index = self.current_index().await.ok_or_else(|| {
            RagError::PipelineError("no index has been built; call ingest first".to_string())
        })?;
        Ok(Retriever::new(Arc::clone(&self.embedding_provider), index)
            .with_similarity_threshold(self.config.similarity_threshold))
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `embedding_provider` and `answerer` are required. `config` defaults to
/// [`RagConfig::default()`]; `chunker` defaults to a [`RecursiveChunker`]
/// using the config's chunk size and overlap.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .answerer(Arc::new(answerer))
///     .chunker(Arc::new(FixedSizeChunker::new(256, 32)?))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    answerer: Option<Arc<dyn Answerer>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the answerer.
    pub fn answerer(mut self, answerer: Arc<dyn Answerer>) -> Self {
        self.answerer = Some(answerer);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`RagPipeline`], validating the configuration and that all
    /// required collaborators are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or the
    /// configuration is invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let answerer =
            self.answerer.ok_or_else(|| RagError::ConfigError("answerer is required".to_string()))?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap)?),
        };

        Ok(RagPipeline {
            config,
            embedding_provider,
            answerer,
            chunker,
            index: RwLock::new(None),
        })
    }
}
