//! Retrieval-augmented question answering over a local document corpus.
//!
//! This crate provides:
//! - Boundary-aware and fixed-window text chunking with exact source offsets
//! - An immutable brute-force vector index with cosine or dot-product ranking
//! - Query-time retrieval and context assembly
//! - A [`RagPipeline`] tying ingestion, retrieval and answer generation together
//! - Binary persistence for built indexes
//!
//! Embedding and answer generation are pluggable through the
//! [`EmbeddingProvider`] and [`Answerer`] traits. Enable the `openai` feature
//! for implementations backed by an OpenAI-compatible HTTP API.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docrag::{Document, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::builder().chunk_size(400).chunk_overlap(50).build()?)
//!     .embedding_provider(Arc::new(my_embedder))
//!     .answerer(Arc::new(my_answerer))
//!     .build()?;
//!
//! pipeline.ingest(&[Document::new("handbook", text)]).await?;
//! let answer = pipeline.ask("How many vacation days do I get?").await?;
//! ```

pub mod answer;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod loader;
#[cfg(feature = "openai")]
pub mod openai;
pub mod persist;
pub mod pipeline;
pub mod retriever;

pub use answer::Answerer;
pub use chunking::{ChunkSpan, Chunker, FixedSizeChunker, RecursiveChunker, split, split_fixed};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Answer, Chunk, Document, IndexEntry, RetrievalResult, ScoredEntry};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use index::{SimilarityMetric, VectorIndex};
pub use loader::{DirectoryLoader, DocumentSource};
#[cfg(feature = "openai")]
pub use openai::{OpenAIAnswerer, OpenAIEmbeddingProvider};
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use retriever::Retriever;
