//! Configuration for the RAG pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::index::SimilarityMetric;

/// Configuration parameters for the RAG pipeline.
///
/// Construct via [`RagConfig::builder()`], [`RagConfig::from_json`], or
/// [`RagConfig::from_env`]; all three validate the parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of top results to retrieve when the caller does not pass `k`.
    pub top_k: usize,
    /// Minimum similarity score for retrieved results. `None` disables filtering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f32>,
    /// Maximum number of chunk texts sent to the embedder in one call.
    pub embed_batch_size: usize,
    /// Maximum number of embedding batches in flight during ingestion.
    pub embed_concurrency: usize,
    /// Similarity metric used by indexes built through the pipeline.
    pub metric: SimilarityMetric,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 80,
            top_k: 4,
            similarity_threshold: None,
            embed_batch_size: 64,
            embed_concurrency: 1,
            metric: SimilarityMetric::Cosine,
        }
    }
}

/// Overrides [`RagConfig::chunk_size`] in [`RagConfig::from_env`].
pub const ENV_CHUNK_SIZE: &str = "DOCRAG_CHUNK_SIZE";
/// Overrides [`RagConfig::chunk_overlap`] in [`RagConfig::from_env`].
pub const ENV_CHUNK_OVERLAP: &str = "DOCRAG_CHUNK_OVERLAP";
/// Overrides [`RagConfig::top_k`] in [`RagConfig::from_env`].
pub const ENV_TOP_K: &str = "DOCRAG_TOP_K";
/// Overrides [`RagConfig::embed_batch_size`] in [`RagConfig::from_env`].
pub const ENV_EMBED_BATCH_SIZE: &str = "DOCRAG_EMBED_BATCH_SIZE";
/// Overrides [`RagConfig::embed_concurrency`] in [`RagConfig::from_env`].
pub const ENV_EMBED_CONCURRENCY: &str = "DOCRAG_EMBED_CONCURRENCY";

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Parse a JSON document into a validated [`RagConfig`].
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the JSON is malformed or the
    /// resulting configuration is inconsistent.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: RagConfig = serde_json::from_str(json)
            .map_err(|e| RagError::ConfigError(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Build a validated [`RagConfig`] from defaults overlaid with `DOCRAG_*`
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a variable is set but is not a
    /// valid unsigned integer, or if the resulting configuration is inconsistent.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |key: &str, default: usize| -> Result<usize> {
            match lookup(key) {
                Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                    RagError::ConfigError(format!("{key} must be an unsigned integer, got '{raw}'"))
                }),
                None => Ok(default),
            }
        };

        let defaults = Self::default();
        let config = Self {
            chunk_size: read(ENV_CHUNK_SIZE, defaults.chunk_size)?,
            chunk_overlap: read(ENV_CHUNK_OVERLAP, defaults.chunk_overlap)?,
            top_k: read(ENV_TOP_K, defaults.top_k)?,
            embed_batch_size: read(ENV_EMBED_BATCH_SIZE, defaults.embed_batch_size)?,
            embed_concurrency: read(ENV_EMBED_CONCURRENCY, defaults.embed_concurrency)?,
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `embed_batch_size == 0` or `embed_concurrency == 0`
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.embed_batch_size == 0 {
            return Err(RagError::ConfigError(
                "embed_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.embed_concurrency == 0 {
            return Err(RagError::ConfigError(
                "embed_concurrency must be greater than zero".to_string(),
            ));
        }
        if let Some(threshold) = self.similarity_threshold {
            if !threshold.is_finite() {
                return Err(RagError::ConfigError(
                    "similarity_threshold must be a finite number".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the default number of results to retrieve.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = Some(threshold);
        self
    }

    /// Set how many chunk texts are embedded per collaborator call.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Set how many embedding calls may be in flight during ingestion.
    pub fn embed_concurrency(mut self, concurrency: usize) -> Self {
        self.config.embed_concurrency = concurrency;
        self
    }

    /// Set the similarity metric for built indexes.
    pub fn metric(mut self, metric: SimilarityMetric) -> Self {
        self.config.metric = metric;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
