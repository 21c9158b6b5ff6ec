//! Immutable vector index with exact top-K similarity search.
//!
//! A [`VectorIndex`] is built once from a complete set of [`IndexEntry`]s and
//! never mutated afterwards. Re-indexing means building a new instance and
//! swapping it in, so a `VectorIndex` can be shared behind an `Arc` and
//! queried from many tasks at once without locking.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{IndexEntry, RetrievalResult, ScoredEntry};
use crate::error::{RagError, Result};

/// How query vectors are compared with stored vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// Dot product over the product of norms. A zero-norm vector scores 0
    /// against everything, itself included.
    #[default]
    Cosine,
    /// Raw dot product, for embeddings that are already L2-normalised.
    DotProduct,
}

impl SimilarityMetric {
    /// Stable identifier used in the persisted index header.
    pub fn id(self) -> u8 {
        match self {
            Self::Cosine => 0,
            Self::DotProduct => 1,
        }
    }

    /// Inverse of [`SimilarityMetric::id`].
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::Cosine),
            1 => Some(Self::DotProduct),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Slot {
    entry: Arc<IndexEntry>,
    norm: f32,
}

/// An immutable, brute-force vector index.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::{IndexEntry, VectorIndex};
///
/// let index = VectorIndex::build(entries)?;
/// let hits = index.query(&query_vector, 5)?;
/// ```
#[derive(Debug)]
pub struct VectorIndex {
    dimensions: usize,
    metric: SimilarityMetric,
    slots: Vec<Slot>,
    by_id: HashMap<String, usize>,
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

impl VectorIndex {
    /// Build a cosine-similarity index from `entries`.
    ///
    /// # Errors
    ///
    /// See [`VectorIndex::build_with_metric`].
    pub fn build(entries: impl IntoIterator<Item = IndexEntry>) -> Result<Self> {
        Self::build_with_metric(entries, SimilarityMetric::Cosine)
    }

    /// Build an index from `entries` using the given metric.
    ///
    /// Entry order is preserved and decides ties at query time: the earlier
    /// entry ranks first. An empty entry list yields an empty index of
    /// dimensionality 0.
    ///
    /// # Errors
    ///
    /// - [`RagError::DimensionMismatch`] if any vector's length differs from the first.
    /// - [`RagError::ConfigError`] if a vector contains NaN or infinity, or two
    ///   entries share a chunk ID.
    pub fn build_with_metric(
        entries: impl IntoIterator<Item = IndexEntry>,
        metric: SimilarityMetric,
    ) -> Result<Self> {
        let mut dimensions = None;
        let mut slots = Vec::new();
        let mut by_id = HashMap::new();

        for entry in entries {
            let expected = *dimensions.get_or_insert(entry.vector.len());
            if entry.vector.len() != expected {
                return Err(RagError::DimensionMismatch { expected, actual: entry.vector.len() });
            }
            if entry.vector.iter().any(|x| !x.is_finite()) {
                return Err(RagError::ConfigError(format!(
                    "vector for chunk '{}' contains non-finite values",
                    entry.chunk.id
                )));
            }
            if by_id.insert(entry.chunk.id.clone(), slots.len()).is_some() {
                return Err(RagError::ConfigError(format!(
                    "duplicate chunk id '{}'",
                    entry.chunk.id
                )));
            }
            let norm = l2_norm(&entry.vector);
            slots.push(Slot { entry: Arc::new(entry), norm });
        }

        let dimensions = dimensions.unwrap_or(0);
        debug!(entries = slots.len(), dimensions, ?metric, "built vector index");
        Ok(Self { dimensions, metric, slots, by_id })
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Length shared by every stored vector (0 for an empty index).
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> impl ExactSizeIterator<Item = &IndexEntry> + '_ {
        self.slots.iter().map(|slot| slot.entry.as_ref())
    }

    /// Look up an entry by chunk ID.
    pub fn get(&self, chunk_id: &str) -> Option<&IndexEntry> {
        self.by_id.get(chunk_id).map(|&i| self.slots[i].entry.as_ref())
    }

    /// Return the `k` entries most similar to `vector`, best first.
    ///
    /// `k` larger than the number of entries is clamped. Equal scores keep
    /// insertion order. Querying an empty index returns an empty result.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] if `k == 0` or `vector` contains NaN or infinity.
    /// - [`RagError::DimensionMismatch`] if `vector.len()` differs from the
    ///   index dimensionality.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(RagError::ConfigError("k must be greater than zero".to_string()));
        }
        if self.slots.is_empty() {
            return Ok(RetrievalResult::default());
        }
        if vector.len() != self.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(RagError::ConfigError(
                "query vector contains non-finite values".to_string(),
            ));
        }

        let query_norm = l2_norm(vector);
        let mut scored: Vec<(usize, f32)> = self
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (i, self.similarity(slot, vector, query_norm)))
            .collect();

        // Stable sort: equal scores stay in insertion order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        let hits = scored
            .into_iter()
            .map(|(i, score)| ScoredEntry { entry: Arc::clone(&self.slots[i].entry), score })
            .collect();
        Ok(RetrievalResult::new(hits))
    }

    fn similarity(&self, slot: &Slot, query: &[f32], query_norm: f32) -> f32 {
        let dot = dot(&slot.entry.vector, query);
        match self.metric {
            SimilarityMetric::DotProduct => dot,
            SimilarityMetric::Cosine => {
                if slot.norm == 0.0 || query_norm == 0.0 {
                    return 0.0;
                }
                (dot / (slot.norm * query_norm)).clamp(-1.0, 1.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::document::Chunk;

    fn entry(id: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry::new(
            Chunk {
                id: id.to_string(),
                document_id: "doc".to_string(),
                index: 0,
                start: 0,
                end: id.len(),
                text: id.to_string(),
                metadata: HashMap::new(),
            },
            vector,
        )
    }

    fn ids(result: &RetrievalResult) -> Vec<&str> {
        result.iter().map(|hit| hit.entry.chunk.id.as_str()).collect()
    }

    #[test]
    fn ranks_by_cosine_similarity() {
        let index = VectorIndex::build(vec![
            entry("x", vec![1.0, 0.0]),
            entry("y", vec![0.0, 1.0]),
            entry("xy", vec![1.0, 1.0]),
        ])
        .unwrap();

        let result = index.query(&[1.0, 0.0], 2).unwrap();
        assert_eq!(ids(&result), vec!["x", "xy"]);
        assert!((result.hits()[0].score - 1.0).abs() < 1e-6);
        assert!((result.hits()[1].score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn k_is_clamped_to_entry_count() {
        let index =
            VectorIndex::build(vec![entry("a", vec![1.0, 0.0]), entry("b", vec![0.5, 0.5])])
                .unwrap();
        assert_eq!(index.query(&[1.0, 0.0], 10).unwrap().len(), 2);
    }

    #[test]
    fn zero_k_is_rejected() {
        let index = VectorIndex::build(vec![entry("a", vec![1.0])]).unwrap();
        assert!(matches!(index.query(&[1.0], 0), Err(RagError::ConfigError(_))));
    }

    #[test]
    fn ties_keep_insertion_order() {
        let index = VectorIndex::build(vec![
            entry("first", vec![2.0, 0.0]),
            entry("second", vec![1.0, 0.0]),
            entry("third", vec![3.0, 0.0]),
        ])
        .unwrap();
        let result = index.query(&[1.0, 0.0], 3).unwrap();
        assert_eq!(ids(&result), vec!["first", "second", "third"]);
    }

    #[test]
    fn mismatched_build_fails() {
        let err = VectorIndex::build(vec![entry("a", vec![1.0, 0.0]), entry("b", vec![1.0])])
            .unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 1 }));
    }

    #[test]
    fn mismatched_query_fails() {
        let index = VectorIndex::build(vec![entry("a", vec![1.0, 0.0])]).unwrap();
        let err = index.query(&[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 3 }));
    }

    #[test]
    fn zero_vectors_score_zero() {
        let index = VectorIndex::build(vec![
            entry("zero", vec![0.0, 0.0]),
            entry("one", vec![1.0, 0.0]),
        ])
        .unwrap();

        let result = index.query(&[0.0, 0.0], 2).unwrap();
        assert!(result.iter().all(|hit| hit.score == 0.0));

        let result = index.query(&[1.0, 0.0], 2).unwrap();
        assert_eq!(ids(&result), vec!["one", "zero"]);
        assert_eq!(result.hits()[1].score, 0.0);
    }

    #[test]
    fn rejects_duplicates_and_non_finite_values() {
        assert!(matches!(
            VectorIndex::build(vec![entry("a", vec![1.0]), entry("a", vec![2.0])]),
            Err(RagError::ConfigError(_))
        ));
        assert!(matches!(
            VectorIndex::build(vec![entry("a", vec![f32::NAN])]),
            Err(RagError::ConfigError(_))
        ));
        let index = VectorIndex::build(vec![entry("a", vec![1.0])]).unwrap();
        assert!(index.query(&[f32::INFINITY], 1).is_err());
    }

    #[test]
    fn empty_index_answers_with_nothing() {
        let index = VectorIndex::build(Vec::new()).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.dimensions(), 0);
        assert!(index.query(&[1.0, 2.0], 3).unwrap().is_empty());
    }

    #[test]
    fn dot_product_metric_uses_magnitude() {
        let index = VectorIndex::build_with_metric(
            vec![entry("small", vec![1.0, 0.0]), entry("large", vec![3.0, 0.0])],
            SimilarityMetric::DotProduct,
        )
        .unwrap();
        let result = index.query(&[1.0, 0.0], 2).unwrap();
        assert_eq!(ids(&result), vec!["large", "small"]);
        assert_eq!(result.hits()[0].score, 3.0);
    }

    #[test]
    fn lookup_by_chunk_id() {
        let index = VectorIndex::build(vec![entry("a", vec![1.0]), entry("b", vec![2.0])]).unwrap();
        assert_eq!(index.get("b").map(|e| e.vector.clone()), Some(vec![2.0]));
        assert!(index.get("c").is_none());
        assert_eq!(index.entries().map(|e| e.chunk.id.as_str()).collect::<Vec<_>>(), ["a", "b"]);
    }
}
