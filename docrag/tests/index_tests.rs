//! Property tests for vector index ranking and persistence.

use std::collections::HashMap;

use docrag::document::{Chunk, IndexEntry};
use docrag::index::{SimilarityMetric, VectorIndex};
use proptest::prelude::*;

const DIM: usize = 8;

/// Generate a non-zero L2-normalized vector of the given dimension.
fn arb_normalized_vector(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map("non-zero vector", |mut v| {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-6 {
            return None;
        }
        for val in &mut v {
            *val /= norm;
        }
        Some(v)
    })
}

/// Generate `1..max` entries with distinct chunk IDs.
fn arb_entries(max: usize) -> impl Strategy<Value = Vec<IndexEntry>> {
    proptest::collection::vec(("[a-z ]{1,20}", arb_normalized_vector(DIM)), 1..max).prop_map(
        |items| {
            items
                .into_iter()
                .enumerate()
                .map(|(i, (text, vector))| {
                    let chunk = Chunk {
                        id: format!("doc_{i}"),
                        document_id: "doc".to_string(),
                        index: i,
                        start: 0,
                        end: text.len(),
                        text,
                        metadata: HashMap::new(),
                    };
                    IndexEntry::new(chunk, vector)
                })
                .collect()
        },
    )
}

/// **Property: query results are ranked and bounded**
/// *For any* index and query, results are ordered by descending score, hold
/// `min(k, len)` hits, and every cosine score lies in `[-1, 1]`.
mod prop_query_ranking {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_descending_and_bounded_by_k(
            entries in arb_entries(30),
            query in arb_normalized_vector(DIM),
            k in 1usize..40,
        ) {
            let len = entries.len();
            let index = VectorIndex::build(entries).unwrap();
            let result = index.query(&query, k).unwrap();

            prop_assert_eq!(result.len(), k.min(len));
            for pair in result.hits().windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
            for hit in &result {
                prop_assert!((-1.0..=1.0).contains(&hit.score));
            }
        }

        #[test]
        fn k_at_least_len_returns_every_entry(
            entries in arb_entries(20),
            query in arb_normalized_vector(DIM),
        ) {
            let len = entries.len();
            let index = VectorIndex::build(entries).unwrap();
            let result = index.query(&query, len + 5).unwrap();

            let mut ids: Vec<_> = result.iter().map(|h| h.entry.chunk.id.clone()).collect();
            ids.sort();
            ids.dedup();
            prop_assert_eq!(ids.len(), len);
        }

        #[test]
        fn zero_query_scores_zero_everywhere(entries in arb_entries(20)) {
            let len = entries.len();
            let index = VectorIndex::build(entries).unwrap();
            let result = index.query(&[0.0; DIM], len).unwrap();

            prop_assert_eq!(result.len(), len);
            prop_assert!(result.iter().all(|h| h.score == 0.0));
            // All ties, so insertion order is kept.
            let indices: Vec<_> = result.iter().map(|h| h.entry.chunk.index).collect();
            prop_assert_eq!(indices, (0..len).collect::<Vec<_>>());
        }

        #[test]
        fn self_query_ranks_own_entry_first(
            entries in arb_entries(20),
            pick in any::<prop::sample::Index>(),
        ) {
            let target = pick.get(&entries).clone();
            let index = VectorIndex::build(entries).unwrap();
            let result = index.query(&target.vector, 1).unwrap();

            // Another entry may tie at 1.0 only if it points the same way.
            prop_assert!((result.hits()[0].score - 1.0).abs() < 1e-4);
        }
    }
}

/// **Property: a saved index loads back with identical query results**
mod prop_persistence {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(30))]

        #[test]
        fn reloaded_index_answers_identically(
            entries in arb_entries(15),
            query in arb_normalized_vector(DIM),
            dot_product in any::<bool>(),
        ) {
            let metric =
                if dot_product { SimilarityMetric::DotProduct } else { SimilarityMetric::Cosine };
            let index = VectorIndex::build_with_metric(entries, metric).unwrap();

            let mut bytes = Vec::new();
            index.write_to(&mut bytes).unwrap();
            let loaded = VectorIndex::read_from(bytes.as_slice()).unwrap();

            prop_assert_eq!(loaded.metric(), metric);
            let expected = index.query(&query, index.len()).unwrap();
            let actual = loaded.query(&query, loaded.len()).unwrap();
            let ranked = |result: &docrag::RetrievalResult| -> Vec<(String, f32)> {
                result.iter().map(|h| (h.entry.chunk.id.clone(), h.score)).collect()
            };
            prop_assert_eq!(ranked(&expected), ranked(&actual));
        }
    }
}
