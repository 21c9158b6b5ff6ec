//! Property tests for chunk coverage and overlap.

use docrag::chunking::{ChunkSpan, split, split_fixed};
use proptest::prelude::*;

/// Text mixing ASCII words, sentence punctuation, line breaks and multi-byte characters.
fn arb_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            4 => "[a-z]{1,8}",
            2 => Just(" ".to_string()),
            1 => Just(". ".to_string()),
            1 => Just("\n".to_string()),
            1 => Just("\n\n".to_string()),
            1 => "[äöüß日本語é]{1,3}",
        ],
        0..120,
    )
    .prop_map(|parts| parts.concat())
}

/// Chunk size and an overlap strictly below it.
fn arb_params() -> impl Strategy<Value = (usize, usize)> {
    (1usize..64).prop_flat_map(|size| (Just(size), 0..size))
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Rebuild the source text by dropping each chunk's leading overlap.
fn reconstruct(text: &str, spans: &[ChunkSpan]) -> String {
    let mut out = String::new();
    let mut covered = 0;
    for span in spans {
        out.push_str(&text[covered.max(span.start)..span.end]);
        covered = span.end;
    }
    out
}

fn check_spans(text: &str, spans: &[ChunkSpan], chunk_size: usize, overlap: usize) {
    if text.is_empty() {
        assert!(spans.is_empty());
        return;
    }

    assert_eq!(spans[0].start, 0);
    assert_eq!(spans.last().map(|s| s.end), Some(text.len()));
    for (i, span) in spans.iter().enumerate() {
        assert_eq!(span.index, i);
        assert!(span.start < span.end, "empty chunk at {i}");
        assert!(char_len(span.slice(text)) <= chunk_size);
    }
    for pair in spans.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        assert!(next.start > prev.start, "no forward progress");
        assert!(next.start <= prev.end, "gap between chunks");
        assert!(char_len(&text[next.start..prev.end]) <= overlap);
    }
    assert_eq!(reconstruct(text, spans), text);
}

/// **Property: chunks cover the text exactly once modulo overlap**
/// *For any* text and valid parameters, both splitters return non-empty
/// chunks of at most `chunk_size` characters, whose first starts at 0, whose
/// last ends at the text length, and whose consecutive overlap never exceeds
/// `overlap` characters.
mod prop_chunk_coverage {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn boundary_aware_split_covers_text(text in arb_text(), (size, overlap) in arb_params()) {
            let spans = split(&text, size, overlap).unwrap();
            check_spans(&text, &spans, size, overlap);
        }

        #[test]
        fn fixed_split_covers_text(text in arb_text(), (size, overlap) in arb_params()) {
            let spans = split_fixed(&text, size, overlap).unwrap();
            check_spans(&text, &spans, size, overlap);
        }

        #[test]
        fn fixed_split_overlaps_exactly(text in arb_text(), (size, overlap) in arb_params()) {
            let spans = split_fixed(&text, size, overlap).unwrap();
            for pair in spans.windows(2) {
                prop_assert_eq!(char_len(&text[pair[1].start..pair[0].end]), overlap);
            }
        }
    }
}

/// **Property: short texts produce a single chunk**
/// *For any* non-empty text no longer than `chunk_size` characters, both
/// splitters return exactly one chunk spanning the whole text.
mod prop_short_text_single_chunk {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn short_text_is_one_chunk(text in "[a-z .\n]{1,40}", extra in 0usize..10) {
            let size = char_len(&text) + extra;
            let overlap = size / 3;
            let boundary = split(&text, size, overlap).unwrap();
            let fixed = split_fixed(&text, size, overlap).unwrap();
            for spans in [boundary, fixed] {
                prop_assert_eq!(spans.len(), 1);
                prop_assert_eq!((spans[0].start, spans[0].end), (0, text.len()));
            }
        }
    }
}

/// **Property: invalid parameters are rejected**
mod prop_invalid_params {
    use super::*;

    proptest! {
        #[test]
        fn overlap_at_or_above_size_is_rejected(size in 0usize..32, extra in 0usize..8) {
            let overlap = size + extra;
            prop_assert!(split("some text", size, overlap).is_err());
            prop_assert!(split_fixed("some text", size, overlap).is_err());
        }
    }
}
