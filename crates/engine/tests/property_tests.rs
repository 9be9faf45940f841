//! Property-based tests for hash matching
//!
//! Random segments and queries, checked against a brute-force model:
//! - counts follow sum(min(freq, tf)) over query entries
//! - candidates are exactly the docs at or above the k-th greatest count
//! - iteration is strictly increasing
//! - raising K never removes candidates
//! - sealed and in-memory segments agree

use hashmatch_core::{DocId, HashAndFreq, HashToken};
use hashmatch_engine::{
    CancellationToken, DocPosition, HashMatchQuery, MemorySegment, OverlapScore, SealedSegment,
    SegmentReader,
};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::{Arc, Once};

const FIELD: &str = "f";

static INIT_LOGGING: Once = Once::new();

fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

// ============================================================================
// Model
// ============================================================================

fn build(docs: &[Vec<u32>]) -> MemorySegment {
    let mut builder = MemorySegment::builder(0);
    for tokens in docs {
        let tokens: Vec<HashToken> = tokens.iter().map(|t| HashToken::from_u32(*t)).collect();
        builder.index_document(FIELD, &tokens);
    }
    builder.build()
}

fn expected_counts(docs: &[Vec<u32>], query: &[(u32, u32)]) -> Vec<u32> {
    docs.iter()
        .map(|tokens| {
            let mut tf: BTreeMap<u32, u32> = BTreeMap::new();
            for t in tokens {
                *tf.entry(*t).or_insert(0) += 1;
            }
            query
                .iter()
                .map(|(h, f)| (*f).min(tf.get(h).copied().unwrap_or(0)))
                .sum()
        })
        .collect()
}

fn expected_candidates(counts: &[u32], k: i64) -> Vec<DocId> {
    if k <= 0 {
        return vec![];
    }
    if k as usize >= counts.len() {
        return (0..counts.len() as DocId).collect();
    }
    let mut sorted = counts.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let threshold = sorted[k as usize - 1];
    counts
        .iter()
        .enumerate()
        .filter(|(_, c)| **c >= threshold)
        .map(|(i, _)| i as DocId)
        .collect()
}

fn query(hashes: &[(u32, u32)], k: i64) -> HashMatchQuery {
    HashMatchQuery::new(
        FIELD,
        hashes
            .iter()
            .map(|(h, f)| HashAndFreq::new(HashToken::from_u32(*h), *f))
            .collect(),
        k,
        Arc::new(OverlapScore),
    )
}

fn candidates(q: &HashMatchQuery, segment: &dyn SegmentReader) -> Vec<(DocId, u32)> {
    q.plan(segment, &CancellationToken::new())
        .execute()
        .unwrap()
        .hits
        .iter()
        .map(|h| (h.doc_id, h.overlap))
        .collect()
}

fn docs_strategy() -> impl Strategy<Value = Vec<Vec<u32>>> {
    prop::collection::vec(prop::collection::vec(0u32..16, 0..12), 0..40)
}

fn query_strategy() -> impl Strategy<Value = Vec<(u32, u32)>> {
    prop::collection::vec((0u32..20, 0u32..4), 0..16)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn candidates_match_model(docs in docs_strategy(), hashes in query_strategy(), k in -3i64..48) {
        init_logging();
        let segment = build(&docs);
        let counts = expected_counts(&docs, &hashes);
        let expected: Vec<(DocId, u32)> = expected_candidates(&counts, k)
            .into_iter()
            .map(|d| (d, counts[d as usize]))
            .collect();
        prop_assert_eq!(candidates(&query(&hashes, k), &segment), expected);
    }

    #[test]
    fn iteration_is_strictly_increasing(docs in docs_strategy(), hashes in query_strategy(), k in 1i64..48) {
        let segment = build(&docs);
        let q = query(&hashes, k);
        let plan = q.plan(&segment, &CancellationToken::new());
        let mut scorer = plan.scorer().unwrap();
        let mut last: Option<DocId> = None;
        loop {
            match scorer.next_doc().unwrap() {
                DocPosition::Doc(id) => {
                    if let Some(prev) = last {
                        prop_assert!(id > prev);
                    }
                    last = Some(id);
                }
                DocPosition::Exhausted => break,
                DocPosition::BeforeStart => prop_assert!(false, "moved back before start"),
            }
        }
        prop_assert_eq!(scorer.next_doc().unwrap(), DocPosition::Exhausted);
    }

    #[test]
    fn raising_k_is_monotone(docs in docs_strategy(), hashes in query_strategy(), k in 0i64..40) {
        let segment = build(&docs);
        let small: Vec<DocId> = candidates(&query(&hashes, k), &segment).iter().map(|c| c.0).collect();
        let large: Vec<DocId> = candidates(&query(&hashes, k + 1), &segment).iter().map(|c| c.0).collect();
        prop_assert!(small.iter().all(|d| large.contains(d)));
    }

    #[test]
    fn at_least_k_candidates(docs in docs_strategy(), hashes in query_strategy(), k in 1i64..48) {
        let segment = build(&docs);
        let got = candidates(&query(&hashes, k), &segment).len();
        prop_assert!(got >= (k as usize).min(docs.len()));
    }

    #[test]
    fn input_order_does_not_matter(docs in docs_strategy(), hashes in query_strategy(), k in 1i64..20) {
        let segment = build(&docs);
        let mut reversed = hashes.clone();
        reversed.reverse();
        prop_assert_eq!(
            candidates(&query(&hashes, k), &segment),
            candidates(&query(&reversed, k), &segment)
        );
    }

    #[test]
    fn sealed_agrees_with_memory(docs in docs_strategy(), hashes in query_strategy(), k in 1i64..20) {
        let memory = build(&docs);
        let sealed = SealedSegment::seal(&memory);
        let q = query(&hashes, k);
        prop_assert_eq!(candidates(&q, &sealed), candidates(&q, &memory));
    }
}
