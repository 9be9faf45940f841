//! Per-document overlap counting
//!
//! For every document in a segment, counts how many of the query's hashes
//! it shares: each query entry `(hash, freq)` credits `min(freq, tf)` to
//! every document whose posting list for `hash` has term frequency `tf`.
//! Counts live in a dense `Vec` indexed by doc id, one slot per document.

use super::cancel::CancellationToken;
use crate::segment::SegmentReader;
use hashmatch_core::{DocId, HashFrequencyTable, HashMatchError, HashMatchResult};
use tracing::{debug, warn};

// ============================================================================
// OverlapCounts
// ============================================================================

/// Dense overlap counts for one segment
///
/// Counters saturate at `u32::MAX` instead of wrapping; `saturated()`
/// reports whether that ever happened.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OverlapCounts {
    counts: Vec<u32>,
    saturated: bool,
}

impl OverlapCounts {
    /// All-zero counts for `doc_count` documents
    pub fn zeroed(doc_count: u32) -> Self {
        OverlapCounts {
            counts: vec![0; doc_count as usize],
            saturated: false,
        }
    }

    /// Wrap precomputed counts, one per document
    pub fn from_counts(counts: Vec<u32>) -> Self {
        OverlapCounts {
            counts,
            saturated: false,
        }
    }

    /// Number of documents covered
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// True for a segment without documents
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Count of one document, `None` when out of range
    #[inline]
    pub fn get(&self, doc_id: DocId) -> Option<u32> {
        self.counts.get(doc_id as usize).copied()
    }

    /// Counts indexed by doc id
    pub fn as_slice(&self) -> &[u32] {
        &self.counts
    }

    /// Largest count, zero for an empty segment
    pub fn max(&self) -> u32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Whether any counter hit `u32::MAX`
    pub fn saturated(&self) -> bool {
        self.saturated
    }

    #[inline]
    fn credit(&mut self, doc_id: DocId, amount: u32) {
        let slot = &mut self.counts[doc_id as usize];
        match slot.checked_add(amount) {
            Some(v) => *slot = v,
            None => {
                *slot = u32::MAX;
                self.saturated = true;
            }
        }
    }
}

// ============================================================================
// Counting
// ============================================================================

/// Count hash overlaps of every document in `segment`.
///
/// Walks `table` in order, seeking each token in `field`'s term dictionary.
/// Tokens absent from the segment contribute nothing, and a field without
/// terms yields all-zero counts. Cancellation is checked between entries.
///
/// # Errors
///
/// Read failures from the segment, a posting that names a document outside
/// the segment, and cancellation.
pub fn count_matches(
    segment: &dyn SegmentReader,
    field: &str,
    table: &HashFrequencyTable,
    cancel: &CancellationToken,
) -> HashMatchResult<OverlapCounts> {
    cancel.check()?;
    let doc_count = segment.doc_count();
    let mut counts = OverlapCounts::zeroed(doc_count);

    let Some(mut cursor) = segment.terms(field)? else {
        debug!(
            target: "hashmatch::segment",
            segment_id = segment.segment_id(),
            field,
            "Field has no terms in segment"
        );
        return Ok(counts);
    };

    let mut matched_hashes = 0usize;
    let mut postings_read = 0usize;
    for entry in table {
        cancel.check()?;

        let Some(postings) = cursor.seek_exact(entry.hash.as_bytes())? else {
            continue;
        };
        matched_hashes += 1;

        for posting in postings {
            let posting = posting?;
            if posting.doc_id >= doc_count {
                return Err(HashMatchError::DocIdOutOfRange {
                    doc_id: posting.doc_id,
                    doc_count,
                });
            }
            counts.credit(posting.doc_id, entry.freq.min(posting.tf));
            postings_read += 1;
        }
    }

    if counts.saturated() {
        warn!(
            target: "hashmatch::segment",
            segment_id = segment.segment_id(),
            field,
            "Overlap counter saturated at u32::MAX"
        );
    }

    debug!(
        target: "hashmatch::segment",
        segment_id = segment.segment_id(),
        hashes = table.len(),
        matched_hashes,
        postings_read,
        "Overlap counts computed"
    );

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{MemorySegment, PostingIter, TermCursor};
    use hashmatch_core::{HashAndFreq, HashToken};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn table(entries: &[(&[u8], u32)]) -> HashFrequencyTable {
        HashFrequencyTable::from_unsorted(
            entries.iter().map(|(h, f)| HashAndFreq::new(*h, *f)).collect(),
        )
    }

    fn scenario_a() -> MemorySegment {
        let mut builder = MemorySegment::builder(0);
        builder
            .add_posting("f", &b"h1"[..], 0, 1)
            .add_posting("f", &b"h1"[..], 1, 1)
            .add_posting("f", &b"h2"[..], 1, 3);
        builder.with_doc_count(4).build()
    }

    #[test]
    fn test_min_of_freq_and_tf() {
        let seg = scenario_a();
        let counts = count_matches(
            &seg,
            "f",
            &table(&[(b"h1", 1), (b"h2", 2)]),
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(counts.as_slice(), &[1, 3, 0, 0]);
        assert_eq!(counts.max(), 3);
        assert!(!counts.saturated());
    }

    #[test]
    fn test_absent_token_contributes_nothing() {
        let seg = scenario_a();
        let cancel = CancellationToken::new();
        let with = count_matches(&seg, "f", &table(&[(b"h1", 1), (b"zz", 5)]), &cancel).unwrap();
        let without = count_matches(&seg, "f", &table(&[(b"h1", 1)]), &cancel).unwrap();
        assert_eq!(with, without);
    }

    #[test]
    fn test_missing_field_is_all_zero() {
        let seg = scenario_a();
        let counts =
            count_matches(&seg, "other", &table(&[(b"h1", 1)]), &CancellationToken::new())
                .unwrap();
        assert_eq!(counts.as_slice(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_empty_table_and_empty_segment() {
        let seg = scenario_a();
        let cancel = CancellationToken::new();
        let counts = count_matches(&seg, "f", &table(&[]), &cancel).unwrap();
        assert_eq!(counts.as_slice(), &[0, 0, 0, 0]);

        let empty = MemorySegment::builder(1).build();
        let counts = count_matches(&empty, "f", &table(&[(b"h1", 1)]), &cancel).unwrap();
        assert!(counts.is_empty());
    }

    #[test]
    fn test_duplicate_hashes_add_up() {
        let seg = scenario_a();
        let counts = count_matches(
            &seg,
            "f",
            &table(&[(b"h1", 1), (b"h1", 1)]),
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(counts.as_slice(), &[2, 2, 0, 0]);
    }

    #[test]
    fn test_zero_frequency_gives_no_credit() {
        let seg = scenario_a();
        let counts =
            count_matches(&seg, "f", &table(&[(b"h2", 0)]), &CancellationToken::new()).unwrap();
        assert_eq!(counts.max(), 0);
    }

    #[test]
    fn test_cancelled_before_start() {
        let seg = scenario_a();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = count_matches(&seg, "f", &table(&[(b"h1", 1)]), &cancel);
        assert!(matches!(result, Err(HashMatchError::Cancelled)));
    }

    #[test]
    fn test_saturating_credit() {
        let mut counts = OverlapCounts::from_counts(vec![u32::MAX - 1, 0]);
        counts.credit(0, 5);
        counts.credit(1, 5);
        assert_eq!(counts.as_slice(), &[u32::MAX, 5]);
        assert!(counts.saturated());
    }

    #[test]
    fn test_count_matches_saturates() {
        let mut builder = MemorySegment::builder(0);
        builder
            .add_posting("f", &b"a"[..], 0, u32::MAX)
            .add_posting("f", &b"b"[..], 0, u32::MAX)
            .add_posting("f", &b"b"[..], 1, 3);
        let seg = builder.build();

        let counts = count_matches(
            &seg,
            "f",
            &table(&[(b"a", u32::MAX), (b"b", u32::MAX)]),
            &CancellationToken::new(),
        )
        .unwrap();
        assert!(counts.saturated());
        assert_eq!(counts.as_slice(), &[u32::MAX, 3]);
    }

    fn descending_and_interleaved() -> Vec<HashAndFreq> {
        [(b"h", 1u32), (b"c", 2), (b"f", 1), (b"a", 1), (b"c", 1), (b"h", 2)]
            .iter()
            .map(|(h, f)| HashAndFreq::new(&h[..], *f))
            .collect()
    }

    fn unsorted_segment() -> MemorySegment {
        let mut builder = MemorySegment::builder(5);
        for (doc, tokens) in [
            (0u32, &[b"a", b"c", b"h"][..]),
            (1, &[b"c", b"c", b"f"][..]),
            (2, &[b"h", b"h", b"a"][..]),
            (3, &[b"f", b"b", b"c"][..]),
        ] {
            for token in tokens {
                builder.add_posting("f", &token[..], doc, 1);
            }
        }
        builder.build()
    }

    #[test]
    fn test_unsorted_table_counts_like_sorted() {
        let raw = HashFrequencyTable::from_raw(descending_and_interleaved());
        assert!(!raw.is_sorted());
        let sorted = HashFrequencyTable::from_unsorted(descending_and_interleaved());

        let memory = unsorted_segment();
        let sealed = crate::segment::SealedSegment::seal(&memory);
        let cancel = CancellationToken::new();
        let readers: [&dyn SegmentReader; 2] = [&memory, &sealed];
        for reader in readers {
            let from_raw = count_matches(reader, "f", &raw, &cancel).unwrap();
            let from_sorted = count_matches(reader, "f", &sorted, &cancel).unwrap();
            assert_eq!(from_raw, from_sorted);
            assert_eq!(from_raw.as_slice(), &[5, 4, 4, 3]);
        }
    }

    /// Reader whose postings name a document past the end of the segment
    struct OutOfRangeSegment;

    struct OutOfRangeCursor(Vec<crate::segment::PostingEntry>);

    impl TermCursor for OutOfRangeCursor {
        fn seek_exact(&mut self, _token: &[u8]) -> HashMatchResult<Option<PostingIter<'_>>> {
            Ok(Some(PostingIter::Slice(self.0.iter())))
        }
    }

    impl SegmentReader for OutOfRangeSegment {
        fn segment_id(&self) -> u64 {
            9
        }
        fn doc_count(&self) -> u32 {
            2
        }
        fn terms(&self, _field: &str) -> HashMatchResult<Option<Box<dyn TermCursor + '_>>> {
            Ok(Some(Box::new(OutOfRangeCursor(vec![
                crate::segment::PostingEntry::new(0, 1),
                crate::segment::PostingEntry::new(5, 1),
            ]))))
        }
    }

    #[test]
    fn test_out_of_range_doc_is_an_error() {
        let result = count_matches(
            &OutOfRangeSegment,
            "f",
            &table(&[(b"x", 1)]),
            &CancellationToken::new(),
        );
        assert!(matches!(
            result,
            Err(HashMatchError::DocIdOutOfRange {
                doc_id: 5,
                doc_count: 2
            })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn counts_match_brute_force(
            docs in prop::collection::vec(prop::collection::vec(0u32..12, 0..10), 0..20),
            query in prop::collection::vec((0u32..14, 0u32..4), 0..12),
        ) {
            let mut builder = MemorySegment::builder(0);
            for tokens in &docs {
                let tokens: Vec<HashToken> = tokens.iter().map(|t| HashToken::from_u32(*t)).collect();
                builder.index_document("f", &tokens);
            }
            let seg = builder.build();

            let entries: Vec<HashAndFreq> = query
                .iter()
                .map(|(h, f)| HashAndFreq::new(HashToken::from_u32(*h), *f))
                .collect();
            let table = HashFrequencyTable::from_unsorted(entries);
            let counts = count_matches(&seg, "f", &table, &CancellationToken::new()).unwrap();

            for (doc_id, tokens) in docs.iter().enumerate() {
                let mut tf: BTreeMap<u32, u32> = BTreeMap::new();
                for t in tokens {
                    *tf.entry(*t).or_insert(0) += 1;
                }
                let expected: u32 = query
                    .iter()
                    .map(|(h, f)| (*f).min(tf.get(h).copied().unwrap_or(0)))
                    .sum();
                prop_assert_eq!(counts.get(doc_id as u32), Some(expected));
            }
        }

        #[test]
        fn counting_is_idempotent(
            docs in prop::collection::vec(prop::collection::vec(0u32..8, 0..6), 0..10),
            query in prop::collection::vec((0u32..8, 1u32..3), 0..8),
        ) {
            let mut builder = MemorySegment::builder(0);
            for tokens in &docs {
                let tokens: Vec<HashToken> = tokens.iter().map(|t| HashToken::from_u32(*t)).collect();
                builder.index_document("f", &tokens);
            }
            let seg = builder.build();
            let table = HashFrequencyTable::from_unsorted(
                query.iter().map(|(h, f)| HashAndFreq::new(HashToken::from_u32(*h), *f)).collect(),
            );
            let cancel = CancellationToken::new();
            let first = count_matches(&seg, "f", &table, &cancel).unwrap();
            let second = count_matches(&seg, "f", &table, &cancel).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
