//! Candidate threshold selection
//!
//! Given overlap counts and a candidate limit `k`, picks the smallest count
//! a document needs to be a candidate: the k-th greatest count. Documents
//! tied at the threshold are all admitted, so more than `k` candidates can
//! come out.

use super::counter::OverlapCounts;

/// Minimum overlap a document needs to be a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateThreshold {
    /// Limit covers the whole segment: every document, no filtering
    All,
    /// Documents whose count is at least this value
    AtLeast(u32),
    /// Non-positive limit: no documents
    Nothing,
}

impl CandidateThreshold {
    /// Whether a document with `count` overlaps qualifies
    #[inline]
    pub fn admits(&self, count: u32) -> bool {
        match *self {
            CandidateThreshold::All => true,
            CandidateThreshold::AtLeast(min) => count >= min,
            CandidateThreshold::Nothing => false,
        }
    }
}

/// Select the candidate threshold for `counts` under `candidate_limit`.
///
/// - `candidate_limit <= 0`: [`CandidateThreshold::Nothing`]
/// - `candidate_limit >= counts.len()`: [`CandidateThreshold::All`]
/// - otherwise: [`CandidateThreshold::AtLeast`] the `candidate_limit`-th
///   greatest count
pub fn select_threshold(counts: &OverlapCounts, candidate_limit: i64) -> CandidateThreshold {
    if candidate_limit <= 0 {
        return CandidateThreshold::Nothing;
    }
    let values = counts.as_slice();
    match usize::try_from(candidate_limit) {
        Ok(k) if k < values.len() => CandidateThreshold::AtLeast(kth_greatest(values, k)),
        _ => CandidateThreshold::All,
    }
}

/// Value `v` such that at least `k` entries of `values` are `>= v`, and no
/// larger value has that property.
///
/// Uses a counting histogram when the value range is no wider than the
/// input, otherwise quickselect on a copy. `values` is left untouched.
///
/// Returns 0 for empty input or `k == 0`; `k` beyond the length is clamped.
pub fn kth_greatest(values: &[u32], k: usize) -> u32 {
    if values.is_empty() || k == 0 {
        return 0;
    }
    let k = k.min(values.len());

    let mut min = u32::MAX;
    let mut max = 0u32;
    for &v in values {
        min = min.min(v);
        max = max.max(v);
    }

    let range = (max - min) as usize + 1;
    if range <= values.len() {
        kth_greatest_histogram(values, k, min, range)
    } else {
        kth_greatest_select(values, k)
    }
}

fn kth_greatest_histogram(values: &[u32], k: usize, min: u32, range: usize) -> u32 {
    let mut hist = vec![0usize; range];
    for &v in values {
        hist[(v - min) as usize] += 1;
    }

    let mut seen = 0usize;
    for (offset, &n) in hist.iter().enumerate().rev() {
        seen += n;
        if seen >= k {
            return min + offset as u32;
        }
    }
    min
}

fn kth_greatest_select(values: &[u32], k: usize) -> u32 {
    let mut scratch = values.to_vec();
    let (_, kth, _) = scratch.select_nth_unstable_by(k - 1, |a, b| b.cmp(a));
    *kth
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn counts(v: &[u32]) -> OverlapCounts {
        OverlapCounts::from_counts(v.to_vec())
    }

    #[test]
    fn test_ties_at_threshold() {
        let c = counts(&[5, 5, 3, 1]);
        assert_eq!(select_threshold(&c, 1), CandidateThreshold::AtLeast(5));
        assert_eq!(select_threshold(&c, 2), CandidateThreshold::AtLeast(5));
        assert_eq!(select_threshold(&c, 3), CandidateThreshold::AtLeast(3));
    }

    #[test]
    fn test_limit_covers_segment() {
        let c = counts(&[0, 2, 0, 1]);
        assert_eq!(select_threshold(&c, 4), CandidateThreshold::All);
        assert_eq!(select_threshold(&c, 10), CandidateThreshold::All);
        assert_eq!(select_threshold(&c, i64::MAX), CandidateThreshold::All);
    }

    #[test]
    fn test_non_positive_limit() {
        let c = counts(&[3, 2, 1]);
        assert_eq!(select_threshold(&c, 0), CandidateThreshold::Nothing);
        assert_eq!(select_threshold(&c, -7), CandidateThreshold::Nothing);
        assert!(!CandidateThreshold::Nothing.admits(u32::MAX));
    }

    #[test]
    fn test_empty_segment() {
        let c = counts(&[]);
        assert_eq!(select_threshold(&c, 1), CandidateThreshold::All);
        assert_eq!(select_threshold(&c, 0), CandidateThreshold::Nothing);
    }

    #[test]
    fn test_all_zero_counts_admit_everything() {
        let c = counts(&[0, 0, 0]);
        let t = select_threshold(&c, 1);
        assert_eq!(t, CandidateThreshold::AtLeast(0));
        assert!(t.admits(0));
    }

    #[test]
    fn test_wide_range_uses_select() {
        let values = [1_000_000, 7, 3_000_000_000, 12];
        assert_eq!(kth_greatest(&values, 1), 3_000_000_000);
        assert_eq!(kth_greatest(&values, 2), 1_000_000);
        assert_eq!(kth_greatest(&values, 4), 7);
    }

    #[test]
    fn test_kth_greatest_edges() {
        assert_eq!(kth_greatest(&[], 3), 0);
        assert_eq!(kth_greatest(&[4, 9], 0), 0);
        assert_eq!(kth_greatest(&[4, 9], 5), 4);
        assert_eq!(kth_greatest(&[u32::MAX, 0], 1), u32::MAX);
    }

    fn brute_force(values: &[u32], k: usize) -> u32 {
        let mut sorted = values.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted[k - 1]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn kth_greatest_matches_sort_narrow(
            values in prop::collection::vec(0u32..16, 1..64),
            k in 1usize..64,
        ) {
            let k = k.min(values.len());
            prop_assert_eq!(kth_greatest(&values, k), brute_force(&values, k));
        }

        #[test]
        fn kth_greatest_matches_sort_wide(
            values in prop::collection::vec(any::<u32>(), 1..64),
            k in 1usize..64,
        ) {
            let k = k.min(values.len());
            prop_assert_eq!(kth_greatest(&values, k), brute_force(&values, k));
        }

        #[test]
        fn at_least_k_admitted(
            values in prop::collection::vec(0u32..10, 1..50),
            limit in 1i64..60,
        ) {
            let c = counts(&values);
            let t = select_threshold(&c, limit);
            let admitted = values.iter().filter(|v| t.admits(**v)).count();
            prop_assert!(admitted >= (limit as usize).min(values.len()));
            // every rejected count is below every admitted count
            let max_rejected = values.iter().filter(|v| !t.admits(**v)).max();
            let min_admitted = values.iter().filter(|v| t.admits(**v)).min();
            if let (Some(r), Some(a)) = (max_rejected, min_admitted) {
                prop_assert!(r < a);
            }
        }
    }
}
