//! Hash-match candidate retrieval
//!
//! This module contains:
//! - `counter`: per-document overlap counting against a segment
//! - `selector`: k-th greatest count threshold
//! - `iterator`: candidate doc-id iteration above the threshold
//! - `scorer`: score function strategy and factory traits
//! - `plan`: per-segment execution lifecycle and scorer
//! - `query`: the query object and multi-segment execution
//! - `cancel`: cooperative cancellation

mod cancel;
mod counter;
mod iterator;
mod plan;
mod query;
mod scorer;
mod selector;

pub use cancel::CancellationToken;
pub use counter::{count_matches, OverlapCounts};
pub use iterator::{CandidateIterator, DocPosition};
pub use plan::{PlanState, ScoredDoc, SegmentHits, SegmentQueryPlan, SegmentScorer};
pub use query::HashMatchQuery;
pub use scorer::{
    Explanation, FnFactory, JaccardScore, OverlapScore, ScoreFunction, ScoreFunctionFactory,
};
pub use selector::{kth_greatest, select_threshold, CandidateThreshold};
