//! Hash-match engine
//!
//! This crate implements candidate retrieval by LSH hash overlap:
//! - Segment readers: in-memory and sealed (file-backed) posting segments
//! - Matching: overlap counting, top-K thresholding, candidate iteration
//! - Scoring: pluggable per-segment score functions
//! - Configuration via `hashmatch.toml`
//!
//! A query is built once and executed against any number of segments,
//! each independently and optionally in parallel. Results are returned per
//! segment and unranked; merging across segments is left to the caller.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod search;
pub mod segment;

pub use config::{QueryConfig, CONFIG_FILE_NAME};
pub use search::{
    count_matches, select_threshold, CancellationToken, CandidateIterator, CandidateThreshold,
    DocPosition, Explanation, FnFactory, HashMatchQuery, JaccardScore, OverlapCounts,
    OverlapScore, PlanState, ScoreFunction, ScoreFunctionFactory, ScoredDoc, SegmentHits,
    SegmentQueryPlan, SegmentScorer,
};
pub use segment::{
    MemorySegment, MemorySegmentBuilder, PostingEntry, PostingIter, SealedSegment,
    SegmentReader, TermCursor,
};
