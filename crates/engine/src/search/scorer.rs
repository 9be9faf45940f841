//! Scoring strategies for matched candidates
//!
//! A [`ScoreFunctionFactory`] is asked once per segment for a
//! [`ScoreFunction`], which then scores each candidate from its doc id and
//! overlap count. Factories are shared by every segment a query runs on, so
//! both traits require `Send + Sync`.

use crate::segment::SegmentReader;
use hashmatch_core::DocId;
use std::fmt;

// ============================================================================
// Traits
// ============================================================================

/// Per-segment scoring strategy
pub trait ScoreFunction: Send + Sync {
    /// Score a candidate document with `overlap` matching hashes
    fn score(&self, doc_id: DocId, overlap: u32) -> f64;
}

impl<F> ScoreFunction for F
where
    F: Fn(DocId, u32) -> f64 + Send + Sync,
{
    fn score(&self, doc_id: DocId, overlap: u32) -> f64 {
        self(doc_id, overlap)
    }
}

/// Builds a [`ScoreFunction`] for each segment
///
/// The segment reader is passed in so that functions can look up
/// segment-local data before scoring.
pub trait ScoreFunctionFactory: Send + Sync {
    /// Create the score function for `segment`
    fn for_segment(&self, segment: &dyn SegmentReader) -> Box<dyn ScoreFunction>;

    /// Name for logging and display
    fn name(&self) -> &str;
}

// ============================================================================
// OverlapScore
// ============================================================================

/// Scores a candidate by its raw overlap count
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlapScore;

impl ScoreFunction for OverlapScore {
    fn score(&self, _doc_id: DocId, overlap: u32) -> f64 {
        overlap as f64
    }
}

impl ScoreFunctionFactory for OverlapScore {
    fn for_segment(&self, _segment: &dyn SegmentReader) -> Box<dyn ScoreFunction> {
        Box::new(OverlapScore)
    }

    fn name(&self) -> &str {
        "overlap"
    }
}

// ============================================================================
// JaccardScore
// ============================================================================

/// Scores a candidate by the fraction of query hashes it matched
///
/// `overlap / query_hashes`, usually with `query_hashes` set to the query
/// table's total frequency. Lies in `[0.0, 1.0]`; zero query hashes score
/// everything 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JaccardScore {
    query_hashes: u64,
}

impl JaccardScore {
    /// Score against `query_hashes` expected hash occurrences
    pub fn new(query_hashes: u64) -> Self {
        JaccardScore { query_hashes }
    }
}

impl ScoreFunction for JaccardScore {
    fn score(&self, _doc_id: DocId, overlap: u32) -> f64 {
        if self.query_hashes == 0 {
            return 0.0;
        }
        (overlap as f64 / self.query_hashes as f64).min(1.0)
    }
}

impl ScoreFunctionFactory for JaccardScore {
    fn for_segment(&self, _segment: &dyn SegmentReader) -> Box<dyn ScoreFunction> {
        Box::new(*self)
    }

    fn name(&self) -> &str {
        "jaccard"
    }
}

// ============================================================================
// FnFactory
// ============================================================================

/// Factory from a closure
pub struct FnFactory<F> {
    name: String,
    build: F,
}

impl<F> FnFactory<F>
where
    F: Fn(&dyn SegmentReader) -> Box<dyn ScoreFunction> + Send + Sync,
{
    /// Wrap `build` under `name`
    pub fn new(name: impl Into<String>, build: F) -> Self {
        FnFactory {
            name: name.into(),
            build,
        }
    }
}

impl<F> ScoreFunctionFactory for FnFactory<F>
where
    F: Fn(&dyn SegmentReader) -> Box<dyn ScoreFunction> + Send + Sync,
{
    fn for_segment(&self, segment: &dyn SegmentReader) -> Box<dyn ScoreFunction> {
        (self.build)(segment)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> fmt::Debug for FnFactory<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFactory").field("name", &self.name).finish()
    }
}

// ============================================================================
// Explanation
// ============================================================================

/// Score explanation for one document
///
/// Hash matching does not break its scores down, so explanations are
/// placeholders with `supported == false`.
#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    /// Explained score
    pub value: f32,
    /// Human-readable description
    pub description: String,
    /// False when no real breakdown is available
    pub supported: bool,
}

impl Explanation {
    /// Placeholder for a query that cannot explain its scores
    pub fn unsupported(description: impl Into<String>) -> Self {
        Explanation {
            value: 0.0,
            description: description.into(),
            supported: false,
        }
    }
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.value, self.description)
    }
}
