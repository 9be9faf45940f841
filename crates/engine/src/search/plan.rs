//! Per-segment query execution
//!
//! A [`SegmentQueryPlan`] takes one segment through the query lifecycle:
//!
//! ```text
//! Built -> CountsComputed -> ThresholdComputed -> IteratorReady -> Scoring -> Done
//! ```
//!
//! Counts are computed at most once per plan and owned by it. The
//! [`SegmentScorer`] borrows them while it walks the candidates.

use super::cancel::CancellationToken;
use super::counter::{count_matches, OverlapCounts};
use super::iterator::{CandidateIterator, DocPosition};
use super::query::HashMatchQuery;
use super::scorer::ScoreFunction;
use super::selector::{select_threshold, CandidateThreshold};
use crate::segment::SegmentReader;
use hashmatch_core::{DocId, HashMatchResult};
use std::cell::{Cell, OnceCell};
use tracing::debug;

/// Lifecycle state of a [`SegmentQueryPlan`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlanState {
    /// Created, nothing read yet
    Built,
    /// Overlap counts available
    CountsComputed,
    /// Candidate threshold chosen
    ThresholdComputed,
    /// Scorer handed out, not advanced yet
    IteratorReady,
    /// Scorer is walking candidates
    Scoring,
    /// Candidates exhausted
    Done,
}

/// One scored candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDoc {
    /// Segment-relative document id
    pub doc_id: DocId,
    /// Number of matched hashes
    pub overlap: u32,
    /// Score from the query's score function
    pub score: f32,
}

/// Candidates of one segment, in doc-id order
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentHits {
    /// Segment the hits belong to
    pub segment_id: u64,
    /// Scored candidates, unranked
    pub hits: Vec<ScoredDoc>,
}

// ============================================================================
// SegmentQueryPlan
// ============================================================================

/// Execution of a [`HashMatchQuery`] against one segment
pub struct SegmentQueryPlan<'a> {
    query: &'a HashMatchQuery,
    segment: &'a dyn SegmentReader,
    cancel: CancellationToken,
    state: Cell<PlanState>,
    counts: OnceCell<OverlapCounts>,
    threshold: Cell<Option<CandidateThreshold>>,
}

impl<'a> SegmentQueryPlan<'a> {
    pub(crate) fn new(
        query: &'a HashMatchQuery,
        segment: &'a dyn SegmentReader,
        cancel: CancellationToken,
    ) -> Self {
        SegmentQueryPlan {
            query,
            segment,
            cancel,
            state: Cell::new(PlanState::Built),
            counts: OnceCell::new(),
            threshold: Cell::new(None),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> PlanState {
        self.state.get()
    }

    /// Segment this plan runs on
    pub fn segment_id(&self) -> u64 {
        self.segment.segment_id()
    }

    /// Compute overlap counts, or return the ones already computed
    pub fn counts(&self) -> HashMatchResult<&OverlapCounts> {
        if let Some(counts) = self.counts.get() {
            return Ok(counts);
        }
        let counts = count_matches(
            self.segment,
            self.query.field(),
            self.query.table(),
            &self.cancel,
        )?;
        self.advance_state(PlanState::CountsComputed);
        Ok(self.counts.get_or_init(|| counts))
    }

    /// Select the candidate threshold, computing counts first if needed
    pub fn threshold(&self) -> HashMatchResult<CandidateThreshold> {
        if let Some(threshold) = self.threshold.get() {
            return Ok(threshold);
        }
        let counts = self.counts()?;
        let threshold = select_threshold(counts, self.query.candidates());
        self.threshold.set(Some(threshold));
        self.advance_state(PlanState::ThresholdComputed);

        debug!(
            target: "hashmatch::query",
            segment_id = self.segment_id(),
            doc_count = counts.len(),
            candidates = self.query.candidates(),
            threshold = ?threshold,
            "Candidate threshold selected"
        );
        Ok(threshold)
    }

    /// Scorer over this segment's candidates
    ///
    /// Builds the segment's score function from the query's factory.
    pub fn scorer(&self) -> HashMatchResult<SegmentScorer<'_>> {
        let threshold = self.threshold()?;
        let counts = self.counts()?;
        let iter = CandidateIterator::new(counts, threshold)
            .with_cancellation(self.cancel.clone(), self.query.cancel_check_interval());
        let score_fn = self.query.factory().for_segment(self.segment);
        self.advance_state(PlanState::IteratorReady);

        Ok(SegmentScorer {
            iter,
            counts,
            score_fn,
            state: &self.state,
        })
    }

    /// Run the plan to completion
    pub fn execute(&self) -> HashMatchResult<SegmentHits> {
        let hits = self.scorer()?.collect_all()?;
        debug!(
            target: "hashmatch::query",
            segment_id = self.segment_id(),
            hits = hits.len(),
            "Segment scored"
        );
        Ok(SegmentHits {
            segment_id: self.segment_id(),
            hits,
        })
    }

    fn advance_state(&self, to: PlanState) {
        if to > self.state.get() {
            self.state.set(to);
        }
    }
}

// ============================================================================
// SegmentScorer
// ============================================================================

/// Walks and scores the candidates of one segment
pub struct SegmentScorer<'p> {
    iter: CandidateIterator<'p>,
    counts: &'p OverlapCounts,
    score_fn: Box<dyn ScoreFunction>,
    state: &'p Cell<PlanState>,
}

impl SegmentScorer<'_> {
    /// Current position
    pub fn doc_id(&self) -> DocPosition {
        self.iter.current()
    }

    /// Move to the next candidate
    pub fn next_doc(&mut self) -> HashMatchResult<DocPosition> {
        let pos = self.iter.advance_to_next()?;
        self.track(pos);
        Ok(pos)
    }

    /// Move to the first candidate with id `>= target`
    pub fn advance(&mut self, target: DocId) -> HashMatchResult<DocPosition> {
        let pos = self.iter.advance_to(target)?;
        self.track(pos);
        Ok(pos)
    }

    /// Overlap count of the current candidate
    pub fn overlap(&self) -> Option<u32> {
        self.iter.current().doc_id().and_then(|id| self.counts.get(id))
    }

    /// Score of the current candidate, narrowed to `f32`
    pub fn score(&self) -> Option<f32> {
        let doc_id = self.iter.current().doc_id()?;
        let overlap = self.counts.get(doc_id)?;
        Some(self.score_fn.score(doc_id, overlap) as f32)
    }

    /// Upper bound on any score: unbounded
    pub fn max_score(&self) -> f32 {
        f32::MAX
    }

    /// Cost estimate, the segment's document count
    pub fn cost(&self) -> usize {
        self.iter.estimated_count()
    }

    /// Score every remaining candidate
    pub fn collect_all(mut self) -> HashMatchResult<Vec<ScoredDoc>> {
        let mut hits = Vec::new();
        while let DocPosition::Doc(doc_id) = self.next_doc()? {
            let overlap = self.counts.get(doc_id).unwrap_or(0);
            hits.push(ScoredDoc {
                doc_id,
                overlap,
                score: self.score_fn.score(doc_id, overlap) as f32,
            });
        }
        Ok(hits)
    }

    fn track(&self, pos: DocPosition) {
        let next = if pos.is_exhausted() {
            PlanState::Done
        } else {
            PlanState::Scoring
        };
        if next > self.state.get() {
            self.state.set(next);
        }
    }
}
