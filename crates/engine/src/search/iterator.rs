//! Candidate document iterator
//!
//! Walks a segment's doc ids in increasing order and stops only on
//! documents the [`CandidateThreshold`] admits. The iterator borrows the
//! overlap counts owned by the segment plan.

use super::cancel::CancellationToken;
use super::counter::OverlapCounts;
use super::selector::CandidateThreshold;
use hashmatch_core::{DocId, HashMatchResult};

/// Position of a [`CandidateIterator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocPosition {
    /// Not advanced yet
    BeforeStart,
    /// On a candidate document
    Doc(DocId),
    /// Past the last candidate; stays here
    Exhausted,
}

impl DocPosition {
    /// Document id, if positioned on one
    pub fn doc_id(&self) -> Option<DocId> {
        match *self {
            DocPosition::Doc(id) => Some(id),
            _ => None,
        }
    }

    /// True once iteration is over
    pub fn is_exhausted(&self) -> bool {
        matches!(self, DocPosition::Exhausted)
    }
}

/// Forward-only iterator over candidate documents
#[derive(Debug)]
pub struct CandidateIterator<'a> {
    counts: &'a OverlapCounts,
    threshold: CandidateThreshold,
    position: DocPosition,
    cancel: Option<CancellationToken>,
    check_interval: u32,
    scanned: u32,
}

impl<'a> CandidateIterator<'a> {
    /// Iterate documents of `counts` admitted by `threshold`
    pub fn new(counts: &'a OverlapCounts, threshold: CandidateThreshold) -> Self {
        CandidateIterator {
            counts,
            threshold,
            position: DocPosition::BeforeStart,
            cancel: None,
            check_interval: u32::MAX,
            scanned: 0,
        }
    }

    /// Poll `cancel` once every `interval` scanned doc ids
    pub fn with_cancellation(mut self, cancel: CancellationToken, interval: u32) -> Self {
        self.cancel = Some(cancel);
        self.check_interval = interval.max(1);
        self
    }

    /// Current position
    pub fn current(&self) -> DocPosition {
        self.position
    }

    /// Threshold documents are filtered by
    pub fn threshold(&self) -> CandidateThreshold {
        self.threshold
    }

    /// Cost estimate: the segment's document count.
    ///
    /// An upper bound, not the number of candidates.
    pub fn estimated_count(&self) -> usize {
        self.counts.len()
    }

    /// Move to the next candidate after the current position
    pub fn advance_to_next(&mut self) -> HashMatchResult<DocPosition> {
        let start = match self.position {
            DocPosition::BeforeStart => 0usize,
            DocPosition::Doc(id) => id as usize + 1,
            DocPosition::Exhausted => return Ok(DocPosition::Exhausted),
        };
        self.scan_from(start)
    }

    /// Move to the first candidate with id `>= target`.
    ///
    /// Does not move when already on such a candidate.
    pub fn advance_to(&mut self, target: DocId) -> HashMatchResult<DocPosition> {
        let start = match self.position {
            DocPosition::Doc(id) if id >= target => return Ok(self.position),
            DocPosition::Doc(id) => (id as usize + 1).max(target as usize),
            DocPosition::BeforeStart => target as usize,
            DocPosition::Exhausted => return Ok(DocPosition::Exhausted),
        };
        self.scan_from(start)
    }

    fn scan_from(&mut self, start: usize) -> HashMatchResult<DocPosition> {
        if self.threshold == CandidateThreshold::Nothing {
            self.position = DocPosition::Exhausted;
            return Ok(self.position);
        }

        let counts: &'a [u32] = self.counts.as_slice();
        for (id, &count) in counts.iter().enumerate().skip(start) {
            self.poll_cancel()?;
            if self.threshold.admits(count) {
                self.position = DocPosition::Doc(id as DocId);
                return Ok(self.position);
            }
        }
        self.position = DocPosition::Exhausted;
        Ok(self.position)
    }

    #[inline]
    fn poll_cancel(&mut self) -> HashMatchResult<()> {
        let Some(cancel) = &self.cancel else {
            return Ok(());
        };
        self.scanned += 1;
        if self.scanned >= self.check_interval {
            self.scanned = 0;
            if let Err(e) = cancel.check() {
                self.position = DocPosition::Exhausted;
                return Err(e);
            }
        }
        Ok(())
    }
}

impl Iterator for CandidateIterator<'_> {
    type Item = HashMatchResult<DocId>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance_to_next() {
            Ok(DocPosition::Doc(id)) => Some(Ok(id)),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
