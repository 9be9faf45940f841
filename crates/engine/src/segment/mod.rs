//! Segment readers: per-segment access to hash-token posting lists
//!
//! The matching core only needs two things from an index segment: its
//! document count and, per field, a cursor that can seek an exact hash
//! token and enumerate the token's posting list in increasing doc-id order.
//! Those are captured by [`SegmentReader`] and [`TermCursor`].
//!
//! Two readers are provided:
//! - [`MemorySegment`]: in-memory segment built by [`MemorySegmentBuilder`]
//! - [`SealedSegment`]: immutable binary segment, owned or mmap-backed
//!
//! # Sorted Seeking
//!
//! Cursors remember where their previous seek landed in the term
//! dictionary. Seeking tokens in ascending order (the order of a sorted
//! [`HashFrequencyTable`](hashmatch_core::HashFrequencyTable)) only searches
//! the remaining suffix of the dictionary. A token smaller than the previous
//! one restarts the search from the front.

mod memory;
mod sealed;

pub use memory::{MemorySegment, MemorySegmentBuilder};
pub use sealed::{EncodedPostings, SealedSegment};

use hashmatch_core::{DocId, HashMatchResult};
use std::cmp::Ordering;
use std::sync::Arc;

// ============================================================================
// PostingEntry
// ============================================================================

/// Entry in a posting list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingEntry {
    /// Segment-relative document id
    pub doc_id: DocId,
    /// Occurrences of the token in this document
    pub tf: u32,
}

impl PostingEntry {
    /// Create a new posting entry
    pub fn new(doc_id: DocId, tf: u32) -> Self {
        PostingEntry { doc_id, tf }
    }
}

// ============================================================================
// Reader traits
// ============================================================================

/// Read-only view of one index segment
///
/// Implementations must be shareable across threads; every query execution
/// opens its own [`TermCursor`].
pub trait SegmentReader: Send + Sync {
    /// Stable identifier of the segment
    fn segment_id(&self) -> u64;

    /// Number of documents, i.e. the size of the segment's doc-id space
    fn doc_count(&self) -> u32;

    /// Open a term cursor over `field`.
    ///
    /// Returns `None` when the field has no terms in this segment.
    fn terms(&self, field: &str) -> HashMatchResult<Option<Box<dyn TermCursor + '_>>>;
}

impl<T: SegmentReader + ?Sized> SegmentReader for &T {
    fn segment_id(&self) -> u64 {
        (**self).segment_id()
    }

    fn doc_count(&self) -> u32 {
        (**self).doc_count()
    }

    fn terms(&self, field: &str) -> HashMatchResult<Option<Box<dyn TermCursor + '_>>> {
        (**self).terms(field)
    }
}

impl<T: SegmentReader + ?Sized> SegmentReader for Arc<T> {
    fn segment_id(&self) -> u64 {
        (**self).segment_id()
    }

    fn doc_count(&self) -> u32 {
        (**self).doc_count()
    }

    fn terms(&self, field: &str) -> HashMatchResult<Option<Box<dyn TermCursor + '_>>> {
        (**self).terms(field)
    }
}

/// Cursor over one field's term dictionary
pub trait TermCursor {
    /// Seek an exact token and return its posting list.
    ///
    /// `Ok(None)` means the token does not occur in the segment. Errors are
    /// read failures and abort the caller's query.
    fn seek_exact(&mut self, token: &[u8]) -> HashMatchResult<Option<PostingIter<'_>>>;
}

// ============================================================================
// PostingIter
// ============================================================================

/// Posting list traversal, in increasing doc-id order
pub enum PostingIter<'a> {
    /// Decoded entries held in memory
    Slice(std::slice::Iter<'a, PostingEntry>),
    /// Entries decoded lazily from sealed segment bytes
    Encoded(EncodedPostings<'a>),
}

impl PostingIter<'_> {
    /// Number of entries not yet returned
    pub fn cost(&self) -> usize {
        match self {
            PostingIter::Slice(it) => it.len(),
            PostingIter::Encoded(it) => it.remaining(),
        }
    }
}

impl Iterator for PostingIter<'_> {
    type Item = HashMatchResult<PostingEntry>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        match self {
            PostingIter::Slice(it) => it.next().copied().map(Ok),
            PostingIter::Encoded(it) => it.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let r = self.cost();
        (0, Some(r))
    }
}

// ============================================================================
// Dictionary seeking
// ============================================================================

/// Seek position shared by both cursor implementations.
///
/// Tracks the dictionary index of the previous seek and the token it was
/// for, and narrows the next binary search accordingly.
#[derive(Debug, Default)]
pub(crate) struct SeekState {
    floor: usize,
    last: Vec<u8>,
}

impl SeekState {
    /// Binary search `token` in a dictionary of `len` entries.
    ///
    /// `cmp_at(i)` compares the dictionary entry at `i` against `token`.
    /// Returns the matching index, or `None` if absent.
    pub(crate) fn seek<F>(
        &mut self,
        token: &[u8],
        len: usize,
        mut cmp_at: F,
    ) -> HashMatchResult<Option<usize>>
    where
        F: FnMut(usize) -> HashMatchResult<Ordering>,
    {
        if token < self.last.as_slice() {
            self.floor = 0;
        }
        self.last.clear();
        self.last.extend_from_slice(token);

        let mut lo = self.floor.min(len);
        let mut hi = len;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match cmp_at(mid)? {
                Ordering::Equal => {
                    // Stay on the entry: a duplicate query hash seeks it again.
                    self.floor = mid;
                    return Ok(Some(mid));
                }
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
            }
        }
        self.floor = lo;
        Ok(None)
    }
}
