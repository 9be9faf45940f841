//! In-memory segment
//!
//! Holds, per field, a sorted token dictionary and decoded posting lists.
//! Built with [`MemorySegmentBuilder`], which counts term frequencies per
//! document the same way sealed segments are produced.

use super::{PostingEntry, PostingIter, SeekState, SegmentReader, TermCursor};
use hashmatch_core::{DocId, HashMatchResult, HashToken};
use std::collections::{BTreeMap, HashMap};

/// Sorted postings of one field
#[derive(Debug, Clone, Default)]
pub(crate) struct FieldPostings {
    pub(crate) tokens: Vec<HashToken>,
    pub(crate) postings: Vec<Vec<PostingEntry>>,
}

/// Immutable in-memory segment
#[derive(Debug, Clone)]
pub struct MemorySegment {
    segment_id: u64,
    doc_count: u32,
    fields: BTreeMap<String, FieldPostings>,
}

impl MemorySegment {
    /// Start building a segment
    pub fn builder(segment_id: u64) -> MemorySegmentBuilder {
        MemorySegmentBuilder::new(segment_id)
    }

    /// Field names in ascending order
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|s| s.as_str())
    }

    /// Tokens and posting lists of a field, in token order
    pub fn field_postings(
        &self,
        field: &str,
    ) -> impl Iterator<Item = (&HashToken, &[PostingEntry])> {
        self.fields
            .get(field)
            .into_iter()
            .flat_map(|f| f.tokens.iter().zip(f.postings.iter().map(|p| p.as_slice())))
    }

    /// Number of distinct tokens in a field
    pub fn term_count(&self, field: &str) -> usize {
        self.fields.get(field).map(|f| f.tokens.len()).unwrap_or(0)
    }
}

impl SegmentReader for MemorySegment {
    fn segment_id(&self) -> u64 {
        self.segment_id
    }

    fn doc_count(&self) -> u32 {
        self.doc_count
    }

    fn terms(&self, field: &str) -> HashMatchResult<Option<Box<dyn TermCursor + '_>>> {
        Ok(self.fields.get(field).map(|postings| {
            Box::new(MemoryTermCursor {
                postings,
                seek: SeekState::default(),
            }) as Box<dyn TermCursor + '_>
        }))
    }
}

struct MemoryTermCursor<'a> {
    postings: &'a FieldPostings,
    seek: SeekState,
}

impl TermCursor for MemoryTermCursor<'_> {
    fn seek_exact(&mut self, token: &[u8]) -> HashMatchResult<Option<PostingIter<'_>>> {
        let tokens = &self.postings.tokens;
        let found = self
            .seek
            .seek(token, tokens.len(), |i| Ok(tokens[i].as_bytes().cmp(token)))?;
        Ok(found.map(|i| PostingIter::Slice(self.postings.postings[i].iter())))
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`MemorySegment`]
///
/// Documents get consecutive ids starting at zero.
#[derive(Debug, Default)]
pub struct MemorySegmentBuilder {
    segment_id: u64,
    doc_count: u32,
    fields: BTreeMap<String, BTreeMap<HashToken, BTreeMap<DocId, u32>>>,
}

impl MemorySegmentBuilder {
    /// Create an empty builder
    pub fn new(segment_id: u64) -> Self {
        MemorySegmentBuilder {
            segment_id,
            ..Default::default()
        }
    }

    /// Add a document whose `field` holds `tokens`, returning its id.
    ///
    /// A token repeated in `tokens` raises that document's term frequency.
    pub fn index_document(&mut self, field: &str, tokens: &[HashToken]) -> DocId {
        let doc_id = self.add_document();

        let mut tf_map: HashMap<&HashToken, u32> = HashMap::with_capacity(tokens.len());
        for token in tokens {
            *tf_map.entry(token).or_insert(0) += 1;
        }

        let terms = self.fields.entry(field.to_string()).or_default();
        for (token, tf) in tf_map {
            terms.entry(token.clone()).or_default().insert(doc_id, tf);
        }
        doc_id
    }

    /// Add a document without any tokens, returning its id.
    ///
    /// The document count stops at `u32::MAX`; ids handed out past that
    /// point fall outside the segment and fail the query that reads them.
    pub fn add_document(&mut self) -> DocId {
        let doc_id = self.doc_count;
        self.doc_count = self.doc_count.saturating_add(1);
        doc_id
    }

    /// Record `tf` more occurrences of `token` in `doc_id`.
    ///
    /// Grows the document count to cover `doc_id`.
    pub fn add_posting(
        &mut self,
        field: &str,
        token: impl Into<HashToken>,
        doc_id: DocId,
        tf: u32,
    ) -> &mut Self {
        let slot = self
            .fields
            .entry(field.to_string())
            .or_default()
            .entry(token.into())
            .or_default()
            .entry(doc_id)
            .or_insert(0);
        *slot = slot.saturating_add(tf);
        self.doc_count = self.doc_count.max(doc_id.saturating_add(1));
        self
    }

    /// Ensure the segment has at least `doc_count` documents
    pub fn with_doc_count(mut self, doc_count: u32) -> Self {
        self.doc_count = self.doc_count.max(doc_count);
        self
    }

    /// Number of documents added so far
    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    /// Freeze into a sorted, immutable segment
    pub fn build(self) -> MemorySegment {
        let fields = self
            .fields
            .into_iter()
            .map(|(name, terms)| {
                let mut field = FieldPostings::default();
                for (token, docs) in terms {
                    field.tokens.push(token);
                    field.postings.push(
                        docs.into_iter()
                            .map(|(doc_id, tf)| PostingEntry::new(doc_id, tf))
                            .collect(),
                    );
                }
                (name, field)
            })
            .collect();

        MemorySegment {
            segment_id: self.segment_id,
            doc_count: self.doc_count,
            fields,
        }
    }
}
