//! The hash-match query
//!
//! [`HashMatchQuery`] holds a field, a sorted hash table, a candidate limit
//! and a score function factory. It is immutable once built and is shared
//! by every segment it runs on.

use super::cancel::CancellationToken;
use super::plan::{SegmentHits, SegmentQueryPlan};
use super::scorer::{Explanation, ScoreFunctionFactory};
use crate::config::QueryConfig;
use crate::segment::SegmentReader;
use hashmatch_core::{DocId, HashAndFreq, HashFrequencyTable, HashMatchResult};
use rayon::prelude::*;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, info};

/// Candidate retrieval by LSH hash overlap
///
/// Equality and hashing cover the field, the sorted table and the
/// candidate limit. The score function factory is left out, so two queries
/// differing only in scoring compare equal.
#[derive(Clone)]
pub struct HashMatchQuery {
    field: String,
    table: HashFrequencyTable,
    candidates: i64,
    factory: Arc<dyn ScoreFunctionFactory>,
    cancel_check_interval: u32,
    parallel_segments: bool,
}

impl HashMatchQuery {
    /// Create a query, sorting `hashes` by token.
    pub fn new(
        field: impl Into<String>,
        hashes: Vec<HashAndFreq>,
        candidates: i64,
        factory: Arc<dyn ScoreFunctionFactory>,
    ) -> Self {
        Self::with_table(
            field,
            HashFrequencyTable::from_unsorted(hashes),
            candidates,
            factory,
        )
    }

    /// Create a query from a prepared table, used in the order given.
    ///
    /// Matching expects ascending token order; an unsorted table still
    /// returns correct counts but seeks through the dictionary from the
    /// start more often.
    pub fn with_table(
        field: impl Into<String>,
        table: HashFrequencyTable,
        candidates: i64,
        factory: Arc<dyn ScoreFunctionFactory>,
    ) -> Self {
        let defaults = QueryConfig::default();
        HashMatchQuery {
            field: field.into(),
            table,
            candidates,
            factory,
            cancel_check_interval: defaults.cancel_check_interval,
            parallel_segments: defaults.parallel_segments,
        }
    }

    /// Create a query taking the candidate limit and execution settings from
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `config` does not validate.
    pub fn from_config(
        field: impl Into<String>,
        hashes: Vec<HashAndFreq>,
        config: &QueryConfig,
        factory: Arc<dyn ScoreFunctionFactory>,
    ) -> HashMatchResult<Self> {
        Self::new(field, hashes, config.candidates, factory).with_config(config)
    }

    /// Apply the execution settings of `config`, keeping the candidate limit.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `config` does not validate.
    pub fn with_config(mut self, config: &QueryConfig) -> HashMatchResult<Self> {
        config.validate()?;
        self.cancel_check_interval = config.cancel_check_interval;
        self.parallel_segments = config.parallel_segments;
        Ok(self)
    }

    /// Indexed field the hashes are matched in
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Query hash table
    pub fn table(&self) -> &HashFrequencyTable {
        &self.table
    }

    /// Candidate limit per segment
    pub fn candidates(&self) -> i64 {
        self.candidates
    }

    /// Score function factory
    pub fn factory(&self) -> &dyn ScoreFunctionFactory {
        self.factory.as_ref()
    }

    /// Doc ids scanned between cancellation checks
    pub fn cancel_check_interval(&self) -> u32 {
        self.cancel_check_interval
    }

    /// Whether `execute` runs segments in parallel
    pub fn parallel_segments(&self) -> bool {
        self.parallel_segments
    }

    /// Results depend on the live segment and must not be cached
    pub fn is_cacheable(&self) -> bool {
        false
    }

    /// Explanations are not supported; always a zero-valued placeholder
    pub fn explain(&self, doc_id: DocId) -> Explanation {
        Explanation::unsupported(format!(
            "explanation is not supported for {} (doc {})",
            self, doc_id
        ))
    }

    /// Plan execution against one segment
    pub fn plan<'a>(
        &'a self,
        segment: &'a dyn SegmentReader,
        cancel: &CancellationToken,
    ) -> SegmentQueryPlan<'a> {
        SegmentQueryPlan::new(self, segment, cancel.clone())
    }

    /// Run against every segment, returning unranked hits per segment in
    /// input order.
    ///
    /// The first failing segment's error is returned.
    pub fn execute<S: SegmentReader>(
        &self,
        segments: &[S],
        cancel: &CancellationToken,
    ) -> HashMatchResult<Vec<SegmentHits>> {
        debug!(
            target: "hashmatch::query",
            query = %self,
            segments = segments.len(),
            parallel = self.parallel_segments,
            "Executing query"
        );

        let run = |segment: &S| self.plan(segment, cancel).execute();
        let results: Vec<SegmentHits> = if self.parallel_segments {
            segments.par_iter().map(run).collect::<HashMatchResult<_>>()?
        } else {
            segments.iter().map(run).collect::<HashMatchResult<_>>()?
        };

        info!(
            target: "hashmatch::query",
            field = %self.field,
            segments = results.len(),
            hits = results.iter().map(|s| s.hits.len()).sum::<usize>(),
            "Query executed"
        );
        Ok(results)
    }
}

impl fmt::Display for HashMatchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HashMatchQuery for field [{}] with [{}] hashes and [{}] candidates",
            self.field,
            self.table.len(),
            self.candidates
        )
    }
}

impl fmt::Debug for HashMatchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashMatchQuery")
            .field("field", &self.field)
            .field("hashes", &self.table.len())
            .field("candidates", &self.candidates)
            .field("factory", &self.factory.name())
            .finish()
    }
}

impl PartialEq for HashMatchQuery {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field
            && self.candidates == other.candidates
            && self.table == other.table
    }
}

impl Eq for HashMatchQuery {}

impl Hash for HashMatchQuery {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.field.hash(state);
        self.table.hash(state);
        self.candidates.hash(state);
    }
}
