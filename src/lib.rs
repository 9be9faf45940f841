//! hashmatch - candidate retrieval by LSH hash overlap
//!
//! A query is a bag of locality-sensitive hash tokens. For every document
//! of an index segment, hashmatch counts how many of those tokens the
//! document shares, keeps the documents whose count reaches the K-th
//! greatest, and scores them with a pluggable per-segment score function.
//!
//! # Quick Start
//!
//! ```
//! use hashmatch::{CancellationToken, HashAndFreq, HashMatchQuery, HashToken, MemorySegment, OverlapScore};
//! use std::sync::Arc;
//!
//! let mut builder = MemorySegment::builder(0);
//! builder.index_document("vec", &[HashToken::from_u32(1), HashToken::from_u32(2)]);
//! builder.index_document("vec", &[HashToken::from_u32(2)]);
//! let segment = builder.build();
//!
//! let query = HashMatchQuery::new(
//!     "vec",
//!     vec![HashAndFreq::once(HashToken::from_u32(1)), HashAndFreq::once(HashToken::from_u32(2))],
//!     1,
//!     Arc::new(OverlapScore),
//! );
//! let hits = query.plan(&segment, &CancellationToken::new()).execute()?;
//! assert_eq!(hits.hits.len(), 1);
//! assert_eq!(hits.hits[0].doc_id, 0);
//! assert_eq!(hits.hits[0].overlap, 2);
//! # Ok::<(), hashmatch::HashMatchError>(())
//! ```
//!
//! # Architecture
//!
//! - [`hashmatch_core`]: hash tokens, the query hash table and errors
//! - [`hashmatch_engine`]: segment readers, matching, scoring and config
//!
//! Results are per segment and unranked; merging across segments is left
//! to the caller.

pub use hashmatch_core::*;
pub use hashmatch_engine::*;
