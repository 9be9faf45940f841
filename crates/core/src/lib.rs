//! Core types for hashmatch
//!
//! This crate defines the foundational types shared by the matching engine:
//! - DocId: Segment-relative document identifier
//! - HashToken: Opaque bytes naming one LSH bucket
//! - HashAndFreq: A query hash paired with its expected repetition count
//! - HashFrequencyTable: Sorted per-query table of hashes
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{HashMatchError, HashMatchResult};
pub use types::{DocId, HashAndFreq, HashFrequencyTable, HashToken};
