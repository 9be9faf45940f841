//! Core types for hashmatch
//!
//! This module defines the foundational types:
//! - DocId: Segment-relative document identifier
//! - HashToken: Opaque byte string naming one LSH bucket
//! - HashAndFreq: Query hash + expected frequency
//! - HashFrequencyTable: The per-query hash table, sorted before matching

use serde::{Deserialize, Serialize};
use std::fmt;

/// Segment-relative document identifier
///
/// Ids are dense: a segment with `n` documents uses ids `0..n`.
pub type DocId = u32;

// ============================================================================
// HashToken
// ============================================================================

/// Opaque identifier of one LSH bucket
///
/// Equality is exact byte equality and ordering is unsigned lexicographic
/// byte order, the same order segment term dictionaries are sorted in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HashToken(Vec<u8>);

impl HashToken {
    /// Create a token from raw bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Encode an integer hash as a token.
    ///
    /// Big-endian, so numeric order and byte order agree.
    pub fn from_u32(hash: u32) -> Self {
        Self(hash.to_be_bytes().to_vec())
    }

    /// Raw bytes of the token
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the token in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the zero-length token
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for HashToken {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for HashToken {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl AsRef<[u8]> for HashToken {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for HashToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

// ============================================================================
// HashAndFreq
// ============================================================================

/// A query hash and the number of times it is expected to occur
///
/// A document earns at most `freq` credit for this hash, however often it
/// actually contains the token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HashAndFreq {
    /// Bucket token
    pub hash: HashToken,
    /// Expected repetitions within one document
    pub freq: u32,
}

impl HashAndFreq {
    /// Create a new hash/frequency pair
    pub fn new(hash: impl Into<HashToken>, freq: u32) -> Self {
        HashAndFreq {
            hash: hash.into(),
            freq,
        }
    }

    /// Hash with an expected frequency of one
    pub fn once(hash: impl Into<HashToken>) -> Self {
        Self::new(hash, 1)
    }
}

// ============================================================================
// HashFrequencyTable
// ============================================================================

/// Ordered table of query hashes
///
/// Matching walks segment term dictionaries in table order, so the table
/// must be sorted by token bytes before it is used. Duplicate tokens are kept
/// as separate entries and each one is matched on its own, so repeated hashes
/// add up.
///
/// `from_unsorted` is the normal entry point. `from_raw` keeps the caller's
/// order as-is and `sort` can then be called explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashFrequencyTable {
    entries: Vec<HashAndFreq>,
}

impl HashFrequencyTable {
    /// Build a table and sort it
    pub fn from_unsorted(entries: Vec<HashAndFreq>) -> Self {
        let mut table = Self::from_raw(entries);
        table.sort();
        table
    }

    /// Build a table in the given order without sorting
    pub fn from_raw(entries: Vec<HashAndFreq>) -> Self {
        HashFrequencyTable { entries }
    }

    /// Sort ascending by token bytes.
    ///
    /// Entries sharing a token are ordered by frequency so that tables with
    /// the same content compare equal regardless of input order.
    pub fn sort(&mut self) {
        self.entries.sort();
    }

    /// Whether entries are in ascending token order
    pub fn is_sorted(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].hash <= w[1].hash)
    }

    /// Entries in table order
    pub fn entries(&self) -> &[HashAndFreq] {
        &self.entries
    }

    /// Iterate entries in table order
    pub fn iter(&self) -> std::slice::Iter<'_, HashAndFreq> {
        self.entries.iter()
    }

    /// Number of entries (duplicates included)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table holds no hashes
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all expected frequencies.
    ///
    /// Upper bound of any document's overlap count against this table.
    pub fn total_frequency(&self) -> u64 {
        self.entries.iter().map(|e| e.freq as u64).sum()
    }
}

impl<'a> IntoIterator for &'a HashFrequencyTable {
    type Item = &'a HashAndFreq;
    type IntoIter = std::slice::Iter<'a, HashAndFreq>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
