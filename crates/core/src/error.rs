//! Error types for hashmatch
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Only genuine read failures and cancellation are errors. An absent hash
//! token, an empty segment or a non-positive candidate limit all produce a
//! valid (possibly empty) result instead.

use crate::types::DocId;
use std::io;
use thiserror::Error;

/// Result type alias for hashmatch operations
pub type HashMatchResult<T> = std::result::Result<T, HashMatchError>;

/// Error types for hashmatch
#[derive(Debug, Error)]
pub enum HashMatchError {
    /// I/O error (opening, mapping or writing a segment file)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Segment data could not be decoded
    #[error("Corrupt segment {segment_id}: {reason}")]
    Corruption {
        /// Segment the bad data was read from
        segment_id: u64,
        /// What was wrong with it
        reason: String,
    },

    /// A posting list referenced a document outside the segment
    #[error("Document {doc_id} out of range for segment with {doc_count} documents")]
    DocIdOutOfRange {
        /// Offending document id
        doc_id: DocId,
        /// Number of documents in the segment
        doc_count: u32,
    },

    /// The caller cancelled the query
    #[error("Query cancelled")]
    Cancelled,

    /// Invalid configuration or argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl HashMatchError {
    /// Build a `Corruption` error for a segment
    pub fn corruption(segment_id: u64, reason: impl Into<String>) -> Self {
        HashMatchError::Corruption {
            segment_id,
            reason: reason.into(),
        }
    }

    /// Build an `InvalidInput` error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        HashMatchError::InvalidInput(msg.into())
    }

    /// True when the error came from reading index data.
    ///
    /// These abort the segment's query and are never retried here.
    pub fn is_fatal_read(&self) -> bool {
        matches!(
            self,
            HashMatchError::Io(_)
                | HashMatchError::Corruption { .. }
                | HashMatchError::DocIdOutOfRange { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_io() {
        let err = HashMatchError::Io(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        let msg = err.to_string();
        assert!(msg.contains("I/O error"));
    }

    #[test]
    fn test_error_display_corruption() {
        let err = HashMatchError::corruption(7, "truncated varint");
        let msg = err.to_string();
        assert!(msg.contains("Corrupt segment 7"));
        assert!(msg.contains("truncated varint"));
    }

    #[test]
    fn test_error_display_doc_out_of_range() {
        let err = HashMatchError::DocIdOutOfRange {
            doc_id: 12,
            doc_count: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("12"));
        assert!(msg.contains("4 documents"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: HashMatchError = io_err.into();
        assert!(matches!(err, HashMatchError::Io(_)));
    }

    #[test]
    fn test_fatal_read_classification() {
        assert!(HashMatchError::corruption(0, "bad magic").is_fatal_read());
        assert!(HashMatchError::DocIdOutOfRange {
            doc_id: 1,
            doc_count: 1
        }
        .is_fatal_read());
        assert!(!HashMatchError::Cancelled.is_fatal_read());
        assert!(!HashMatchError::invalid_input("candidates").is_fatal_read());
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> HashMatchResult<i32> {
            Ok(42)
        }

        fn returns_error() -> HashMatchResult<i32> {
            Err(HashMatchError::Cancelled)
        }

        assert_eq!(returns_result().unwrap(), 42);
        assert!(returns_error().is_err());
    }
}
