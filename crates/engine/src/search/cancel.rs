//! Cooperative cancellation
//!
//! Long-running steps poll a shared flag: the match counter between hash
//! entries and the candidate iterator every few scanned documents.

use hashmatch_core::{HashMatchError, HashMatchResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag
///
/// Clones observe the same flag, so one token can be handed to every
/// segment of a query.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Return `Err(Cancelled)` once cancellation was requested
    #[inline]
    pub fn check(&self) -> HashMatchResult<()> {
        if self.is_cancelled() {
            Err(HashMatchError::Cancelled)
        } else {
            Ok(())
        }
    }
}
