//! Error types shared by every harness crate
//!
//! The taxonomy mirrors how workers react to a failure:
//! - `StoreUnavailable`: connection or query failed. Fatal for the
//!   lost-update, in-place and row-lock loops; retried in place by OCC.
//! - `RowMissing`: the shared row is gone. Fatal for the worker's loop.
//! - `VersionConflict`: a bounded OCC retry budget ran out. A single
//!   failed compare-and-swap is not an error, it is a `false` return.

use thiserror::Error;

/// Result type alias for harness operations
pub type CounterResult<T> = std::result::Result<T, CounterError>;

/// Errors raised by the store, the runners, the pool and configuration
#[derive(Debug, Error)]
pub enum CounterError {
    /// Connection could not be established or a query errored
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The shared row does not exist
    #[error("no row found for user_id = {user_id}")]
    RowMissing {
        /// Key that was looked up
        user_id: i64,
    },

    /// Compare-and-swap kept losing until the retry budget was spent
    #[error("version conflict on version {expected_version} after {attempts} attempts")]
    VersionConflict {
        /// Version observed by the last failed attempt
        expected_version: i64,
        /// Attempts made for the iteration
        attempts: u32,
    },

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The shared row could not be put into its initial state
    #[error("bootstrap failed: {0}")]
    Bootstrap(String),
}

impl CounterError {
    /// Create a StoreUnavailable error from anything printable
    pub fn unavailable(e: impl std::fmt::Display) -> Self {
        CounterError::StoreUnavailable(e.to_string())
    }

    /// Check if retrying the same iteration can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CounterError::StoreUnavailable(_) | CounterError::VersionConflict { .. }
        )
    }

    /// Check if this error must stop a worker's loop regardless of strategy
    pub fn is_fatal_for_worker(&self) -> bool {
        matches!(
            self,
            CounterError::RowMissing { .. } | CounterError::InvalidConfig(_)
        )
    }

    /// Check if this is a missing-row error
    pub fn is_row_missing(&self) -> bool {
        matches!(self, CounterError::RowMissing { .. })
    }
}
