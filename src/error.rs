//! Unified error types for Counterlab.
//!
//! This module provides a clean error type that wraps the internal
//! [`CounterError`] and presents a consistent interface to users.

use counterlab_core::CounterError;
use thiserror::Error;

/// All Counterlab errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The shared row does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Version conflict that outlived the retry budget
    #[error("conflict: {0}")]
    Conflict(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Store connection or query failure
    #[error("storage error: {0}")]
    Storage(String),

    /// The shared row could not be put into its initial state
    #[error("bootstrap error: {0}")]
    Bootstrap(String),
}

/// Result type for Counterlab operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is retryable.
    ///
    /// Conflicts and store hiccups may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_) | Error::Storage(_))
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if this is a conflict error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

impl From<CounterError> for Error {
    fn from(e: CounterError) -> Self {
        match e {
            CounterError::StoreUnavailable(msg) => Error::Storage(msg),
            CounterError::RowMissing { user_id } => {
                Error::NotFound(format!("counter row for user_id = {}", user_id))
            }
            err @ CounterError::VersionConflict { .. } => Error::Conflict(err.to_string()),
            CounterError::InvalidConfig(msg) => Error::Config(msg),
            CounterError::Bootstrap(msg) => Error::Bootstrap(msg),
        }
    }
}
