//! Core types for the counter harness
//!
//! This crate defines the vocabulary shared by every other crate:
//! - Types: CounterRow, RunId, ProcessId, Strategy, WorkerResult, PoolReport
//! - Error types: CounterError
//! - Configuration: HarnessConfig, DatabaseConfig, RetryConfig

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod types;

pub use config::{DatabaseConfig, HarnessConfig, RetryConfig};
pub use error::{CounterError, CounterResult};
pub use types::{
    CounterRow, PoolReport, ProcessId, RunId, Strategy, WorkerResult, WorkerStatus,
    COUNTER_USER_ID, INITIAL_COUNTER, INITIAL_VERSION,
};
