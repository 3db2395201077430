//! Concurrency-control strategies for the shared counter
//!
//! This crate implements the four update protocols a worker can run:
//! - Lost update: plain read-modify-write, the negative example
//! - In-place update: one atomic server-side increment
//! - Row-level locking: locking read held until the write commits
//! - Optimistic concurrency control: versioned read + compare-and-swap
//!
//! None of them use an in-process lock. All mutual exclusion comes from
//! the store primitive each protocol picks.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod retry;
pub mod runner;
pub mod state;

pub use retry::RetryPolicy;
pub use runner::{RunnerOptions, RunnerStats, StrategyRunner};
pub use state::RunnerState;
