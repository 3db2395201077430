//! Orchestration for the counter harness
//!
//! This crate runs a strategy across a pool of workers:
//! - WorkerPool: spawn, join and time N independent workers
//! - inspect_row: the post-run read of the shared row

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod pool;

pub use pool::{inspect_row, WorkerPool};
