//! # Counterlab
//!
//! A harness that shows how four concurrency-control strategies behave when
//! many workers increment one shared database counter at the same time.
//!
//! ## Quick Start
//!
//! ```ignore
//! use counterlab::prelude::*;
//!
//! let harness = Harness::builder()
//!     .path("./counter.db")
//!     .processes(10)
//!     .updates(1000)
//!     .build()?;
//!
//! harness.create_schema()?;
//! for strategy in Strategy::ALL {
//!     let report = harness.run(strategy)?;
//!     println!("{}: {:?}", strategy, report.final_counter());
//! }
//! ```
//!
//! ## Strategies
//!
//! - [`Strategy::LostUpdate`] - plain read then write; loses increments
//! - [`Strategy::InPlaceUpdate`] - one atomic `counter = counter + 1`
//! - [`Strategy::RowLevelLocking`] - locking read held until the write commits
//! - [`Strategy::OptimisticConcurrencyControl`] - versioned compare-and-swap, retried on conflict
//!
//! Every worker opens its own connection. No in-process lock is shared, so
//! each guarantee observed comes from the database primitive the strategy
//! uses.

#![warn(missing_docs)]

mod error;
mod harness;

pub mod prelude;

// Re-export main entry points
pub use error::{Error, Result};
pub use harness::{Harness, HarnessBuilder};

// Re-export types
pub use counterlab_core::{
    CounterError, CounterResult, CounterRow, DatabaseConfig, HarnessConfig, PoolReport, ProcessId,
    RetryConfig, RunId, Strategy, WorkerResult, WorkerStatus, COUNTER_USER_ID, INITIAL_COUNTER,
    INITIAL_VERSION,
};

// Lower layers, for custom stores and pools
pub use counterlab_concurrency::{RetryPolicy, RunnerOptions, RunnerStats, StrategyRunner};
pub use counterlab_engine::WorkerPool;
pub use counterlab_storage::{Bootstrapper, CounterStore, SqliteCounterStore};
