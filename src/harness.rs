//! Main entry point for Counterlab.
//!
//! This module provides the `Harness` struct, which ties the bootstrapper,
//! the worker pool and the post-run inspection together.

use crate::error::{Error, Result};
use counterlab_core::{CounterRow, HarnessConfig, PoolReport, RetryConfig, Strategy};
use counterlab_engine::WorkerPool;
use counterlab_storage::{Bootstrapper, CounterStore, SqliteCounterStore};
use std::path::Path;
use std::time::Duration;

/// The concurrency-control harness.
///
/// # Example
///
/// ```ignore
/// use counterlab::prelude::*;
///
/// let harness = Harness::builder()
///     .path("./counter.db")
///     .processes(10)
///     .updates(1000)
///     .build()?;
///
/// harness.create_schema()?;
/// let report = harness.run(Strategy::OptimisticConcurrencyControl)?;
/// assert!(report.is_consistent());
/// ```
pub struct Harness {
    config: HarnessConfig,
    bootstrapper: Bootstrapper,
    pool: WorkerPool,
}

impl Harness {
    /// Create a harness from a configuration.
    ///
    /// # Errors
    ///
    /// `Config` if the configuration fails validation.
    pub fn new(config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        Ok(Harness {
            bootstrapper: Bootstrapper::new(config.database.clone()),
            pool: WorkerPool::from_config(&config),
            config,
        })
    }

    /// Create a harness from defaults overridden by environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(HarnessConfig::from_env()?)
    }

    /// Create a builder for harness configuration.
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::new()
    }

    /// The configuration this harness runs with.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Create the `user_counter` table if it does not exist.
    pub fn create_schema(&self) -> Result<()> {
        self.bootstrapper.create_schema().map_err(Error::from)
    }

    /// Reset the shared row to `counter = 0, version = 1`.
    pub fn bootstrap(&self) -> Result<CounterRow> {
        self.bootstrapper.ensure_row_exists().map_err(Error::from)
    }

    /// Bootstrap, run every worker with `strategy`, then read the row back.
    ///
    /// # Errors
    ///
    /// Only a bootstrap failure is an error. Worker failures are reported
    /// in the returned [`PoolReport`].
    pub fn run(&self, strategy: Strategy) -> Result<PoolReport> {
        self.bootstrap()?;
        Ok(self.pool.run_sqlite(strategy, &self.config.database))
    }

    /// Run all four strategies one after the other, bootstrapping before each.
    pub fn compare(&self) -> Result<Vec<PoolReport>> {
        Strategy::ALL.iter().map(|s| self.run(*s)).collect()
    }

    /// Read the shared row on a fresh connection.
    pub fn inspect(&self) -> Result<CounterRow> {
        let mut store = SqliteCounterStore::connect(&self.config.database)?;
        store.read_row().map_err(Error::from)
    }
}

/// Builder for harness configuration.
///
/// Starts from [`HarnessConfig::default`].
///
/// # Example
///
/// ```ignore
/// let harness = Harness::builder()
///     .path("./counter.db")
///     .processes(2)
///     .updates(1)
///     .think_time(Duration::from_millis(200))
///     .build()?;
/// ```
pub struct HarnessBuilder {
    config: HarnessConfig,
}

impl HarnessBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: HarnessConfig::default(),
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Set the database file path.
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.database.path = path.as_ref().to_path_buf();
        self
    }

    /// Set how long a connection waits on a held lock.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.config.database.busy_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the number of concurrent workers.
    pub fn processes(mut self, n: usize) -> Self {
        self.config.num_processes = n;
        self
    }

    /// Set the iterations per worker.
    pub fn updates(mut self, n: usize) -> Self {
        self.config.num_updates = n;
        self
    }

    /// Set the pause between the read and the write of each step.
    pub fn think_time(mut self, think_time: Duration) -> Self {
        self.config.think_time_ms = think_time.as_millis() as u64;
        self
    }

    /// Set the OCC retry policy.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Validate and build the harness.
    pub fn build(self) -> Result<Harness> {
        Harness::new(self.config)
    }
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}
