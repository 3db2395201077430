//! Strategy Test Suite
//!
//! Runs every strategy with real worker threads against a SQLite file in a
//! temporary directory, then checks the final row.
//!
//! ## Key Verification Points
//!
//! 1. In-place, row-lock and OCC always end at exactly `p * n`
//! 2. Lost-update loses increments under contention
//! 3. Row-lock holders never overlap
//! 4. OCC versions advance by exactly one per commit
//! 5. A failed worker never stops the pool from reporting
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all strategy tests
//! cargo test --test strategies
//!
//! # Run OCC tests only
//! cargo test --test strategies occ::
//! ```

use std::time::Duration;

use counterlab::{
    DatabaseConfig, Harness, HarnessConfig, PoolReport, RetryConfig, SqliteCounterStore, Strategy,
};
use tempfile::TempDir;

// Test modules
pub mod bootstrap;
pub mod failure;
pub mod in_place;
pub mod lost_update;
pub mod occ;
pub mod recording;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// A counter database in its own temporary directory
pub struct TestDb {
    _dir: TempDir,
    config: HarnessConfig,
}

impl TestDb {
    /// Fresh database file with the table created, `p` workers of `n` updates
    pub fn new(processes: usize, updates: usize) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = HarnessConfig {
            num_processes: processes,
            num_updates: updates,
            database: DatabaseConfig::at(dir.path().join("counter.db")),
            ..HarnessConfig::default()
        };
        let db = TestDb { _dir: dir, config };
        db.harness()
            .create_schema()
            .expect("Failed to create schema");
        db
    }

    /// Set the pause between read and write
    pub fn with_think_time(mut self, think_time: Duration) -> Self {
        self.config.think_time_ms = think_time.as_millis() as u64;
        self
    }

    /// Set the OCC retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn database(&self) -> &DatabaseConfig {
        &self.config.database
    }

    pub fn harness(&self) -> Harness {
        Harness::new(self.config.clone()).expect("Invalid test config")
    }

    /// Bootstrap and run one strategy
    pub fn run(&self, strategy: Strategy) -> PoolReport {
        self.harness().run(strategy).expect("Bootstrap failed")
    }

    /// A worker-style connection
    pub fn connect(&self) -> SqliteCounterStore {
        SqliteCounterStore::connect(self.database()).expect("Failed to connect")
    }

    /// A raw connection for tampering with the table
    pub fn raw(&self) -> rusqlite::Connection {
        rusqlite::Connection::open(&self.database().path).expect("Failed to open raw connection")
    }
}

/// Assert a run ended at exactly `p * n` with every worker completed
pub fn assert_exact(report: &PoolReport) {
    assert!(
        report.failed_workers().is_empty(),
        "{}: workers failed: {:?}",
        report.strategy,
        report.failed_workers()
    );
    assert_eq!(
        report.final_counter(),
        Some(report.expected_total()),
        "{}: final counter",
        report.strategy
    );
    assert_eq!(report.total_commits() as i64, report.expected_total());
    assert!(report.is_consistent());
}
