//! Core types for the counter harness
//!
//! This module defines the fundamental types used throughout the system:
//! - [`RunId`]: Unique identifier for one pool run
//! - [`ProcessId`]: Identifier of a worker within a run
//! - [`CounterRow`]: The single shared row every worker contends on
//! - [`Strategy`]: The four concurrency-control strategies
//! - [`WorkerResult`] / [`PoolReport`]: Per-worker and per-run outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::error::CounterError;

/// Key of the shared row. The harness only ever touches this one row.
pub const COUNTER_USER_ID: i64 = 1;

/// Counter value the bootstrapper resets the row to.
pub const INITIAL_COUNTER: i64 = 0;

/// Version the bootstrapper resets the row to.
pub const INITIAL_VERSION: i64 = 1;

/// Unique identifier for a pool run
///
/// Every call to the worker pool gets a fresh RunId. It tags the
/// `pool_run` tracing span and the final report so that log lines from
/// back-to-back runs against the same database can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random RunId using UUID v4
    ///
    /// # Examples
    ///
    /// ```
    /// use counterlab_core::RunId;
    ///
    /// let id1 = RunId::new();
    /// let id2 = RunId::new();
    /// assert_ne!(id1, id2);
    /// ```
    pub fn new() -> Self {
        RunId(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a worker within a pool run (0-based, dense)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub usize);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The single shared row
///
/// Owned by the external store. The harness holds a copy only for the span
/// of one read-modify-write step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRow {
    /// Fixed key, always [`COUNTER_USER_ID`]
    pub user_id: i64,
    /// The contended value
    pub counter: i64,
    /// Monotonic version, advanced only by compare-and-swap
    pub version: i64,
}

impl CounterRow {
    /// The state the bootstrapper establishes before every run
    pub fn initial() -> Self {
        CounterRow {
            user_id: COUNTER_USER_ID,
            counter: INITIAL_COUNTER,
            version: INITIAL_VERSION,
        }
    }

    /// The row an OCC step tries to install on top of this one
    pub fn next(&self) -> Self {
        CounterRow {
            user_id: self.user_id,
            counter: self.counter + 1,
            version: self.version + 1,
        }
    }
}

/// Concurrency-control strategy a worker runs
///
/// The numeric aliases (`1`..`4`) follow the numbering of the four
/// demonstrations: lost update, in-place update, row-level locking,
/// optimistic concurrency control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Plain read, increment in memory, unconditional write. Loses updates.
    LostUpdate,
    /// Server-side `counter = counter + 1`
    InPlaceUpdate,
    /// Locking read held until the write commits
    RowLevelLocking,
    /// Versioned read followed by compare-and-swap, retried on conflict
    OptimisticConcurrencyControl,
}

impl Strategy {
    /// All strategies in demonstration order
    pub const ALL: [Strategy; 4] = [
        Strategy::LostUpdate,
        Strategy::InPlaceUpdate,
        Strategy::RowLevelLocking,
        Strategy::OptimisticConcurrencyControl,
    ];

    /// Short name accepted on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::LostUpdate => "lost-update",
            Strategy::InPlaceUpdate => "in-place",
            Strategy::RowLevelLocking => "row-lock",
            Strategy::OptimisticConcurrencyControl => "occ",
        }
    }

    /// Human title used in the pool summary line
    pub fn title(&self) -> &'static str {
        match self {
            Strategy::LostUpdate => "Lost-update",
            Strategy::InPlaceUpdate => "In-place update",
            Strategy::RowLevelLocking => "Row-level locking",
            Strategy::OptimisticConcurrencyControl => "Optimistic concurrency control",
        }
    }

    /// Whether the final counter must equal `processes * updates`
    pub fn is_lost_update_free(&self) -> bool {
        !matches!(self, Strategy::LostUpdate)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = CounterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "1" | "lost-update" => Ok(Strategy::LostUpdate),
            "2" | "in-place" | "in-place-update" => Ok(Strategy::InPlaceUpdate),
            "3" | "row-lock" | "row-level-locking" => Ok(Strategy::RowLevelLocking),
            "4" | "occ" | "optimistic" | "optimistic-concurrency-control" => {
                Ok(Strategy::OptimisticConcurrencyControl)
            }
            other => Err(CounterError::InvalidConfig(format!(
                "unknown strategy '{}' (expected lost-update, in-place, row-lock or occ)",
                other
            ))),
        }
    }
}

/// Terminal status of one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerStatus {
    /// Ran all of its iterations
    Completed,
    /// Stopped early; fewer than `num_updates` commits
    Errored {
        /// Human-readable failure
        reason: String,
    },
}

impl WorkerStatus {
    /// Check if the worker ran to completion
    pub fn is_completed(&self) -> bool {
        matches!(self, WorkerStatus::Completed)
    }

    /// Failure reason, if any
    pub fn error(&self) -> Option<&str> {
        match self {
            WorkerStatus::Completed => None,
            WorkerStatus::Errored { reason } => Some(reason),
        }
    }
}

/// Outcome of one worker. Logged and reported, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    /// Worker identifier
    pub process_id: ProcessId,
    /// How the worker ended
    pub status: WorkerStatus,
    /// Wall-clock time from connect to release
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    /// Iterations that reached Committed
    pub commits: u64,
    /// Compare-and-swap attempts that lost the race (OCC only)
    pub conflicts: u64,
    /// Store errors absorbed by retrying the iteration (OCC only)
    pub store_retries: u64,
    /// When the worker started
    pub started_at: DateTime<Utc>,
}

/// Aggregate outcome of one pool run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolReport {
    /// Run identifier
    pub run_id: RunId,
    /// Strategy every worker ran
    pub strategy: Strategy,
    /// Number of workers spawned
    pub num_processes: usize,
    /// Iterations per worker
    pub num_updates: usize,
    /// Row read back after all workers joined; `None` if inspection failed
    pub final_row: Option<CounterRow>,
    /// Per-worker outcomes, ordered by process id
    pub workers: Vec<WorkerResult>,
    /// Wall-clock time from first spawn to last join
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl PoolReport {
    /// `num_processes * num_updates`
    pub fn expected_total(&self) -> i64 {
        (self.num_processes as i64).saturating_mul(self.num_updates as i64)
    }

    /// Sum of committed iterations across workers
    pub fn total_commits(&self) -> u64 {
        self.workers.iter().map(|w| w.commits).sum()
    }

    /// Sum of version conflicts across workers
    pub fn total_conflicts(&self) -> u64 {
        self.workers.iter().map(|w| w.conflicts).sum()
    }

    /// Workers that stopped early
    pub fn failed_workers(&self) -> Vec<&WorkerResult> {
        self.workers
            .iter()
            .filter(|w| !w.status.is_completed())
            .collect()
    }

    /// Final counter value, if inspection succeeded
    pub fn final_counter(&self) -> Option<i64> {
        self.final_row.map(|row| row.counter)
    }

    /// Increments that vanished: commits that were reported but are not
    /// reflected in the final counter.
    pub fn lost_updates(&self) -> Option<i64> {
        self.final_counter()
            .map(|counter| (self.total_commits() as i64 - counter).max(0))
    }

    /// True when the final counter equals the expected total
    pub fn is_consistent(&self) -> bool {
        self.final_counter() == Some(self.expected_total())
    }
}

/// Serialize a `Duration` as fractional seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom("duration must be a non-negative number"));
        }
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
