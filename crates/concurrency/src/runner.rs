//! Strategy runner: one worker's update loop
//!
//! A [`StrategyRunner`] owns one [`CounterStore`] handle and performs
//! `updates` iterations of its [`Strategy`]. Each iteration ends in
//! `Committed`; the loop only advances on `Committed`.
//!
//! | Strategy | Steps per iteration | Race window |
//! |----------|---------------------|-------------|
//! | LostUpdate | read, +1 in memory, write | read → write, undetected |
//! | InPlaceUpdate | atomic increment | none |
//! | RowLevelLocking | locking read, +1, write + commit | none, serialized by lock |
//! | OptimisticConcurrencyControl | read (counter, version), CAS | detected, retried |
//!
//! Failure handling:
//! - `RowMissing` stops the loop for every strategy.
//! - `StoreUnavailable` stops the loop, except under OCC where the open
//!   transaction is rolled back and the iteration is redone.
//! - OCC version conflicts are redone without counting the iteration, for
//!   as long as the [`RetryPolicy`] allows.

use std::thread;
use std::time::Duration;

use counterlab_core::{CounterError, CounterResult, CounterRow, ProcessId, Strategy};
use counterlab_storage::CounterStore;
use tracing::{error, info, trace, warn};

use crate::retry::RetryPolicy;
use crate::state::RunnerState;

/// Tuning knobs for a runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunnerOptions {
    /// Pause between the read and the write of a read-modify-write step.
    /// Widens the race window of the lost-update strategy and the lock hold
    /// time of the row-lock strategy.
    pub think_time: Duration,
    /// OCC retry policy
    pub retry: RetryPolicy,
}

/// Counters accumulated over a runner's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunnerStats {
    /// Iterations that reached `Committed`
    pub commits: u64,
    /// Compare-and-swap attempts that lost the race
    pub conflicts: u64,
    /// Store errors absorbed by redoing an OCC iteration
    pub store_retries: u64,
}

/// Outcome of a single OCC attempt
enum CasAttempt {
    Applied(CounterRow),
    Conflict { expected_version: i64 },
}

/// Runs one strategy's update loop against one store handle
pub struct StrategyRunner<S> {
    process_id: ProcessId,
    strategy: Strategy,
    updates: usize,
    options: RunnerOptions,
    store: S,
    state: RunnerState,
    stats: RunnerStats,
}

impl<S: CounterStore> StrategyRunner<S> {
    /// Create a runner with default options
    pub fn new(process_id: ProcessId, strategy: Strategy, updates: usize, store: S) -> Self {
        StrategyRunner {
            process_id,
            strategy,
            updates,
            options: RunnerOptions::default(),
            store,
            state: RunnerState::Idle,
            stats: RunnerStats::default(),
        }
    }

    /// Replace the runner's options
    pub fn with_options(mut self, options: RunnerOptions) -> Self {
        self.options = options;
        self
    }

    /// Worker identifier
    pub fn process_id(&self) -> ProcessId {
        self.process_id
    }

    /// Strategy this runner executes
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Current state
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Counters so far
    pub fn stats(&self) -> RunnerStats {
        self.stats
    }

    /// Give the store handle back, e.g. to close it explicitly
    pub fn into_store(self) -> S {
        self.store
    }

    /// Run every iteration
    ///
    /// Stops at the first error that the strategy does not absorb. Any
    /// transaction left open by the failed step is rolled back before
    /// returning, so a held row lock never outlives the loop.
    ///
    /// # Errors
    /// The error that stopped the loop. `stats().commits` tells how far it
    /// got.
    pub fn run(&mut self) -> CounterResult<()> {
        for update in 1..=self.updates {
            if let Err(e) = self.run_iteration(update) {
                self.transition(RunnerState::Failed);
                error!(
                    process_id = %self.process_id,
                    update,
                    error = %e,
                    "Error in process {}: {}",
                    self.process_id,
                    e
                );
                if let Err(rollback_err) = self.store.rollback() {
                    warn!(process_id = %self.process_id, error = %rollback_err, "Rollback failed");
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Perform iteration `update` (1-based) until it commits
    ///
    /// Returns the committed counter value.
    pub fn run_iteration(&mut self, update: usize) -> CounterResult<i64> {
        if self.state == RunnerState::Committed {
            self.transition(RunnerState::Idle);
        }
        let counter = match self.strategy {
            Strategy::LostUpdate => self.lost_update_step(update)?,
            Strategy::InPlaceUpdate => self.in_place_step(update)?,
            Strategy::RowLevelLocking => self.row_lock_step(update)?,
            Strategy::OptimisticConcurrencyControl => self.occ_step(update)?,
        };
        self.stats.commits += 1;
        Ok(counter)
    }

    /// Plain read, increment in memory, unconditional write.
    ///
    /// Two workers that read the same value both write `value + 1`, and one
    /// increment disappears. Nothing here detects it.
    fn lost_update_step(&mut self, update: usize) -> CounterResult<i64> {
        self.transition(RunnerState::Reading);
        let counter = self.store.read_counter()?;

        self.transition(RunnerState::Writing);
        self.think();
        let next = counter + 1;
        self.store.write_counter(next)?;

        self.transition(RunnerState::Committed);
        self.log_commit(update, next);
        Ok(next)
    }

    fn in_place_step(&mut self, update: usize) -> CounterResult<i64> {
        self.transition(RunnerState::Writing);
        let counter = self.store.atomic_increment()?;

        self.transition(RunnerState::Committed);
        self.log_commit(update, counter);
        Ok(counter)
    }

    /// Locking read, increment, write. The write commits and releases the
    /// lock; until then every other locking reader waits.
    fn row_lock_step(&mut self, update: usize) -> CounterResult<i64> {
        self.transition(RunnerState::Reading);
        let counter = self.store.read_counter_for_update()?;

        self.transition(RunnerState::Writing);
        self.think();
        let next = counter + 1;
        self.store.write_counter(next)?;

        self.transition(RunnerState::Committed);
        self.log_commit(update, next);
        Ok(next)
    }

    /// Versioned read then compare-and-swap, redone until it applies
    fn occ_step(&mut self, update: usize) -> CounterResult<i64> {
        let mut attempts: u32 = 0;
        loop {
            if self.state == RunnerState::Retrying {
                self.transition(RunnerState::Reading);
            }
            attempts = attempts.saturating_add(1);

            let last_error = match self.try_occ_once() {
                Ok(CasAttempt::Applied(row)) => {
                    self.transition(RunnerState::Committed);
                    info!(
                        process_id = %self.process_id,
                        update,
                        counter = row.counter,
                        version = row.version,
                        "Process {}: Update {}: Counter = {}, Version = {}",
                        self.process_id,
                        update,
                        row.counter,
                        row.version
                    );
                    return Ok(row.counter);
                }
                Ok(CasAttempt::Conflict { expected_version }) => {
                    self.stats.conflicts += 1;
                    warn!(
                        process_id = %self.process_id,
                        update,
                        expected_version,
                        "Process {}: Version conflict detected. Retrying...",
                        self.process_id
                    );
                    CounterError::VersionConflict {
                        expected_version,
                        attempts,
                    }
                }
                Err(e) if e.is_fatal_for_worker() => return Err(e),
                Err(e) if e.is_retryable() => {
                    self.stats.store_retries += 1;
                    error!(
                        process_id = %self.process_id,
                        update,
                        error = %e,
                        "Process {}: Error during update: {}",
                        self.process_id,
                        e
                    );
                    self.store.rollback()?;
                    e
                }
                Err(e) => return Err(e),
            };

            self.transition(RunnerState::Retrying);
            if !self.options.retry.allows_another(attempts) {
                return Err(last_error);
            }
            let delay = self.options.retry.backoff(attempts);
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }
    }

    fn try_occ_once(&mut self) -> CounterResult<CasAttempt> {
        if self.state == RunnerState::Idle {
            self.transition(RunnerState::Reading);
        }
        let row = self.store.read_row()?;

        self.transition(RunnerState::Writing);
        self.think();
        let next = row.next();
        if self
            .store
            .compare_and_swap(row.version, next.counter, next.version)?
        {
            Ok(CasAttempt::Applied(next))
        } else {
            Ok(CasAttempt::Conflict {
                expected_version: row.version,
            })
        }
    }

    fn think(&self) {
        if !self.options.think_time.is_zero() {
            thread::sleep(self.options.think_time);
        }
    }

    fn log_commit(&self, update: usize, counter: i64) {
        info!(
            process_id = %self.process_id,
            update,
            counter,
            "Process {}: Update {}: Counter = {}",
            self.process_id,
            update,
            counter
        );
    }

    fn transition(&mut self, next: RunnerState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal runner transition {} -> {}",
            self.state,
            next
        );
        trace!(process_id = %self.process_id, from = %self.state, to = %next, "Runner transition");
        self.state = next;
    }
}
