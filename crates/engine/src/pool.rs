//! Worker pool: N independent workers against the shared row
//!
//! Each worker runs on its own OS thread with its own store connection,
//! opened inside the thread and dropped before the thread exits. Workers
//! share nothing in-process; the only shared mutable state is the row in
//! the database, so every race or guarantee observed comes from the
//! strategy's store primitives.
//!
//! ## Failure semantics
//!
//! - A worker that fails to connect, or whose loop stops on an error, logs
//!   it, releases its connection and reports `Errored`.
//! - A panicking worker is reported as `Errored` too.
//! - Failed workers are neither retried nor respawned; they just contribute
//!   fewer commits. The pool always finishes and always reports.

use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use counterlab_concurrency::{RetryPolicy, RunnerOptions, RunnerStats, StrategyRunner};
use counterlab_core::{
    CounterResult, CounterRow, DatabaseConfig, HarnessConfig, PoolReport, ProcessId, RunId,
    Strategy, WorkerResult, WorkerStatus,
};
use counterlab_storage::{CounterStore, SqliteCounterStore};
use tracing::{error, info, info_span, warn, Span};

/// Spawns workers, joins them and times the whole run
#[derive(Debug, Clone)]
pub struct WorkerPool {
    num_processes: usize,
    num_updates: usize,
    options: RunnerOptions,
}

impl WorkerPool {
    /// Create a pool of `num_processes` workers, `num_updates` iterations each
    pub fn new(num_processes: usize, num_updates: usize) -> Self {
        WorkerPool {
            num_processes,
            num_updates,
            options: RunnerOptions::default(),
        }
    }

    /// Create a pool from harness configuration
    pub fn from_config(config: &HarnessConfig) -> Self {
        WorkerPool::new(config.num_processes, config.num_updates).with_runner_options(
            RunnerOptions {
                think_time: config.think_time(),
                retry: RetryPolicy::from_config(&config.retry),
            },
        )
    }

    /// Options handed to every worker's runner
    pub fn with_runner_options(mut self, options: RunnerOptions) -> Self {
        self.options = options;
        self
    }

    /// Number of workers
    pub fn num_processes(&self) -> usize {
        self.num_processes
    }

    /// Iterations per worker
    pub fn num_updates(&self) -> usize {
        self.num_updates
    }

    /// Run every worker to completion
    ///
    /// `connect` is called once per worker, on that worker's thread, to
    /// open its private store handle. The returned report has no
    /// `final_row`; reading the row back is a separate inspection step.
    pub fn run<S, F>(&self, strategy: Strategy, connect: F) -> PoolReport
    where
        S: CounterStore,
        F: Fn(ProcessId) -> CounterResult<S> + Sync,
    {
        let run_id = RunId::new();
        let pool_span = info_span!("pool_run", %run_id, %strategy);
        let _entered = pool_span.enter();

        info!(
            num_processes = self.num_processes,
            num_updates = self.num_updates,
            "Starting {} simulation",
            strategy.title()
        );

        let start = Instant::now();
        let workers = thread::scope(|scope| {
            let handles: Vec<_> = (0..self.num_processes)
                .map(|i| {
                    let process_id = ProcessId(i);
                    let connect = &connect;
                    let pool_span = &pool_span;
                    let spawned = thread::Builder::new()
                        .name(format!("worker-{}", i))
                        .spawn_scoped(scope, move || {
                            self.run_worker(process_id, strategy, connect, pool_span)
                        });
                    (process_id, spawned)
                })
                .collect();

            handles
                .into_iter()
                .map(|(process_id, spawned)| match spawned {
                    Ok(handle) => handle.join().unwrap_or_else(|_| {
                        error!(%process_id, "Worker thread panicked");
                        errored(process_id, "worker panicked".to_string())
                    }),
                    Err(e) => {
                        error!(%process_id, error = %e, "Could not spawn worker");
                        errored(process_id, format!("spawn failed: {}", e))
                    }
                })
                .collect::<Vec<_>>()
        });
        let elapsed = start.elapsed();

        let failed = workers.iter().filter(|w| !w.status.is_completed()).count();
        if failed > 0 {
            warn!(failed, "{} of {} workers stopped early", failed, self.num_processes);
        }
        info!(
            elapsed_secs = elapsed.as_secs_f64(),
            "{} simulation completed in {:.2} seconds.",
            strategy.title(),
            elapsed.as_secs_f64()
        );

        PoolReport {
            run_id,
            strategy,
            num_processes: self.num_processes,
            num_updates: self.num_updates,
            final_row: None,
            workers,
            elapsed,
        }
    }

    /// Run against a SQLite database and read the final row back
    ///
    /// Every worker opens its own connection with `config`. Inspection
    /// failures are logged and leave `final_row` empty.
    pub fn run_sqlite(&self, strategy: Strategy, config: &DatabaseConfig) -> PoolReport {
        let mut report = self.run(strategy, |_| SqliteCounterStore::connect(config));
        report.final_row = inspect_row(|| SqliteCounterStore::connect(config));
        report
    }

    fn run_worker<S, F>(
        &self,
        process_id: ProcessId,
        strategy: Strategy,
        connect: &F,
        pool_span: &Span,
    ) -> WorkerResult
    where
        S: CounterStore,
        F: Fn(ProcessId) -> CounterResult<S>,
    {
        let span = info_span!(parent: pool_span, "worker", %process_id);
        let _entered = span.enter();

        let started_at = Utc::now();
        let start = Instant::now();

        let (status, stats) = match connect(process_id) {
            Ok(store) => {
                let mut runner = StrategyRunner::new(process_id, strategy, self.num_updates, store)
                    .with_options(self.options);
                let status = match runner.run() {
                    Ok(()) => WorkerStatus::Completed,
                    Err(e) => WorkerStatus::Errored {
                        reason: e.to_string(),
                    },
                };
                let stats = runner.stats();
                // Dropping the runner closes this worker's connection
                drop(runner);
                (status, stats)
            }
            Err(e) => {
                error!("Error in process {}: {}", process_id, e);
                (
                    WorkerStatus::Errored {
                        reason: e.to_string(),
                    },
                    RunnerStats::default(),
                )
            }
        };

        let elapsed = start.elapsed();
        info!(
            commits = stats.commits,
            conflicts = stats.conflicts,
            elapsed_secs = elapsed.as_secs_f64(),
            "Process {} completed in {:.2} seconds.",
            process_id,
            elapsed.as_secs_f64()
        );

        WorkerResult {
            process_id,
            status,
            elapsed,
            commits: stats.commits,
            conflicts: stats.conflicts,
            store_retries: stats.store_retries,
            started_at,
        }
    }
}

/// Read the shared row on a fresh connection, logging instead of failing
pub fn inspect_row<S, F>(connect: F) -> Option<CounterRow>
where
    S: CounterStore,
    F: FnOnce() -> CounterResult<S>,
{
    match connect().and_then(|mut store| store.read_row()) {
        Ok(row) => {
            info!(
                counter = row.counter,
                version = row.version,
                "Final counter = {}, version = {}",
                row.counter,
                row.version
            );
            Some(row)
        }
        Err(e) => {
            error!(error = %e, "Could not inspect final counter row");
            None
        }
    }
}

fn errored(process_id: ProcessId, reason: String) -> WorkerResult {
    WorkerResult {
        process_id,
        status: WorkerStatus::Errored { reason },
        elapsed: Duration::ZERO,
        commits: 0,
        conflicts: 0,
        store_retries: 0,
        started_at: Utc::now(),
    }
}
