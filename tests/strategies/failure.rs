//! Worker failure containment

use crate::*;
use counterlab::{
    CounterError, CounterResult, CounterRow, CounterStore, ProcessId, RetryPolicy, RunnerOptions,
    WorkerPool,
};

fn delete_row(db: &TestDb) {
    db.raw()
        .execute("DELETE FROM user_counter", [])
        .expect("Failed to delete row");
}

#[test]
fn test_missing_row_fails_every_worker_but_pool_reports() {
    for strategy in Strategy::ALL {
        let db = TestDb::new(3, 5);
        db.harness().bootstrap().unwrap();
        delete_row(&db);

        let report = WorkerPool::new(3, 5).run_sqlite(strategy, db.database());
        assert_eq!(report.workers.len(), 3, "{}", strategy);
        assert_eq!(report.failed_workers().len(), 3, "{}", strategy);
        assert_eq!(report.total_commits(), 0);
        for worker in &report.workers {
            assert!(worker.status.error().unwrap().contains("no row found"));
        }
        // Inspection fails too and is reported as absent
        assert!(report.final_row.is_none());
    }
}

#[test]
fn test_unreachable_store_is_contained() {
    let db = TestDb::new(2, 5);
    db.harness().bootstrap().unwrap();

    let report = WorkerPool::new(3, 5).run(Strategy::RowLevelLocking, |pid: ProcessId| {
        if pid == ProcessId(1) {
            SqliteCounterStore::open(
                db.database().path.join("not-a-dir").join("x.db"),
                Duration::from_millis(10),
            )
        } else {
            SqliteCounterStore::connect(db.database())
        }
    });

    assert_eq!(report.failed_workers().len(), 1);
    assert_eq!(report.failed_workers()[0].process_id, ProcessId(1));
    assert_eq!(report.total_commits(), 10);
    assert_eq!(db.harness().inspect().unwrap().counter, 10);
}

/// Passes through to the real store until `writes_left` writes have
/// succeeded, then fails every write with `StoreUnavailable`
struct FailingWrites<S> {
    inner: S,
    writes_left: usize,
}

impl<S: CounterStore> FailingWrites<S> {
    fn new(inner: S, writes_left: usize) -> Self {
        FailingWrites { inner, writes_left }
    }

    fn spend_write(&mut self) -> CounterResult<()> {
        if self.writes_left == 0 {
            return Err(CounterError::unavailable("connection reset by peer"));
        }
        self.writes_left -= 1;
        Ok(())
    }
}

impl<S: CounterStore> CounterStore for FailingWrites<S> {
    fn read_counter(&mut self) -> CounterResult<i64> {
        self.inner.read_counter()
    }

    fn read_row(&mut self) -> CounterResult<CounterRow> {
        self.inner.read_row()
    }

    fn read_counter_for_update(&mut self) -> CounterResult<i64> {
        self.inner.read_counter_for_update()
    }

    fn write_counter(&mut self, value: i64) -> CounterResult<()> {
        self.spend_write()?;
        self.inner.write_counter(value)
    }

    fn atomic_increment(&mut self) -> CounterResult<i64> {
        self.spend_write()?;
        self.inner.atomic_increment()
    }

    fn compare_and_swap(
        &mut self,
        expected_version: i64,
        new_counter: i64,
        new_version: i64,
    ) -> CounterResult<bool> {
        self.spend_write()?;
        self.inner
            .compare_and_swap(expected_version, new_counter, new_version)
    }

    fn rollback(&mut self) -> CounterResult<()> {
        self.inner.rollback()
    }
}

#[test]
fn test_row_lock_failure_after_locking_read_releases_lock() {
    let db = TestDb::new(3, 20);
    db.harness().bootstrap().unwrap();

    // Worker 0 takes the lock, then its first write fails
    let report = WorkerPool::new(3, 20).run(Strategy::RowLevelLocking, |pid: ProcessId| {
        let store = SqliteCounterStore::open(&db.database().path, Duration::from_secs(5))?;
        let writes = if pid == ProcessId(0) { 0 } else { usize::MAX };
        Ok(FailingWrites::new(store, writes))
    });

    let failed = report.failed_workers();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].process_id, ProcessId(0));
    assert!(failed[0].status.error().unwrap().contains("store unavailable"));
    assert_eq!(report.total_commits(), 40);
    assert_eq!(db.harness().inspect().unwrap().counter, 40);
}

#[test]
fn test_store_error_stops_non_occ_worker() {
    for strategy in [Strategy::LostUpdate, Strategy::InPlaceUpdate] {
        let db = TestDb::new(2, 10);
        db.harness().bootstrap().unwrap();

        let report = WorkerPool::new(2, 10).run(strategy, |pid: ProcessId| {
            let store = SqliteCounterStore::connect(db.database())?;
            let writes = if pid == ProcessId(0) { 3 } else { usize::MAX };
            Ok(FailingWrites::new(store, writes))
        });

        assert_eq!(report.failed_workers().len(), 1, "{}", strategy);
        assert_eq!(report.workers[0].commits, 3, "{}", strategy);
        assert!(report.workers[1].status.is_completed(), "{}", strategy);
        assert_eq!(report.total_commits(), 13, "{}", strategy);
    }
}

#[test]
fn test_store_error_under_occ_is_retried() {
    let db = TestDb::new(1, 5);
    db.harness().bootstrap().unwrap();

    // Every CAS fails, so with a bounded policy the worker gives up on
    // the store error itself rather than a version conflict
    let pool = WorkerPool::new(1, 5).with_runner_options(RunnerOptions {
        retry: RetryPolicy::bounded(3, Duration::ZERO, Duration::ZERO),
        ..RunnerOptions::default()
    });
    let report = pool.run(Strategy::OptimisticConcurrencyControl, |_| {
        SqliteCounterStore::connect(db.database()).map(|store| FailingWrites::new(store, 0))
    });

    let worker = &report.workers[0];
    assert!(worker.status.error().unwrap().contains("store unavailable"));
    assert_eq!(worker.store_retries, 3);
    assert_eq!(worker.commits, 0);
}
