//! Optimistic concurrency control: versioned compare-and-swap

use std::collections::HashSet;

use crate::recording::Recorder;
use crate::*;
use counterlab::{ProcessId, WorkerPool};

#[test]
fn test_exact_total_across_shapes() {
    for (p, n) in [(1, 10), (4, 50), (10, 20)] {
        let db = TestDb::new(p, n);
        assert_exact(&db.run(Strategy::OptimisticConcurrencyControl));
    }
}

#[test]
fn test_version_is_one_plus_commits() {
    let db = TestDb::new(6, 30);
    let report = db.run(Strategy::OptimisticConcurrencyControl);
    assert_exact(&report);
    let row = report.final_row.unwrap();
    assert_eq!(row.version, 1 + report.total_commits() as i64);
    assert_eq!(row.version, 181);
}

#[test]
fn test_each_version_is_consumed_once() {
    let db = TestDb::new(5, 40);
    db.harness().bootstrap().unwrap();

    let recorder = Recorder::new();
    let report = WorkerPool::new(5, 40).run(
        Strategy::OptimisticConcurrencyControl,
        |pid: ProcessId| {
            SqliteCounterStore::connect(db.database()).map(|store| recorder.wrap(pid, store))
        },
    );
    assert!(report.failed_workers().is_empty());

    let versions = recorder.cas_versions();
    assert_eq!(versions.len(), 200);
    let unique: HashSet<i64> = versions.iter().copied().collect();
    assert_eq!(unique.len(), versions.len(), "two CAS succeeded on one version");
    assert_eq!(unique, (1..=200).collect::<HashSet<i64>>());
}

#[test]
fn test_conflicts_under_think_time_still_converge() {
    let db = TestDb::new(3, 5).with_think_time(Duration::from_millis(5));
    let report = db.run(Strategy::OptimisticConcurrencyControl);
    assert_exact(&report);
    assert!(report.total_conflicts() > 0);
}

#[test]
fn test_bounded_retries_exhaust_under_contention() {
    // One attempt per update with a wide race window: somebody loses
    let db = TestDb::new(4, 5)
        .with_think_time(Duration::from_millis(20))
        .with_retry(RetryConfig {
            max_attempts: Some(1),
            base_backoff_ms: 0,
            max_backoff_ms: 0,
        });
    let report = db.run(Strategy::OptimisticConcurrencyControl);

    let failed = report.failed_workers();
    assert!(!failed.is_empty());
    for worker in &failed {
        assert!(worker.status.error().unwrap().contains("version conflict"));
    }
    // Whatever did commit is reflected exactly
    assert_eq!(report.final_counter(), Some(report.total_commits() as i64));
    assert_eq!(report.lost_updates(), Some(0));
}
