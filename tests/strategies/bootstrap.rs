//! Bootstrapper and harness setup

use crate::*;
use counterlab::{Bootstrapper, CounterRow, CounterStore, Error};

#[test]
fn test_ensure_row_exists_is_idempotent() {
    let db = TestDb::new(1, 1);
    let bootstrapper = Bootstrapper::new(db.database().clone());
    for _ in 0..3 {
        assert_eq!(bootstrapper.ensure_row_exists().unwrap(), CounterRow::initial());
    }
    assert_eq!(db.connect().read_row().unwrap(), CounterRow::initial());
}

#[test]
fn test_bootstrap_resets_a_dirty_row() {
    let db = TestDb::new(3, 10);
    db.run(Strategy::OptimisticConcurrencyControl);
    assert_ne!(db.harness().inspect().unwrap(), CounterRow::initial());

    let row = db.harness().bootstrap().unwrap();
    assert_eq!(row, CounterRow::initial());
}

#[test]
fn test_runs_do_not_accumulate() {
    let db = TestDb::new(2, 10);
    for strategy in [Strategy::InPlaceUpdate, Strategy::RowLevelLocking] {
        let report = db.run(strategy);
        assert_eq!(report.final_counter(), Some(20));
    }
}

#[test]
fn test_compare_runs_all_strategies_in_order() {
    let db = TestDb::new(2, 5);
    let reports = db.harness().compare().unwrap();
    let strategies: Vec<_> = reports.iter().map(|r| r.strategy).collect();
    assert_eq!(strategies, Strategy::ALL.to_vec());
    for report in &reports[1..] {
        assert!(report.is_consistent(), "{} was not exact", report.strategy);
    }
}

#[test]
fn test_bootstrap_without_table_fails() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::builder()
        .path(dir.path().join("empty.db"))
        .build()
        .unwrap();
    let err = harness.bootstrap().unwrap_err();
    assert!(matches!(err, Error::Bootstrap(_)), "got {:?}", err);
    assert!(harness.run(Strategy::InPlaceUpdate).is_err());
}

#[test]
fn test_builder_rejects_zero_workers() {
    let err = Harness::builder().processes(0).build().err().unwrap();
    assert!(matches!(err, Error::Config(_)));
}
