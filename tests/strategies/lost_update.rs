//! Lost update: unguarded read-modify-write

use crate::*;

#[test]
fn test_two_workers_one_update_lose_one() {
    // Both workers read 0 well before either writes, so both write 1
    let db = TestDb::new(2, 1).with_think_time(Duration::from_millis(300));
    let report = db.run(Strategy::LostUpdate);

    assert!(report.failed_workers().is_empty());
    assert_eq!(report.total_commits(), 2);
    assert_eq!(report.final_counter(), Some(1));
    assert_eq!(report.lost_updates(), Some(1));
    assert!(!report.is_consistent());
}

#[test]
fn test_contention_undercounts() {
    let db = TestDb::new(4, 50).with_think_time(Duration::from_millis(2));
    let report = db.run(Strategy::LostUpdate);

    assert!(report.failed_workers().is_empty());
    let counter = report.final_counter().unwrap();
    assert!(
        counter < report.expected_total(),
        "expected lost increments, got {} of {}",
        counter,
        report.expected_total()
    );
    assert!(counter >= 50, "every worker's own increments are sequential");
}

#[test]
fn test_single_worker_is_exact() {
    let db = TestDb::new(1, 25);
    assert_exact(&db.run(Strategy::LostUpdate));
}
