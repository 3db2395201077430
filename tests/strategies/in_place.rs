//! In-place update: one atomic increment per iteration

use crate::*;

#[test]
fn test_five_workers_hundred_updates_is_500() {
    let db = TestDb::new(5, 100);
    let report = db.run(Strategy::InPlaceUpdate);
    assert_eq!(report.final_counter(), Some(500));
    assert_exact(&report);
}

#[test]
fn test_exact_total_is_repeatable() {
    let db = TestDb::new(5, 100);
    for _ in 0..3 {
        let report = db.run(Strategy::InPlaceUpdate);
        assert_eq!(report.final_counter(), Some(500));
    }
}

#[test]
fn test_exact_total_across_shapes() {
    for (p, n) in [(1, 1), (1, 50), (8, 25), (16, 5)] {
        let db = TestDb::new(p, n);
        assert_exact(&db.run(Strategy::InPlaceUpdate));
    }
}

#[test]
fn test_version_is_untouched() {
    let db = TestDb::new(3, 10);
    let report = db.run(Strategy::InPlaceUpdate);
    assert_eq!(report.final_row.map(|r| r.version), Some(1));
}
