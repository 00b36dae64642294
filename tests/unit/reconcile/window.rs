//! Unit tests for window reconciliation

use crate::support::{bar, day, SYMBOL};
use chrono::Duration;
use stocksignal::error::ReconciliationError;
use stocksignal::models::PriceBar;
use stocksignal::reconcile::{
    backfill, compare, differing_fields, plan_window_start, trailing_slice, RowStatus,
    WindowReconciler,
};

fn reconciler() -> WindowReconciler {
    WindowReconciler::new(0.001, 30)
}

#[test]
fn test_small_revision_within_tolerance_is_unchanged() {
    assert_eq!(compare(Some(&bar(1, 100.00)), &bar(1, 100.05), 0.001), RowStatus::Unchanged);
}

#[test]
fn test_revision_beyond_tolerance_is_changed() {
    let stored = bar(1, 100.0);
    let fetched = bar(1, 101.0);
    assert_eq!(compare(Some(&stored), &fetched, 0.001), RowStatus::Changed);
    assert_eq!(differing_fields(&stored, &fetched, 0.001), vec!["close"]);
}

#[test]
fn test_volume_must_match_exactly() {
    let stored = bar(1, 100.0);
    let mut fetched = bar(1, 100.0);
    fetched.volume += 1;
    assert_eq!(compare(Some(&stored), &fetched, 0.001), RowStatus::Changed);
    assert_eq!(differing_fields(&stored, &fetched, 0.001), vec!["volume"]);
}

#[test]
fn test_missing_row_is_new() {
    assert_eq!(compare(None, &bar(1, 100.0), 0.001), RowStatus::New);
}

#[test]
fn test_identical_windows_produce_empty_plan() {
    let window: Vec<PriceBar> = (1..=5).map(|d| bar(d, 100.0 + d as f64)).collect();
    let plan = reconciler().reconcile(SYMBOL, &window, &window).unwrap();
    assert!(plan.is_empty());
    assert_eq!(plan.unchanged_count, 5);
    assert_eq!(plan.window_start, Some(day(1)));
    assert_eq!(plan.window_end, Some(day(5)));
}

#[test]
fn test_one_new_trailing_row_is_inserted() {
    let stored: Vec<PriceBar> = (1..=4).map(|d| bar(d, 100.0)).collect();
    let fetched: Vec<PriceBar> = (1..=5).map(|d| bar(d, 100.0)).collect();
    let plan = reconciler().reconcile(SYMBOL, &stored, &fetched).unwrap();
    assert_eq!(plan.to_insert, vec![bar(5, 100.0)]);
    assert!(plan.to_update.is_empty());
    assert_eq!(plan.unchanged_count, 4);
}

#[test]
fn test_mixed_window_partitions_every_row() {
    let stored = vec![bar(1, 100.0), bar(2, 100.0), bar(3, 100.0)];
    let fetched = vec![bar(1, 100.02), bar(2, 103.0), bar(3, 100.0), bar(4, 104.0)];
    let plan = reconciler().reconcile(SYMBOL, &stored, &fetched).unwrap();

    assert_eq!(plan.unchanged_count, 2);
    assert_eq!(plan.to_update, vec![(day(2), bar(2, 103.0))]);
    assert_eq!(plan.to_insert, vec![bar(4, 104.0)]);
    assert_eq!(plan.changed_count() + plan.unchanged_count, fetched.len());
}

#[test]
fn test_stored_rows_outside_fetched_are_left_alone() {
    let stored = vec![bar(1, 50.0), bar(2, 100.0)];
    let fetched = vec![bar(2, 100.0)];
    let plan = reconciler().reconcile(SYMBOL, &stored, &fetched).unwrap();
    assert!(plan.is_empty());
    assert_eq!(plan.unchanged_count, 1);
}

#[test]
fn test_empty_fetch_is_empty_plan() {
    let stored = vec![bar(1, 100.0)];
    let plan = reconciler().reconcile(SYMBOL, &stored, &[]).unwrap();
    assert!(plan.is_empty());
    assert_eq!(plan.window_start, None);
    assert_eq!(plan.unchanged_count, 0);
}

#[test]
fn test_unsorted_fetch_is_rejected() {
    let fetched = vec![bar(2, 100.0), bar(1, 100.0)];
    let err = reconciler().reconcile(SYMBOL, &[], &fetched).unwrap_err();
    assert!(matches!(
        err,
        ReconciliationError::Unsorted { window: "fetched", index: 1, .. }
    ));
}

#[test]
fn test_duplicate_timestamp_is_rejected() {
    let stored = vec![bar(1, 100.0), bar(1, 101.0)];
    let err = reconciler().reconcile(SYMBOL, &stored, &[bar(1, 100.0)]).unwrap_err();
    assert_eq!(
        err,
        ReconciliationError::DuplicateTimestamp {
            symbol: SYMBOL.to_string(),
            window: "stored",
            timestamp: day(1),
        }
    );
}

#[test]
fn test_foreign_symbol_is_rejected() {
    let mut other = bar(2, 100.0);
    other.symbol = "2317".to_string();
    let err = reconciler()
        .reconcile(SYMBOL, &[], &[bar(1, 100.0), other])
        .unwrap_err();
    assert!(matches!(err, ReconciliationError::ForeignSymbol { ref found, .. } if found == "2317"));
}

#[test]
fn test_window_start_reaches_back_to_stale_latest() {
    let as_of = day(100);
    assert_eq!(plan_window_start(Some(day(99)), as_of, 30), as_of - Duration::days(30));
    assert_eq!(plan_window_start(Some(day(10)), as_of, 30), day(10));
    assert_eq!(plan_window_start(None, as_of, 30), as_of - Duration::days(30));
}

#[test]
fn test_trailing_slice_starts_at_boundary() {
    let bars: Vec<PriceBar> = (1..=10).map(|d| bar(d, 100.0)).collect();
    let tail = trailing_slice(&bars, day(8));
    assert_eq!(tail.len(), 3);
    assert_eq!(tail[0].timestamp, day(8));
    assert!(trailing_slice(&bars, day(20)).is_empty());
}

#[test]
fn test_backfill_only_takes_rows_before_earliest() {
    let fetched: Vec<PriceBar> = (1..=10).map(|d| bar(d, 100.0)).collect();
    let rows = backfill(Some(day(4)), &fetched);
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|b| b.timestamp < day(4)));
    assert!(backfill(None, &fetched).is_empty());
}
