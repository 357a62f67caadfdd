//! Tests for the watermark store.

use super::*;
use crate::audit;
use crate::Warehouse;
use chrono::NaiveDate;

fn ts(date: &str, time: &str) -> NaiveDateTime {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .unwrap()
        .and_time(chrono::NaiveTime::parse_from_str(time, "%H:%M:%S").unwrap())
}

fn begin_run(wh: &Warehouse) -> i64 {
    audit::begin_run(wh.conn(), "incremental", "corr-test").unwrap()
}

#[test]
fn seeded_watermarks_start_at_epoch() {
    let wh = Warehouse::open_memory().unwrap();
    let wm = get_watermark(wh.conn(), "transaction_db", "loan")
        .unwrap()
        .unwrap();
    assert_eq!(wm, ts("1970-01-01", "00:00:00"));
}

#[test]
fn unknown_pair_returns_none() {
    let wh = Warehouse::open_memory().unwrap();
    assert!(get_watermark(wh.conn(), "transaction_db", "no_such_table")
        .unwrap()
        .is_none());
}

#[test]
fn advance_moves_forward_and_records_run() {
    let wh = Warehouse::open_memory().unwrap();
    let run_id = begin_run(&wh);
    let new = ts("2025-10-29", "12:00:00");

    assert!(advance_watermark(wh.conn(), "transaction_db", "loan", new, run_id).unwrap());
    let stored = get_watermark(wh.conn(), "transaction_db", "loan")
        .unwrap()
        .unwrap();
    assert_eq!(stored, new);

    let last_run: i64 = wh
        .conn()
        .query_row(
            "SELECT last_run_id FROM etl_watermarks
             WHERE source_name = 'transaction_db' AND table_name = 'loan'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(last_run, run_id);
}

#[test]
fn advance_never_rewinds() {
    let wh = Warehouse::open_memory().unwrap();
    let run_id = begin_run(&wh);
    let high = ts("2025-10-29", "12:00:00");
    let low = ts("2025-10-28", "12:00:00");

    assert!(advance_watermark(wh.conn(), "transaction_db", "user", high, run_id).unwrap());
    assert!(!advance_watermark(wh.conn(), "transaction_db", "user", low, run_id).unwrap());

    let stored = get_watermark(wh.conn(), "transaction_db", "user")
        .unwrap()
        .unwrap();
    assert_eq!(stored, high);
}

#[test]
fn advance_to_same_value_is_a_no_op() {
    let wh = Warehouse::open_memory().unwrap();
    let run_id = begin_run(&wh);
    let value = ts("2025-10-29", "12:00:00");

    assert!(advance_watermark(wh.conn(), "transaction_db", "user", value, run_id).unwrap());
    assert!(!advance_watermark(wh.conn(), "transaction_db", "user", value, run_id).unwrap());
}

#[test]
fn list_returns_all_seeded_rows() {
    let wh = Warehouse::open_memory().unwrap();
    let rows = list_watermarks(wh.conn()).unwrap();
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|r| r.source_name == "transaction_db"));
    assert!(rows.iter().any(|r| r.table_name == "repayment_schedule"));
}

#[test]
fn microsecond_precision_survives_round_trip() {
    let wh = Warehouse::open_memory().unwrap();
    let run_id = begin_run(&wh);
    let value = ts("2025-10-29", "12:00:00") + chrono::Duration::microseconds(123_456);

    advance_watermark(wh.conn(), "transaction_db", "loan", value, run_id).unwrap();
    let stored = get_watermark(wh.conn(), "transaction_db", "loan")
        .unwrap()
        .unwrap();
    assert_eq!(stored, value);
}
