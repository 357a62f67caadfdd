//! Tests for the set-based bulk procedures.

use super::*;
use crate::audit;
use crate::Warehouse;

fn count(wh: &Warehouse, sql: &str) -> i64 {
    wh.conn()
        .query_row(sql, [], |row| row.get::<_, i64>(0))
        .unwrap()
}

fn exec(wh: &Warehouse, sql: &str) {
    wh.conn().execute(sql, []).unwrap();
}

fn insert_dim_user(wh: &Warehouse, user_id: i64) {
    exec(
        wh,
        &format!(
            "INSERT INTO dim_user (user_id, email, role, credit_tier)
             VALUES ({user_id}, 'u{user_id}@lend.test', 'borrower', 'Good')"
        ),
    );
}

fn stage_loan(wh: &Warehouse, run_id: i64, loan_id: i64, borrower_id: i64) {
    exec(
        wh,
        &format!(
            "INSERT INTO etl_staging_loan
             (run_id, loan_id, application_id, borrower_id, date_key, transaction_type,
              principal_amount, interest_amount, total_amount, amount_usd, interest_rate,
              term_months, term_category, outstanding_balance, status, currency_code, fx_rate)
             VALUES ({run_id}, {loan_id}, NULL, {borrower_id}, 20251029, 'origination',
                     5000.00, 425.00, 5425.00, 5000.00, 8.5,
                     12, 'medium', 5000.00, 'active', 'USD', 1.0)"
        ),
    );
}

fn stage_snapshot(wh: &Warehouse, run_id: i64, date_key: i64, total_loans: i64) {
    exec(
        wh,
        &format!(
            "INSERT INTO etl_staging_portfolio
             (run_id, date_key, total_users, active_borrowers, active_lenders,
              total_loans, active_loans, total_principal, total_outstanding, total_repaid,
              loans_originated_today, amount_originated_today, payments_received_today,
              loans_defaulted, loans_paid_off, default_rate, delinquency_rate,
              avg_loan_size, avg_interest_rate, weighted_avg_credit_score)
             VALUES ({run_id}, {date_key}, 10, 6, 3,
                     {total_loans}, 4, 50000.00, 30000.00, 20000.00,
                     0, 0, 0,
                     1, 2, 0.1667, 0,
                     8333.33, 9.25, 681.5)"
        ),
    );
}

// ── fact load ──────────────────────────────────────────────────────────

#[test]
fn fact_load_resolves_dimension_keys_set_based() {
    let wh = Warehouse::open_memory().unwrap();
    let run_id = audit::begin_run(wh.conn(), "full", "corr").unwrap();
    insert_dim_user(&wh, 1);
    stage_loan(&wh, run_id, 10, 1);
    stage_loan(&wh, run_id, 11, 999); // no dim_user row

    let outcome = load_fact_transactions(wh.conn(), run_id, 5000).unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.rows_loaded, 1);
    assert_eq!(outcome.rows_rejected, 1);

    assert_eq!(count(&wh, "SELECT COUNT(*) FROM fact_loan_transactions"), 1);
    let user_key: i64 = wh
        .conn()
        .query_row(
            "SELECT f.user_key FROM fact_loan_transactions f
             JOIN dim_user u ON u.user_key = f.user_key
             WHERE u.user_id = 1",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(user_key > 0);
}

#[test]
fn fact_load_is_idempotent_per_run() {
    let wh = Warehouse::open_memory().unwrap();
    let run_id = audit::begin_run(wh.conn(), "full", "corr").unwrap();
    insert_dim_user(&wh, 1);
    stage_loan(&wh, run_id, 10, 1);

    load_fact_transactions(wh.conn(), run_id, 5000).unwrap();
    load_fact_transactions(wh.conn(), run_id, 5000).unwrap();

    assert_eq!(count(&wh, "SELECT COUNT(*) FROM fact_loan_transactions"), 1);
}

#[test]
fn fact_load_with_empty_staging_succeeds() {
    let wh = Warehouse::open_memory().unwrap();
    let outcome = load_fact_transactions(wh.conn(), 99, 5000).unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.rows_loaded, 0);
    assert_eq!(outcome.rows_rejected, 0);
}

#[test]
fn fact_load_leaves_other_runs_untouched() {
    let wh = Warehouse::open_memory().unwrap();
    let first = audit::begin_run(wh.conn(), "full", "c1").unwrap();
    let second = audit::begin_run(wh.conn(), "full", "c2").unwrap();
    insert_dim_user(&wh, 1);
    stage_loan(&wh, first, 10, 1);
    stage_loan(&wh, second, 20, 1);

    load_fact_transactions(wh.conn(), first, 5000).unwrap();
    load_fact_transactions(wh.conn(), second, 5000).unwrap();
    load_fact_transactions(wh.conn(), second, 5000).unwrap();

    assert_eq!(count(&wh, "SELECT COUNT(*) FROM fact_loan_transactions"), 2);
    assert_eq!(
        count(
            &wh,
            &format!("SELECT COUNT(*) FROM fact_loan_transactions WHERE run_id = {first}")
        ),
        1
    );
}

// ── portfolio refresh ──────────────────────────────────────────────────

#[test]
fn snapshot_refresh_replaces_the_date_row() {
    let wh = Warehouse::open_memory().unwrap();
    let date = NaiveDate::from_ymd_opt(2025, 10, 29).unwrap();
    stage_snapshot(&wh, 1, 20251029, 6);

    let outcome = refresh_portfolio_snapshot(wh.conn(), date).unwrap();
    assert!(outcome.is_success());
    assert_eq!(count(&wh, "SELECT COUNT(*) FROM fact_daily_portfolio"), 1);

    // A later run stages fresher numbers for the same date.
    stage_snapshot(&wh, 2, 20251029, 9);
    refresh_portfolio_snapshot(wh.conn(), date).unwrap();

    assert_eq!(count(&wh, "SELECT COUNT(*) FROM fact_daily_portfolio"), 1);
    let total_loans: i64 = wh
        .conn()
        .query_row(
            "SELECT total_loans FROM fact_daily_portfolio WHERE date_key = 20251029",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(total_loans, 9);
}

#[test]
fn snapshot_refresh_without_staging_reports_no_data() {
    let wh = Warehouse::open_memory().unwrap();
    let date = NaiveDate::from_ymd_opt(2025, 10, 29).unwrap();
    let outcome = refresh_portfolio_snapshot(wh.conn(), date).unwrap();
    assert!(!outcome.is_success());
    assert_eq!(outcome.status, "no_data");
    assert_eq!(count(&wh, "SELECT COUNT(*) FROM fact_daily_portfolio"), 0);
}

#[test]
fn snapshot_dates_do_not_interfere() {
    let wh = Warehouse::open_memory().unwrap();
    stage_snapshot(&wh, 1, 20251028, 5);
    stage_snapshot(&wh, 2, 20251029, 6);

    refresh_portfolio_snapshot(wh.conn(), NaiveDate::from_ymd_opt(2025, 10, 28).unwrap()).unwrap();
    refresh_portfolio_snapshot(wh.conn(), NaiveDate::from_ymd_opt(2025, 10, 29).unwrap()).unwrap();

    assert_eq!(count(&wh, "SELECT COUNT(*) FROM fact_daily_portfolio"), 2);
}
