//! End-to-end orchestrator tests against an in-memory warehouse.

use super::*;
use crate::error::EtlError;
use lm_core::RunMode;
use lm_store::testing;

fn setup() -> Warehouse {
    let wh = Warehouse::open_memory().unwrap();
    testing::create_source_schema(wh.conn()).unwrap();
    testing::seed_reference_data(wh.conn()).unwrap();
    testing::seed_market_data(wh.conn(), "2025-10-28").unwrap();
    wh
}

fn seed_portfolio(wh: &Warehouse) {
    testing::insert_user(wh.conn(), 1, "a@lend.test", "borrower", Some(720), "2025-10-01 08:00:00")
        .unwrap();
    testing::insert_user(wh.conn(), 2, "b@lend.test", "lender", None, "2025-10-02 08:00:00")
        .unwrap();
    testing::insert_loan(
        wh.conn(),
        10,
        1,
        "5000.00",
        "8.5",
        12,
        "active",
        "USD",
        "2025-10-03 09:00:00",
    )
    .unwrap();
}

fn config(mode: RunMode, dry_run: bool) -> EtlConfig {
    EtlConfig {
        batch_size: 1000,
        mode,
        dry_run,
    }
}

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 29).unwrap()
}

fn count(wh: &Warehouse, sql: &str) -> i64 {
    wh.conn().query_row(sql, [], |row| row.get(0)).unwrap()
}

fn run_record(wh: &Warehouse, run_id: i64) -> (String, Option<String>, i64, i64) {
    wh.conn()
        .query_row(
            "SELECT status, error_message, rows_transformed, rows_rejected
             FROM etl_run_log WHERE run_id = ?",
            duckdb::params![run_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .unwrap()
}

#[test]
fn full_run_populates_the_star_schema() {
    let wh = setup();
    seed_portfolio(&wh);

    let orchestrator = EtlOrchestrator::new(&wh, config(RunMode::Full, false)).with_as_of(as_of());
    let report = orchestrator.run().unwrap();

    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.mode, RunMode::Full);
    assert!(report.error.is_none());
    assert_eq!(report.extract.len(), 12);
    assert_eq!(report.transform.len(), 4);
    assert_eq!(report.load.len(), 4);
    assert_eq!(report.totals.rows_transformed, 2 + 3 + 1 + 1);

    assert_eq!(count(&wh, "SELECT COUNT(*) FROM dim_user"), 2);
    assert_eq!(count(&wh, "SELECT COUNT(*) FROM dim_loan_product"), 3);
    assert_eq!(count(&wh, "SELECT COUNT(*) FROM fact_loan_transactions"), 1);
    assert_eq!(
        count(&wh, "SELECT COUNT(*) FROM fact_daily_portfolio WHERE date_key = 20251029"),
        1
    );

    let (status, error, transformed, _) = run_record(&wh, report.run_id);
    assert_eq!(status, "success");
    assert!(error.is_none());
    assert_eq!(transformed, report.totals.rows_transformed);

    // One step row per phase, all correlated with the run.
    assert_eq!(
        count(
            &wh,
            &format!("SELECT COUNT(*) FROM etl_step_log WHERE run_id = {}", report.run_id)
        ),
        3
    );
}

#[test]
fn dry_run_skips_the_load_phase() {
    let wh = setup();
    seed_portfolio(&wh);

    let orchestrator = EtlOrchestrator::new(&wh, config(RunMode::Full, true)).with_as_of(as_of());
    let report = orchestrator.run().unwrap();

    assert_eq!(report.status, RunStatus::Success);
    assert!(report.dry_run);
    assert!(report.load.is_empty());
    assert_eq!(report.totals.rows_loaded, 0);
    assert_eq!(count(&wh, "SELECT COUNT(*) FROM dim_user"), 0);
    assert_eq!(count(&wh, "SELECT COUNT(*) FROM fact_loan_transactions"), 0);
    assert_eq!(
        count(
            &wh,
            &format!("SELECT COUNT(*) FROM etl_step_log WHERE run_id = {}", report.run_id)
        ),
        2
    );
}

#[test]
fn rejected_rows_do_not_fail_the_run() {
    let wh = setup();
    seed_portfolio(&wh);
    // Borrower 999 has no user row: the loan is rejected in transform.
    testing::insert_loan(
        wh.conn(),
        11,
        999,
        "1000.00",
        "5.0",
        6,
        "active",
        "USD",
        "2025-10-04 09:00:00",
    )
    .unwrap();

    let orchestrator = EtlOrchestrator::new(&wh, config(RunMode::Full, false)).with_as_of(as_of());
    let report = orchestrator.run().unwrap();

    assert_eq!(report.status, RunStatus::Success);
    let fact_metric = report
        .transform
        .iter()
        .find(|m| m.table == "fact_loan_transactions")
        .unwrap();
    assert_eq!(fact_metric.rows, 1);
    assert_eq!(fact_metric.rejected, 1);

    let (_, _, _, rejected) = run_record(&wh, report.run_id);
    assert!(rejected >= 1);
    // The validation error is persisted with the run's correlation id.
    assert_eq!(
        count(
            &wh,
            &format!(
                "SELECT COUNT(*) FROM etl_error_log
                 WHERE run_id = {} AND error_type = 'INVALID_FK'
                   AND correlation_id = '{}'",
                report.run_id, report.correlation_id
            )
        ),
        1
    );
}

#[test]
fn extract_failure_marks_the_run_failed_and_reraises() {
    let wh = setup();
    wh.conn().execute_batch("DROP TABLE \"user\"").unwrap();

    let orchestrator = EtlOrchestrator::new(&wh, config(RunMode::Full, false)).with_as_of(as_of());
    let err = orchestrator.run().unwrap_err();
    assert!(matches!(err, EtlError::Extract { .. }));

    let run_id = count(&wh, "SELECT MAX(run_id) FROM etl_run_log");
    let (status, error, _, _) = run_record(&wh, run_id);
    assert_eq!(status, "failed");
    assert!(error.unwrap().contains("[P001]"));
}

#[test]
fn caught_load_failure_makes_the_run_partial() {
    let wh = setup();
    seed_portfolio(&wh);
    wh.conn().execute_batch("DROP TABLE etl_staging_loan").unwrap();

    let orchestrator = EtlOrchestrator::new(&wh, config(RunMode::Full, false)).with_as_of(as_of());
    let report = orchestrator.run().unwrap();

    assert_eq!(report.status, RunStatus::Partial);
    let fact_load = report
        .load
        .iter()
        .find(|r| r.table == "fact_loan_transactions")
        .unwrap();
    assert!(!fact_load.success);
    assert!(fact_load.error.is_some());

    // The dimensions still loaded.
    assert_eq!(count(&wh, "SELECT COUNT(*) FROM dim_user"), 2);
    let (status, _, _, _) = run_record(&wh, report.run_id);
    assert_eq!(status, "partial");
}

#[test]
fn incremental_rerun_with_no_new_data_is_empty_but_successful() {
    let wh = setup();
    seed_portfolio(&wh);

    let first = EtlOrchestrator::new(&wh, config(RunMode::Incremental, false)).with_as_of(as_of());
    let report1 = first.run().unwrap();
    assert_eq!(report1.status, RunStatus::Success);

    let second = EtlOrchestrator::new(&wh, config(RunMode::Incremental, false)).with_as_of(as_of());
    let report2 = second.run().unwrap();

    assert_eq!(report2.status, RunStatus::Success);
    let users = report2.extract.iter().find(|m| m.table == "users").unwrap();
    assert_eq!(users.rows, 0);
    // Dimension state is untouched by the empty rerun.
    assert_eq!(count(&wh, "SELECT COUNT(*) FROM dim_user"), 2);
}

#[test]
fn report_serializes_to_json() {
    let wh = setup();
    seed_portfolio(&wh);

    let orchestrator = EtlOrchestrator::new(&wh, config(RunMode::Full, false)).with_as_of(as_of());
    let report = orchestrator.run().unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["mode"], "full");
    assert_eq!(json["extract"].as_array().unwrap().len(), 12);
    assert!(json["totals"]["rows_loaded"].as_i64().unwrap() >= 1);
}
