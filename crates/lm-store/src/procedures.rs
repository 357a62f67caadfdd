//! Set-based bulk procedures.
//!
//! These replace the original platform's stored procedures behind the same
//! narrow contract: callable with (run_id, batch_size) or (snapshot_date),
//! idempotent per run id / date, returning row counts plus a (status,
//! message) pair where any non-"success" status is a recoverable per-table
//! failure for the caller to record.

use crate::error::{StoreError, StoreResult};
use chrono::NaiveDate;
use duckdb::Connection;
use lm_core::enrich::date_key_for;

/// Status string a successful procedure reports.
pub const STATUS_SUCCESS: &str = "success";

/// Outcome of a bulk procedure, mirroring the OUT parameters of the
/// original stored-procedure contract.
#[derive(Debug, Clone)]
pub struct ProcedureOutcome {
    pub rows_loaded: i64,
    pub rows_rejected: i64,
    pub status: String,
    pub message: String,
}

impl ProcedureOutcome {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

fn staged_loan_count(conn: &Connection, run_id: i64) -> StoreResult<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM etl_staging_loan WHERE run_id = ?",
        duckdb::params![run_id],
        |row| row.get(0),
    )
    .map_err(|e| StoreError::ProcedureError(format!("count etl_staging_loan: {e}")))
}

/// Load `fact_loan_transactions` from the run's staged rows.
///
/// Deletes the run's prior fact rows first (replays are idempotent), then
/// inserts every staged row whose borrower resolves to a current dim_user
/// row. Staged rows that do not resolve count as rejected. The dimension
/// join happens once, set-based, rather than per staged row.
pub fn load_fact_transactions(
    conn: &Connection,
    run_id: i64,
    batch_size: usize,
) -> StoreResult<ProcedureOutcome> {
    let staged = staged_loan_count(conn, run_id)?;
    if staged == 0 {
        return Ok(ProcedureOutcome {
            rows_loaded: 0,
            rows_rejected: 0,
            status: STATUS_SUCCESS.to_string(),
            message: format!("no staged rows for run {run_id}"),
        });
    }

    conn.execute(
        "DELETE FROM fact_loan_transactions WHERE run_id = ?",
        duckdb::params![run_id],
    )
    .map_err(|e| StoreError::ProcedureError(format!("clear prior fact rows: {e}")))?;

    let loaded = conn
        .execute(
            "INSERT INTO fact_loan_transactions
             (run_id, loan_id, application_id, date_key, user_key, product_key,
              transaction_type, principal_amount, interest_amount, total_amount,
              amount_usd, interest_rate, term_months, term_category,
              outstanding_balance, status, currency_code, fx_rate)
             SELECT s.run_id, s.loan_id, s.application_id, s.date_key, u.user_key, NULL,
                    s.transaction_type, s.principal_amount, s.interest_amount, s.total_amount,
                    s.amount_usd, s.interest_rate, s.term_months, s.term_category,
                    s.outstanding_balance, s.status, s.currency_code, s.fx_rate
             FROM etl_staging_loan s
             JOIN dim_user u ON u.user_id = s.borrower_id AND u.is_current
             WHERE s.run_id = ?",
            duckdb::params![run_id],
        )
        .map_err(|e| StoreError::ProcedureError(format!("insert fact_loan_transactions: {e}")))?
        as i64;

    let rejected = staged - loaded;
    Ok(ProcedureOutcome {
        rows_loaded: loaded,
        rows_rejected: rejected,
        status: STATUS_SUCCESS.to_string(),
        message: format!(
            "loaded {loaded} fact rows, rejected {rejected} (batch_size {batch_size})"
        ),
    })
}

/// Replace the portfolio snapshot for `snapshot_date` from staging.
///
/// Exactly one `fact_daily_portfolio` row exists per date key; the refresh
/// deletes any prior row for the date and inserts the latest staged
/// snapshot. A missing staged snapshot is a non-success outcome, not an
/// error.
pub fn refresh_portfolio_snapshot(
    conn: &Connection,
    snapshot_date: NaiveDate,
) -> StoreResult<ProcedureOutcome> {
    let date_key = date_key_for(snapshot_date);

    conn.execute(
        "DELETE FROM fact_daily_portfolio WHERE date_key = ?",
        duckdb::params![date_key],
    )
    .map_err(|e| StoreError::ProcedureError(format!("clear prior snapshot: {e}")))?;

    let loaded = conn
        .execute(
            "INSERT INTO fact_daily_portfolio
             (date_key, run_id, total_users, active_borrowers, active_lenders,
              total_loans, active_loans, total_principal, total_outstanding,
              total_repaid, loans_originated_today, amount_originated_today,
              payments_received_today, loans_defaulted, loans_paid_off,
              default_rate, delinquency_rate, avg_loan_size, avg_interest_rate,
              weighted_avg_credit_score)
             SELECT s.date_key, s.run_id, s.total_users, s.active_borrowers, s.active_lenders,
                    s.total_loans, s.active_loans, s.total_principal, s.total_outstanding,
                    s.total_repaid, s.loans_originated_today, s.amount_originated_today,
                    s.payments_received_today, s.loans_defaulted, s.loans_paid_off,
                    s.default_rate, s.delinquency_rate, s.avg_loan_size, s.avg_interest_rate,
                    s.weighted_avg_credit_score
             FROM etl_staging_portfolio s
             WHERE s.date_key = ?
               AND s.run_id = (SELECT MAX(run_id) FROM etl_staging_portfolio
                               WHERE date_key = ?)",
            duckdb::params![date_key, date_key],
        )
        .map_err(|e| StoreError::ProcedureError(format!("insert fact_daily_portfolio: {e}")))?
        as i64;

    if loaded == 1 {
        Ok(ProcedureOutcome {
            rows_loaded: 1,
            rows_rejected: 0,
            status: STATUS_SUCCESS.to_string(),
            message: format!("snapshot for {snapshot_date} refreshed"),
        })
    } else {
        Ok(ProcedureOutcome {
            rows_loaded: 0,
            rows_rejected: 0,
            status: "no_data".to_string(),
            message: format!("no staged snapshot for {snapshot_date}"),
        })
    }
}

#[cfg(test)]
#[path = "procedures_test.rs"]
mod tests;
