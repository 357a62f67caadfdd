//! Load phase: upsert dimensions and bulk-load facts into the star schema.
//!
//! Dimensions are refreshed in place with batched `ON CONFLICT` upserts,
//! committed per batch. Fact rows are staged per run and handed to the
//! set-based bulk procedures, which resolve dimension keys in one join and
//! are idempotent per run id. A failed table load is caught, recorded on its
//! LoadResult, and does not abort the other tables.

use crate::error::{EtlError, EtlResult};
use crate::records::{DimProductRow, DimUserRow, FactLoanRow, PortfolioSnapshot};
use crate::transform::TransformBundle;
use chrono::NaiveDate;
use lm_store::{procedures, Warehouse};
use serde::Serialize;
use std::time::Instant;

/// Row count above which staging tries the DuckDB appender before falling
/// back to prepared inserts.
const APPENDER_MIN_ROWS: usize = 500;

/// One target table's load outcome. `success = false` is non-fatal to the
/// run but travels into the step log and the run report.
#[derive(Debug, Clone, Serialize)]
pub struct LoadResult {
    pub table: &'static str,
    pub rows_staged: usize,
    pub rows_inserted: i64,
    pub rows_updated: i64,
    pub rows_rejected: i64,
    pub load_secs: f64,
    pub success: bool,
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub load_method: &'static str,
}

impl LoadResult {
    pub fn rows_per_second(&self) -> f64 {
        if self.load_secs > 0.0 {
            self.rows_inserted as f64 / self.load_secs
        } else {
            0.0
        }
    }
}

/// Per-table load outcomes for one run.
#[derive(Debug)]
pub struct LoadBundle {
    pub dim_user: LoadResult,
    pub dim_loan_product: LoadResult,
    pub fact_loan_transactions: LoadResult,
    pub fact_daily_portfolio: LoadResult,
}

impl LoadBundle {
    pub fn results(&self) -> Vec<&LoadResult> {
        vec![
            &self.dim_user,
            &self.dim_loan_product,
            &self.fact_loan_transactions,
            &self.fact_daily_portfolio,
        ]
    }

    pub fn total_loaded(&self) -> i64 {
        self.results().iter().map(|r| r.rows_inserted).sum()
    }

    pub fn total_rejected(&self) -> i64 {
        self.results().iter().map(|r| r.rows_rejected).sum()
    }

    pub fn any_failed(&self) -> bool {
        self.results().iter().any(|r| !r.success)
    }
}

/// The bracketed code every crate error message leads with.
fn bracketed_code(message: &str) -> Option<String> {
    let rest = message.strip_prefix('[')?;
    let end = rest.find(']')?;
    Some(rest[..end].to_string())
}

/// Loader over a borrowed warehouse handle.
pub struct Loader<'a> {
    warehouse: &'a Warehouse,
    batch_size: usize,
}

impl<'a> Loader<'a> {
    pub fn new(warehouse: &'a Warehouse, batch_size: usize) -> Self {
        Self {
            warehouse,
            batch_size,
        }
    }

    fn load_error(table: &str, message: impl std::fmt::Display) -> EtlError {
        EtlError::Load {
            table: table.to_string(),
            message: message.to_string(),
        }
    }

    /// Upsert dim_user rows in place: one row per natural key, refreshed on
    /// conflict. Committed per batch; the affected count approximates
    /// inserts (DuckDB reports no insert/update split).
    pub fn load_dim_users(&self, rows: &[DimUserRow]) -> EtlResult<LoadResult> {
        let start = Instant::now();
        let mut affected = 0i64;

        for chunk in rows.chunks(self.batch_size) {
            affected += self.warehouse.transaction(|conn| {
                let mut stmt = conn.prepare(
                    "INSERT INTO dim_user
                     (user_id, email, full_name, role, credit_score, credit_tier,
                      region_code, region_name, is_active, effective_date, expiry_date, is_current)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, CAST(? AS DATE), CAST(? AS DATE), ?)
                     ON CONFLICT (user_id) DO UPDATE SET
                       email = excluded.email,
                       full_name = excluded.full_name,
                       role = excluded.role,
                       credit_score = excluded.credit_score,
                       credit_tier = excluded.credit_tier,
                       region_code = excluded.region_code,
                       region_name = excluded.region_name,
                       is_active = excluded.is_active,
                       effective_date = excluded.effective_date,
                       expiry_date = excluded.expiry_date,
                       is_current = excluded.is_current",
                )?;
                let mut batch_affected = 0i64;
                for row in chunk {
                    batch_affected += stmt.execute(duckdb::params![
                        row.user_id,
                        row.email,
                        row.full_name,
                        row.role,
                        row.credit_score,
                        row.credit_tier.to_string(),
                        row.region_code,
                        row.region_name,
                        row.is_active,
                        row.effective_date.to_string(),
                        row.expiry_date.to_string(),
                        row.is_current,
                    ])? as i64;
                }
                Ok(batch_affected)
            })?;
        }

        let load_secs = start.elapsed().as_secs_f64();
        log::info!("Upserted {affected} dim_user rows in {load_secs:.2}s");
        Ok(LoadResult {
            table: "dim_user",
            rows_staged: rows.len(),
            rows_inserted: affected,
            rows_updated: 0,
            rows_rejected: 0,
            load_secs,
            success: true,
            error: None,
            error_code: None,
            load_method: "upsert",
        })
    }

    /// Upsert dim_loan_product rows in place, keyed on product_code.
    pub fn load_dim_products(&self, rows: &[DimProductRow]) -> EtlResult<LoadResult> {
        let start = Instant::now();
        let mut affected = 0i64;

        for chunk in rows.chunks(self.batch_size) {
            affected += self.warehouse.transaction(|conn| {
                let mut stmt = conn.prepare(
                    "INSERT INTO dim_loan_product
                     (product_code, product_name, category, term_category,
                      min_amount, max_amount, base_interest_rate, risk_tier,
                      effective_date, expiry_date, is_current)
                     VALUES (?, ?, ?, ?, CAST(? AS DECIMAL(15,2)), CAST(? AS DECIMAL(15,2)),
                             CAST(? AS DECIMAL(8,4)), ?, CAST(? AS DATE), CAST(? AS DATE), ?)
                     ON CONFLICT (product_code) DO UPDATE SET
                       product_name = excluded.product_name,
                       category = excluded.category,
                       term_category = excluded.term_category,
                       min_amount = excluded.min_amount,
                       max_amount = excluded.max_amount,
                       base_interest_rate = excluded.base_interest_rate,
                       risk_tier = excluded.risk_tier,
                       effective_date = excluded.effective_date,
                       expiry_date = excluded.expiry_date,
                       is_current = excluded.is_current",
                )?;
                let mut batch_affected = 0i64;
                for row in chunk {
                    batch_affected += stmt.execute(duckdb::params![
                        row.product_code,
                        row.product_name,
                        row.category,
                        row.term_category.to_string(),
                        row.min_amount.map(|d| d.to_string()),
                        row.max_amount.map(|d| d.to_string()),
                        row.base_interest_rate.map(|d| d.to_string()),
                        row.risk_tier,
                        row.effective_date.to_string(),
                        row.expiry_date.to_string(),
                        row.is_current,
                    ])? as i64;
                }
                Ok(batch_affected)
            })?;
        }

        let load_secs = start.elapsed().as_secs_f64();
        log::info!("Upserted {affected} dim_loan_product rows in {load_secs:.2}s");
        Ok(LoadResult {
            table: "dim_loan_product",
            rows_staged: rows.len(),
            rows_inserted: affected,
            rows_updated: 0,
            rows_rejected: 0,
            load_secs,
            success: true,
            error: None,
            error_code: None,
            load_method: "upsert",
        })
    }

    fn clear_loan_staging(&self, run_id: i64) -> EtlResult<()> {
        self.warehouse
            .conn()
            .execute(
                "DELETE FROM etl_staging_loan WHERE run_id = ?",
                duckdb::params![run_id],
            )
            .map_err(|e| Self::load_error("etl_staging_loan", e))?;
        Ok(())
    }

    fn append_fact_rows(&self, rows: &[FactLoanRow], run_id: i64) -> duckdb::Result<()> {
        let mut appender = self.warehouse.conn().appender("etl_staging_loan")?;
        for row in rows {
            appender.append_row(duckdb::params![
                run_id,
                row.loan_id,
                row.application_id,
                row.borrower_id,
                row.date_key,
                row.transaction_type,
                row.principal_amount.to_string(),
                row.interest_amount.to_string(),
                row.total_amount.to_string(),
                row.amount_usd.to_string(),
                row.interest_rate.to_string(),
                row.term_months,
                row.term_category.to_string(),
                row.outstanding_balance.to_string(),
                row.status,
                row.currency_code,
                row.fx_rate.to_string(),
            ])?;
        }
        appender.flush()?;
        Ok(())
    }

    fn insert_fact_rows(&self, rows: &[FactLoanRow], run_id: i64) -> EtlResult<()> {
        for chunk in rows.chunks(self.batch_size) {
            self.warehouse.transaction(|conn| {
                let mut stmt = conn.prepare(
                    "INSERT INTO etl_staging_loan
                     (run_id, loan_id, application_id, borrower_id, date_key, transaction_type,
                      principal_amount, interest_amount, total_amount, amount_usd, interest_rate,
                      term_months, term_category, outstanding_balance, status, currency_code, fx_rate)
                     VALUES (?, ?, ?, ?, ?, ?,
                             CAST(? AS DECIMAL(15,2)), CAST(? AS DECIMAL(15,2)),
                             CAST(? AS DECIMAL(15,2)), CAST(? AS DECIMAL(15,2)),
                             CAST(? AS DECIMAL(8,4)),
                             ?, ?, CAST(? AS DECIMAL(15,2)), ?, ?, CAST(? AS DECIMAL(12,6)))",
                )?;
                for row in chunk {
                    stmt.execute(duckdb::params![
                        run_id,
                        row.loan_id,
                        row.application_id,
                        row.borrower_id,
                        row.date_key,
                        row.transaction_type,
                        row.principal_amount.to_string(),
                        row.interest_amount.to_string(),
                        row.total_amount.to_string(),
                        row.amount_usd.to_string(),
                        row.interest_rate.to_string(),
                        row.term_months,
                        row.term_category.to_string(),
                        row.outstanding_balance.to_string(),
                        row.status,
                        row.currency_code,
                        row.fx_rate.to_string(),
                    ])?;
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Stage the run's fact rows, preferring the appender for large batches
    /// and falling back to batched prepared inserts if it is unavailable.
    fn stage_fact_rows(&self, rows: &[FactLoanRow], run_id: i64) -> EtlResult<&'static str> {
        self.clear_loan_staging(run_id)?;

        if rows.len() >= APPENDER_MIN_ROWS {
            match self.append_fact_rows(rows, run_id) {
                Ok(()) => return Ok("appender"),
                Err(e) => {
                    log::warn!("Appender staging failed ({e}), falling back to batched inserts");
                    self.clear_loan_staging(run_id)?;
                }
            }
        }

        self.insert_fact_rows(rows, run_id)?;
        Ok("insert")
    }

    /// Stage and bulk-load the run's origination facts.
    pub fn load_facts(&self, rows: &[FactLoanRow], run_id: i64) -> EtlResult<LoadResult> {
        let start = Instant::now();
        let load_method = self.stage_fact_rows(rows, run_id)?;

        let outcome =
            procedures::load_fact_transactions(self.warehouse.conn(), run_id, self.batch_size)?;
        let load_secs = start.elapsed().as_secs_f64();
        log::info!(
            "Fact load for run {run_id}: {} loaded, {} rejected in {load_secs:.2}s",
            outcome.rows_loaded,
            outcome.rows_rejected
        );

        let success = outcome.is_success();
        Ok(LoadResult {
            table: "fact_loan_transactions",
            rows_staged: rows.len(),
            rows_inserted: outcome.rows_loaded,
            rows_updated: 0,
            rows_rejected: outcome.rows_rejected,
            load_secs,
            success,
            error: (!success).then(|| outcome.message.clone()),
            error_code: (!success).then(|| outcome.status.clone()),
            load_method,
        })
    }

    /// Stage the portfolio snapshot and replace its date's row.
    pub fn load_portfolio(
        &self,
        snapshot: &PortfolioSnapshot,
        run_id: i64,
        as_of: NaiveDate,
    ) -> EtlResult<LoadResult> {
        let start = Instant::now();

        self.warehouse
            .conn()
            .execute(
                "INSERT INTO etl_staging_portfolio
                 (run_id, date_key, total_users, active_borrowers, active_lenders,
                  total_loans, active_loans, total_principal, total_outstanding, total_repaid,
                  loans_originated_today, amount_originated_today, payments_received_today,
                  loans_defaulted, loans_paid_off, default_rate, delinquency_rate,
                  avg_loan_size, avg_interest_rate, weighted_avg_credit_score)
                 VALUES (?, ?, ?, ?, ?, ?, ?,
                         CAST(? AS DECIMAL(18,2)), CAST(? AS DECIMAL(18,2)), CAST(? AS DECIMAL(18,2)),
                         ?, CAST(? AS DECIMAL(18,2)), CAST(? AS DECIMAL(18,2)), ?, ?,
                         CAST(? AS DECIMAL(8,4)), CAST(? AS DECIMAL(8,4)),
                         CAST(? AS DECIMAL(15,2)), CAST(? AS DECIMAL(8,4)), CAST(? AS DECIMAL(6,1)))",
                duckdb::params![
                    run_id,
                    snapshot.date_key,
                    snapshot.total_users,
                    snapshot.active_borrowers,
                    snapshot.active_lenders,
                    snapshot.total_loans,
                    snapshot.active_loans,
                    snapshot.total_principal.to_string(),
                    snapshot.total_outstanding.to_string(),
                    snapshot.total_repaid.to_string(),
                    snapshot.loans_originated_today,
                    snapshot.amount_originated_today.to_string(),
                    snapshot.payments_received_today.to_string(),
                    snapshot.loans_defaulted,
                    snapshot.loans_paid_off,
                    snapshot.default_rate.to_string(),
                    snapshot.delinquency_rate.to_string(),
                    snapshot.avg_loan_size.to_string(),
                    snapshot.avg_interest_rate.to_string(),
                    snapshot.weighted_avg_credit_score.to_string(),
                ],
            )
            .map_err(|e| Self::load_error("etl_staging_portfolio", e))?;

        let outcome = procedures::refresh_portfolio_snapshot(self.warehouse.conn(), as_of)?;
        let load_secs = start.elapsed().as_secs_f64();
        log::info!(
            "Portfolio snapshot for {as_of}: {} in {load_secs:.2}s",
            outcome.status
        );

        let success = outcome.is_success();
        Ok(LoadResult {
            table: "fact_daily_portfolio",
            rows_staged: 1,
            rows_inserted: outcome.rows_loaded,
            rows_updated: 0,
            rows_rejected: outcome.rows_rejected,
            load_secs,
            success,
            error: (!success).then(|| outcome.message.clone()),
            error_code: (!success).then(|| outcome.status.clone()),
            load_method: "replace",
        })
    }

    /// Catch a table load's error into a failed LoadResult so the remaining
    /// tables still load.
    fn isolated(
        table: &'static str,
        body: impl FnOnce() -> EtlResult<LoadResult>,
    ) -> LoadResult {
        let start = Instant::now();
        body().unwrap_or_else(|e| {
            let message = e.to_string();
            log::error!("Load failed for {table}: {message}");
            LoadResult {
                table,
                rows_staged: 0,
                rows_inserted: 0,
                rows_updated: 0,
                rows_rejected: 0,
                load_secs: start.elapsed().as_secs_f64(),
                success: false,
                error_code: bracketed_code(&message),
                error: Some(message),
                load_method: "none",
            }
        })
    }

    /// Load every target table for the run: dimensions first (facts resolve
    /// keys against them), then facts, then the snapshot.
    pub fn run_load(
        &self,
        bundle: &TransformBundle,
        run_id: i64,
        as_of: NaiveDate,
    ) -> LoadBundle {
        let dim_user = Self::isolated("dim_user", || self.load_dim_users(&bundle.dim_user.rows));
        let dim_loan_product = Self::isolated("dim_loan_product", || {
            self.load_dim_products(&bundle.dim_loan_product.rows)
        });
        let fact_loan_transactions = Self::isolated("fact_loan_transactions", || {
            self.load_facts(&bundle.fact_loan_transactions.rows, run_id)
        });
        let fact_daily_portfolio = Self::isolated("fact_daily_portfolio", || {
            let snapshot = bundle.fact_daily_portfolio.rows.first().ok_or_else(|| {
                Self::load_error("fact_daily_portfolio", "transform produced no snapshot")
            })?;
            self.load_portfolio(snapshot, run_id, as_of)
        });

        let result = LoadBundle {
            dim_user,
            dim_loan_product,
            fact_loan_transactions,
            fact_daily_portfolio,
        };
        log::info!(
            "Load complete: {} rows loaded, {} rejected",
            result.total_loaded(),
            result.total_rejected()
        );
        result
    }
}

#[cfg(test)]
#[path = "load_test.rs"]
mod tests;
