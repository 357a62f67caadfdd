//! Extract phase: pull rows from the operational, reference, and market
//! source tables.
//!
//! Operational tables support full and watermark-driven incremental
//! extraction; reference tables are always extracted in full; market tables
//! yield their latest snapshot (rows at the table's maximum date). Watermarks
//! advance only after the extract pass completes, and only forward — a crash
//! before the advance re-extracts the window on the next run, which the
//! idempotent loads absorb.

use crate::error::{EtlError, EtlResult};
use chrono::{NaiveDate, NaiveDateTime};
use lm_core::record::parse_datetime;
use lm_core::{Record, RunMode};
use lm_store::{rows, watermark, Warehouse};
use std::time::Instant;

const USER_COLUMNS: &str = "id, email, full_name, role, credit_score, is_active, created_at, updated_at";

const LOAN_COLUMNS: &str = "id, application_id, borrower_id, lender_id, principal_amount, \
     interest_rate, term_months, monthly_payment, outstanding_balance, \
     status, currency_code, disbursed_at, maturity_date, created_at, updated_at";

const APPLICATION_COLUMNS: &str =
    "id, applicant_id, amount, purpose, term_months, interest_rate, status, reviewed_by, \
     created_at, updated_at";

const TRANSACTION_COLUMNS: &str =
    "id, wallet_id, loan_id, transaction_type, amount, balance_before, balance_after, \
     description, reference_number, created_at";

const REPAYMENT_COLUMNS: &str =
    "id, loan_id, installment_number, due_date, principal_amount, interest_amount, \
     total_amount, paid_amount, status, paid_at, created_at";

/// Operational tables with their incremental timestamp column.
const OPERATIONAL_TABLES: &[(&str, &str)] = &[
    ("user", "updated_at"),
    ("loan", "updated_at"),
    ("loan_application", "updated_at"),
    ("transaction_ledger", "created_at"),
    ("repayment_schedule", "created_at"),
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

fn epoch() -> NaiveDateTime {
    NaiveDateTime::UNIX_EPOCH
}

/// Logical source system a table belongs to, derived from its name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSystem {
    Transaction,
    Reference,
    Market,
}

impl SourceSystem {
    /// `ref_*` -> reference, `market_*` -> market, everything else is the
    /// transactional database.
    pub fn for_table(table: &str) -> Self {
        if table.starts_with("ref_") {
            SourceSystem::Reference
        } else if table.starts_with("market_") {
            SourceSystem::Market
        } else {
            SourceSystem::Transaction
        }
    }
}

impl std::fmt::Display for SourceSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceSystem::Transaction => write!(f, "transaction_db"),
            SourceSystem::Reference => write!(f, "reference_db"),
            SourceSystem::Market => write!(f, "market_db"),
        }
    }
}

/// One table's extraction output. Immutable once produced; consumed once by
/// the transform phase.
#[derive(Debug)]
pub struct ExtractResult {
    pub source: SourceSystem,
    pub table: String,
    pub rows: Vec<Record>,
    pub row_count: usize,
    pub extract_secs: f64,
    /// Candidate new watermark; set only when at least one row was
    /// extracted. Callers must not advance the watermark on an empty
    /// extract.
    pub watermark: Option<NaiveDateTime>,
}

/// Every table's extraction output for one run.
#[derive(Debug)]
pub struct ExtractBundle {
    pub users: ExtractResult,
    pub loans: ExtractResult,
    pub applications: ExtractResult,
    pub transactions: ExtractResult,
    pub repayments: ExtractResult,
    pub currencies: ExtractResult,
    pub products: ExtractResult,
    pub regions: ExtractResult,
    pub credit_tiers: ExtractResult,
    pub fx_rates: ExtractResult,
    pub benchmarks: ExtractResult,
    pub spreads: ExtractResult,
}

impl ExtractBundle {
    /// All results with their logical names, in extraction order.
    pub fn results(&self) -> Vec<(&'static str, &ExtractResult)> {
        vec![
            ("users", &self.users),
            ("loans", &self.loans),
            ("applications", &self.applications),
            ("transactions", &self.transactions),
            ("repayments", &self.repayments),
            ("currencies", &self.currencies),
            ("products", &self.products),
            ("regions", &self.regions),
            ("credit_tiers", &self.credit_tiers),
            ("fx_rates", &self.fx_rates),
            ("benchmarks", &self.benchmarks),
            ("spreads", &self.spreads),
        ]
    }

    pub fn total_rows(&self) -> usize {
        self.results().iter().map(|(_, r)| r.row_count).sum()
    }
}

/// Extractor over a borrowed warehouse handle.
pub struct Extractor<'a> {
    warehouse: &'a Warehouse,
    batch_size: usize,
    as_of: Option<NaiveDate>,
}

impl<'a> Extractor<'a> {
    pub fn new(warehouse: &'a Warehouse, batch_size: usize) -> Self {
        Self {
            warehouse,
            batch_size,
            as_of: None,
        }
    }

    /// Bound the FX-rate snapshot to rates effective at or before `as_of`.
    pub fn with_as_of(mut self, as_of: Option<NaiveDate>) -> Self {
        self.as_of = as_of;
        self
    }

    fn extract_error(table: &str, message: impl std::fmt::Display) -> EtlError {
        EtlError::Extract {
            table: table.to_string(),
            message: message.to_string(),
        }
    }

    fn fetch<P: duckdb::Params>(&self, table: &str, sql: &str, params: P) -> EtlResult<Vec<Record>> {
        let rows = rows::query_records(self.warehouse.conn(), sql, params)
            .map_err(|e| Self::extract_error(table, e))?;
        let batches = rows.len().div_ceil(self.batch_size);
        log::debug!("{table}: fetched {} rows in {batches} batches", rows.len());
        Ok(rows)
    }

    /// Current maximum value of `ts_column` in `table`, if any rows exist.
    fn observed_max(&self, table: &str, ts_column: &str) -> EtlResult<Option<NaiveDateTime>> {
        let raw: Option<String> = self
            .warehouse
            .conn()
            .query_row(
                &format!("SELECT CAST(MAX({ts_column}) AS VARCHAR) FROM \"{table}\""),
                [],
                |row| row.get(0),
            )
            .map_err(|e| Self::extract_error(table, e))?;
        Ok(raw.as_deref().and_then(parse_datetime))
    }

    /// Extract every row of `table`.
    pub fn extract_full(&self, table: &str, columns: &str) -> EtlResult<ExtractResult> {
        let start = Instant::now();
        let sql = format!("SELECT {columns} FROM \"{table}\"");
        let rows = self.fetch(table, &sql, [])?;
        let extract_secs = start.elapsed().as_secs_f64();
        let source = SourceSystem::for_table(table);
        log::info!(
            "Full extract from {source}.{table}: {} rows in {extract_secs:.2}s",
            rows.len()
        );
        Ok(ExtractResult {
            source,
            table: table.to_string(),
            row_count: rows.len(),
            rows,
            extract_secs,
            watermark: None,
        })
    }

    /// Extract rows of `table` newer than `watermark`, ordered by the
    /// timestamp column, and compute the candidate new watermark.
    pub fn extract_incremental(
        &self,
        table: &str,
        ts_column: &str,
        watermark: NaiveDateTime,
        columns: &str,
    ) -> EtlResult<ExtractResult> {
        let start = Instant::now();
        let sql = format!(
            "SELECT {columns} FROM \"{table}\" \
             WHERE {ts_column} > CAST(? AS TIMESTAMP) \
             ORDER BY {ts_column}"
        );
        let wm = watermark.format(TIMESTAMP_FORMAT).to_string();
        let rows = self.fetch(table, &sql, duckdb::params![wm])?;

        let new_watermark = if rows.is_empty() {
            None
        } else {
            self.observed_max(table, ts_column)?
        };

        let extract_secs = start.elapsed().as_secs_f64();
        let source = SourceSystem::for_table(table);
        log::info!(
            "Incremental extract from {source}.{table}: {} rows in {extract_secs:.2}s",
            rows.len()
        );
        Ok(ExtractResult {
            source,
            table: table.to_string(),
            row_count: rows.len(),
            rows,
            extract_secs,
            watermark: new_watermark,
        })
    }

    fn extract_operational(
        &self,
        table: &str,
        ts_column: &str,
        columns: &str,
        mode: RunMode,
        watermark: Option<NaiveDateTime>,
    ) -> EtlResult<ExtractResult> {
        match (mode, watermark) {
            (RunMode::Incremental, Some(wm)) => {
                self.extract_incremental(table, ts_column, wm, columns)
            }
            _ => self.extract_full(table, columns),
        }
    }

    pub fn extract_users(
        &self,
        mode: RunMode,
        watermark: Option<NaiveDateTime>,
    ) -> EtlResult<ExtractResult> {
        self.extract_operational("user", "updated_at", USER_COLUMNS, mode, watermark)
    }

    pub fn extract_loans(
        &self,
        mode: RunMode,
        watermark: Option<NaiveDateTime>,
    ) -> EtlResult<ExtractResult> {
        self.extract_operational("loan", "updated_at", LOAN_COLUMNS, mode, watermark)
    }

    pub fn extract_applications(
        &self,
        mode: RunMode,
        watermark: Option<NaiveDateTime>,
    ) -> EtlResult<ExtractResult> {
        self.extract_operational(
            "loan_application",
            "updated_at",
            APPLICATION_COLUMNS,
            mode,
            watermark,
        )
    }

    pub fn extract_transactions(
        &self,
        mode: RunMode,
        watermark: Option<NaiveDateTime>,
    ) -> EtlResult<ExtractResult> {
        self.extract_operational(
            "transaction_ledger",
            "created_at",
            TRANSACTION_COLUMNS,
            mode,
            watermark,
        )
    }

    pub fn extract_repayments(
        &self,
        mode: RunMode,
        watermark: Option<NaiveDateTime>,
    ) -> EtlResult<ExtractResult> {
        self.extract_operational(
            "repayment_schedule",
            "created_at",
            REPAYMENT_COLUMNS,
            mode,
            watermark,
        )
    }

    /// Latest-snapshot extraction: rows whose date column equals the table's
    /// maximum date.
    fn extract_latest(&self, table: &str, date_column: &str) -> EtlResult<ExtractResult> {
        let start = Instant::now();
        let sql = format!(
            "SELECT * FROM {table} \
             WHERE {date_column} = (SELECT MAX({date_column}) FROM {table})"
        );
        let rows = self.fetch(table, &sql, [])?;
        let extract_secs = start.elapsed().as_secs_f64();
        Ok(ExtractResult {
            source: SourceSystem::for_table(table),
            table: table.to_string(),
            row_count: rows.len(),
            rows,
            extract_secs,
            watermark: None,
        })
    }

    /// FX rates at the latest rate date, optionally bounded by the as-of
    /// date so historical reruns see the rates of their day.
    pub fn extract_market_fx_rates(&self) -> EtlResult<ExtractResult> {
        let Some(as_of) = self.as_of else {
            return self.extract_latest("market_fx_rates", "rate_date");
        };
        let start = Instant::now();
        let sql = "SELECT * FROM market_fx_rates \
                   WHERE rate_date = (SELECT MAX(rate_date) FROM market_fx_rates \
                                      WHERE rate_date <= CAST(? AS DATE))";
        let rows = self.fetch(
            "market_fx_rates",
            sql,
            duckdb::params![as_of.format("%Y-%m-%d").to_string()],
        )?;
        let extract_secs = start.elapsed().as_secs_f64();
        Ok(ExtractResult {
            source: SourceSystem::Market,
            table: "market_fx_rates".to_string(),
            row_count: rows.len(),
            rows,
            extract_secs,
            watermark: None,
        })
    }

    pub fn extract_market_benchmarks(&self) -> EtlResult<ExtractResult> {
        self.extract_latest("market_interest_benchmarks", "effective_date")
    }

    pub fn extract_market_spreads(&self) -> EtlResult<ExtractResult> {
        self.extract_latest("market_credit_spreads", "effective_date")
    }

    /// Extract the full table set for one run and advance watermarks.
    ///
    /// Incremental mode reads the stored watermark per operational table and
    /// re-extracts everything newer. Full mode extracts everything, then
    /// still advances the watermarks to the freshly observed max timestamps
    /// so a following incremental run does not re-extract loaded data.
    pub fn run_extract(&self, mode: RunMode, run_id: i64) -> EtlResult<ExtractBundle> {
        let conn = self.warehouse.conn();
        let source = SourceSystem::Transaction.to_string();

        let mut pending_watermarks: Vec<(&str, NaiveDateTime)> = Vec::new();

        let (users, loans, applications, transactions, repayments) = match mode {
            RunMode::Incremental => {
                let mut stored = Vec::with_capacity(OPERATIONAL_TABLES.len());
                for &(table, _) in OPERATIONAL_TABLES {
                    let wm = watermark::get_watermark(conn, &source, table)?.unwrap_or_else(epoch);
                    stored.push(wm);
                }

                let users = self.extract_users(mode, Some(stored[0]))?;
                let loans = self.extract_loans(mode, Some(stored[1]))?;
                let applications = self.extract_applications(mode, Some(stored[2]))?;
                let transactions = self.extract_transactions(mode, Some(stored[3]))?;
                let repayments = self.extract_repayments(mode, Some(stored[4]))?;

                if let Some(wm) = users.watermark {
                    pending_watermarks.push(("user", wm));
                }
                if let Some(wm) = loans.watermark {
                    pending_watermarks.push(("loan", wm));
                }
                if let Some(wm) = applications.watermark {
                    pending_watermarks.push(("loan_application", wm));
                }
                if let Some(wm) = transactions.watermark {
                    pending_watermarks.push(("transaction_ledger", wm));
                }
                if let Some(wm) = repayments.watermark {
                    pending_watermarks.push(("repayment_schedule", wm));
                }
                (users, loans, applications, transactions, repayments)
            }
            RunMode::Full => {
                let users = self.extract_users(mode, None)?;
                let loans = self.extract_loans(mode, None)?;
                let applications = self.extract_applications(mode, None)?;
                let transactions = self.extract_transactions(mode, None)?;
                let repayments = self.extract_repayments(mode, None)?;

                for &(table, ts_column) in OPERATIONAL_TABLES {
                    if let Some(max_ts) = self.observed_max(table, ts_column)? {
                        pending_watermarks.push((table, max_ts));
                    }
                }
                (users, loans, applications, transactions, repayments)
            }
        };

        let bundle = ExtractBundle {
            users,
            loans,
            applications,
            transactions,
            repayments,
            currencies: self.extract_full("ref_currency", "*")?,
            products: self.extract_full("ref_loan_product", "*")?,
            regions: self.extract_full("ref_region", "*")?,
            credit_tiers: self.extract_full("ref_credit_tier", "*")?,
            fx_rates: self.extract_market_fx_rates()?,
            benchmarks: self.extract_market_benchmarks()?,
            spreads: self.extract_market_spreads()?,
        };

        // Extraction is committed (read-only); only now do the watermarks
        // move. A crash in between re-extracts this window next run.
        for (table, wm) in pending_watermarks {
            match watermark::advance_watermark(conn, &source, table, wm, run_id) {
                Ok(true) => log::info!("Updated watermark for {source}.{table} to {wm}"),
                Ok(false) => {}
                Err(e) => log::warn!("Could not update watermark for {source}.{table}: {e}"),
            }
        }

        log::info!(
            "Extract complete: {} total rows from {} sources",
            bundle.total_rows(),
            bundle.results().len()
        );
        Ok(bundle)
    }
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
