//! Transform phase: validate extracted rows and reshape them into
//! dimension and fact records.
//!
//! Pure apart from reading the run context: nothing here touches the
//! database, and all validation errors for a row are collected before the
//! row is rejected. Rejected rows are excluded from the output and counted;
//! their errors travel with the result for the orchestrator to persist.

use crate::context::RunContext;
use crate::records::{
    open_ended_expiry, DimProductRow, DimUserRow, FactLoanRow, PortfolioSnapshot,
};
use chrono::NaiveDate;
use lm_core::enrich::{self, date_key_for};
use lm_core::record::{self, Record};
use lm_core::validate::{self, DuplicateTracker, ErrorKind, ValidationError};
use rust_decimal::Decimal;
use std::time::Instant;

/// One target table's transform output.
#[derive(Debug)]
pub struct TransformResult<T> {
    pub table: &'static str,
    pub rows: Vec<T>,
    pub row_count: usize,
    pub rejected_count: usize,
    pub errors: Vec<ValidationError>,
    pub transform_secs: f64,
}

/// Per-table transform outputs for one run.
#[derive(Debug)]
pub struct TransformBundle {
    pub dim_user: TransformResult<DimUserRow>,
    pub dim_loan_product: TransformResult<DimProductRow>,
    pub fact_loan_transactions: TransformResult<FactLoanRow>,
    pub fact_daily_portfolio: TransformResult<PortfolioSnapshot>,
}

/// Summary counters for one transform result (for step logs and reports).
#[derive(Debug, Clone, Copy)]
pub struct TransformSummary {
    pub row_count: usize,
    pub rejected_count: usize,
    pub transform_secs: f64,
}

impl TransformBundle {
    pub fn summaries(&self) -> Vec<(&'static str, TransformSummary)> {
        fn summary<T>(r: &TransformResult<T>) -> TransformSummary {
            TransformSummary {
                row_count: r.row_count,
                rejected_count: r.rejected_count,
                transform_secs: r.transform_secs,
            }
        }
        vec![
            (self.dim_user.table, summary(&self.dim_user)),
            (self.dim_loan_product.table, summary(&self.dim_loan_product)),
            (
                self.fact_loan_transactions.table,
                summary(&self.fact_loan_transactions),
            ),
            (
                self.fact_daily_portfolio.table,
                summary(&self.fact_daily_portfolio),
            ),
        ]
    }

    pub fn total_rows(&self) -> usize {
        self.summaries().iter().map(|(_, s)| s.row_count).sum()
    }

    pub fn total_rejected(&self) -> usize {
        self.summaries().iter().map(|(_, s)| s.rejected_count).sum()
    }

    /// Every validation error across all targets.
    pub fn all_errors(&self) -> impl Iterator<Item = &ValidationError> {
        self.dim_user
            .errors
            .iter()
            .chain(self.dim_loan_product.errors.iter())
            .chain(self.fact_loan_transactions.errors.iter())
            .chain(self.fact_daily_portfolio.errors.iter())
    }
}

/// Transformer over the run's resolved lookups.
pub struct Transformer<'a> {
    ctx: &'a RunContext,
    as_of: NaiveDate,
}

/// Read a non-null field as text, stringifying non-string scalars.
fn string_of(row: &Record, field: &str) -> Option<String> {
    match row.get(field) {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(serde_json::Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    }
}

fn invalid_type(table: &str, row: &Record, field: &str) -> ValidationError {
    ValidationError::new(
        table,
        record::record_id(row),
        field,
        ErrorKind::InvalidType,
        format!("{field} could not be read as its expected type"),
    )
}

impl<'a> Transformer<'a> {
    /// `as_of` is the run's business date: it stamps dimension effective
    /// dates and the portfolio snapshot's date key.
    pub fn new(ctx: &'a RunContext, as_of: NaiveDate) -> Self {
        Self { ctx, as_of }
    }

    /// Validate and reshape user rows into dim_user records.
    pub fn transform_users(&self, users: &[Record]) -> TransformResult<DimUserRow> {
        let start = Instant::now();
        let table = "user";
        let mut transformed = Vec::new();
        let mut errors = Vec::new();
        let mut rejected = 0usize;
        let mut duplicates = DuplicateTracker::new(table, "id");

        for user in users {
            let mut row_errors = validate::validate_not_null(user, &["id", "email", "role"], table);
            if let Some(e) = validate::validate_enum(user, "role", &self.ctx.valid_roles, table) {
                row_errors.push(e);
            }
            if let Some(e) = validate::validate_range(user, "credit_score", 300.0, 850.0, table) {
                row_errors.push(e);
            }
            if let Some(e) = duplicates.check(user) {
                row_errors.push(e);
            }

            if !row_errors.is_empty() {
                errors.append(&mut row_errors);
                rejected += 1;
                continue;
            }

            let (Some(user_id), Some(email), Some(role)) = (
                record::get_i64(user, "id"),
                string_of(user, "email"),
                string_of(user, "role"),
            ) else {
                errors.push(invalid_type(table, user, "id"));
                rejected += 1;
                continue;
            };

            let credit_score = record::get_i64(user, "credit_score");
            transformed.push(DimUserRow {
                user_id,
                email,
                full_name: string_of(user, "full_name"),
                role,
                credit_score,
                credit_tier: enrich::credit_tier(credit_score),
                region_code: None,
                region_name: None,
                is_active: record::get_bool(user, "is_active").unwrap_or(true),
                effective_date: self.as_of,
                expiry_date: open_ended_expiry(),
                is_current: true,
            });
        }

        log::info!("Transformed {} users, rejected {rejected}", transformed.len());
        TransformResult {
            table: "dim_user",
            row_count: transformed.len(),
            rows: transformed,
            rejected_count: rejected,
            errors,
            transform_secs: start.elapsed().as_secs_f64(),
        }
    }

    /// Reshape product reference rows into dim_loan_product records.
    pub fn transform_products(&self, products: &[Record]) -> TransformResult<DimProductRow> {
        let start = Instant::now();
        let table = "ref_loan_product";
        let mut transformed = Vec::new();
        let mut errors = Vec::new();
        let mut rejected = 0usize;

        for product in products {
            // The natural key must exist for the dimension upsert.
            let mut row_errors = validate::validate_not_null(product, &["product_code"], table);
            if !row_errors.is_empty() {
                errors.append(&mut row_errors);
                rejected += 1;
                continue;
            }
            let Some(product_code) = string_of(product, "product_code") else {
                errors.push(invalid_type(table, product, "product_code"));
                rejected += 1;
                continue;
            };

            transformed.push(DimProductRow {
                product_code,
                product_name: string_of(product, "product_name"),
                category: string_of(product, "category"),
                term_category: enrich::term_category(record::get_i64(product, "max_term_months")),
                min_amount: record::get_decimal(product, "min_amount"),
                max_amount: record::get_decimal(product, "max_amount"),
                base_interest_rate: record::get_decimal(product, "base_interest_rate"),
                risk_tier: "standard".to_string(),
                effective_date: self.as_of,
                expiry_date: open_ended_expiry(),
                is_current: true,
            });
        }

        TransformResult {
            table: "dim_loan_product",
            row_count: transformed.len(),
            rows: transformed,
            rejected_count: rejected,
            errors,
            transform_secs: start.elapsed().as_secs_f64(),
        }
    }

    /// Validate and enrich loan rows into origination fact records.
    pub fn transform_loans(&self, loans: &[Record]) -> TransformResult<FactLoanRow> {
        let start = Instant::now();
        let table = "loan";
        let mut transformed = Vec::new();
        let mut errors = Vec::new();
        let mut rejected = 0usize;
        let mut duplicates = DuplicateTracker::new(table, "id");

        for loan in loans {
            let mut row_errors = validate::validate_not_null(
                loan,
                &[
                    "id",
                    "borrower_id",
                    "principal_amount",
                    "interest_rate",
                    "term_months",
                ],
                table,
            );
            if let Some(e) = validate::validate_foreign_key(
                loan,
                "borrower_id",
                &self.ctx.valid_user_ids,
                table,
                "user",
            ) {
                row_errors.push(e);
            }
            if let Some(e) = validate::validate_enum(loan, "status", &self.ctx.valid_statuses, table)
            {
                row_errors.push(e);
            }
            if let Some(e) = validate::validate_range(loan, "interest_rate", 0.0, 100.0, table) {
                row_errors.push(e);
            }
            if let Some(e) =
                validate::validate_range(loan, "principal_amount", 0.01, 100_000_000.0, table)
            {
                row_errors.push(e);
            }
            if let Some(e) = validate::validate_range(loan, "term_months", 1.0, 600.0, table) {
                row_errors.push(e);
            }
            if let Some(e) =
                validate::validate_enum(loan, "currency_code", &self.ctx.valid_currencies, table)
            {
                row_errors.push(e);
            }
            if let Some(e) = duplicates.check(loan) {
                row_errors.push(e);
            }

            if !row_errors.is_empty() {
                errors.append(&mut row_errors);
                rejected += 1;
                continue;
            }

            let (Some(loan_id), Some(borrower_id), Some(principal), Some(rate), Some(term_months)) = (
                record::get_i64(loan, "id"),
                record::get_i64(loan, "borrower_id"),
                record::get_decimal(loan, "principal_amount"),
                record::get_decimal(loan, "interest_rate"),
                record::get_i64(loan, "term_months"),
            ) else {
                errors.push(invalid_type(table, loan, "id"));
                rejected += 1;
                continue;
            };

            let interest = enrich::interest_amount(principal, rate, term_months);
            let currency = string_of(loan, "currency_code").unwrap_or_else(|| "USD".to_string());
            let conversion = enrich::to_usd(principal, Some(&currency), &self.ctx.fx_rates);
            if conversion.rate_missing {
                // Degraded precision, not a rejection: the row loads with
                // the 1.0 fallback rate and the gap is logged.
                errors.push(
                    ValidationError::new(
                        table,
                        record::record_id(loan),
                        "currency_code",
                        ErrorKind::MissingFxRate,
                        format!("no FX rate for {currency}, assuming 1.0"),
                    )
                    .with_value(serde_json::Value::String(currency.clone())),
                );
            }

            transformed.push(FactLoanRow {
                loan_id,
                application_id: record::get_i64(loan, "application_id"),
                borrower_id,
                date_key: enrich::date_key(
                    record::get_str(loan, "created_at").or(record::get_str(loan, "disbursed_at")),
                ),
                transaction_type: "origination".to_string(),
                principal_amount: principal,
                interest_amount: interest,
                total_amount: principal + interest,
                amount_usd: conversion.amount_usd,
                interest_rate: rate,
                term_months,
                term_category: enrich::term_category(Some(term_months)),
                outstanding_balance: record::get_decimal(loan, "outstanding_balance")
                    .unwrap_or(principal),
                status: string_of(loan, "status").unwrap_or_else(|| "active".to_string()),
                currency_code: currency,
                fx_rate: conversion.rate,
            });
        }

        log::info!("Transformed {} loans, rejected {rejected}", transformed.len());
        TransformResult {
            table: "fact_loan_transactions",
            row_count: transformed.len(),
            rows: transformed,
            rejected_count: rejected,
            errors,
            transform_secs: start.elapsed().as_secs_f64(),
        }
    }

    /// Reduce the run's loans and users to one portfolio-wide summary row.
    ///
    /// A plain in-memory reduction: batch sizes are bounded, so there is no
    /// need for a streaming aggregate.
    pub fn calculate_portfolio_snapshot(
        &self,
        loans: &[Record],
        users: &[Record],
    ) -> PortfolioSnapshot {
        let status_of = |row: &Record| string_of(row, "status").unwrap_or_default();

        let total_users = users.len() as i64;
        let active_borrowers = users
            .iter()
            .filter(|u| record::get_str(u, "role") == Some("borrower"))
            .count() as i64;
        let active_lenders = users
            .iter()
            .filter(|u| record::get_str(u, "role") == Some("lender"))
            .count() as i64;

        let total_loans = loans.len() as i64;
        let active_loans = loans.iter().filter(|l| status_of(l) == "active").count() as i64;
        let loans_defaulted = loans.iter().filter(|l| status_of(l) == "defaulted").count() as i64;
        let loans_paid_off = loans.iter().filter(|l| status_of(l) == "paid_off").count() as i64;

        let total_principal: Decimal = loans
            .iter()
            .filter_map(|l| record::get_decimal(l, "principal_amount"))
            .sum();
        let total_outstanding: Decimal = loans
            .iter()
            .filter(|l| status_of(l) == "active")
            .filter_map(|l| record::get_decimal(l, "outstanding_balance"))
            .sum();
        let total_repaid = total_principal - total_outstanding;

        let (default_rate, avg_loan_size) = if total_loans > 0 {
            (
                (Decimal::from(loans_defaulted) / Decimal::from(total_loans)).round_dp(4),
                (total_principal / Decimal::from(total_loans)).round_dp(2),
            )
        } else {
            (Decimal::ZERO, Decimal::ZERO)
        };

        let rates: Vec<Decimal> = loans
            .iter()
            .filter_map(|l| record::get_decimal(l, "interest_rate"))
            .filter(|r| !r.is_zero())
            .collect();
        let avg_interest_rate = if rates.is_empty() {
            Decimal::ZERO
        } else {
            (rates.iter().sum::<Decimal>() / Decimal::from(rates.len() as i64)).round_dp(2)
        };

        let scores: Vec<Decimal> = users
            .iter()
            .filter_map(|u| record::get_i64(u, "credit_score"))
            .filter(|s| *s != 0)
            .map(Decimal::from)
            .collect();
        let weighted_avg_credit_score = if scores.is_empty() {
            Decimal::ZERO
        } else {
            (scores.iter().sum::<Decimal>() / Decimal::from(scores.len() as i64)).round_dp(1)
        };

        PortfolioSnapshot {
            date_key: date_key_for(self.as_of),
            total_users,
            active_borrowers,
            active_lenders,
            total_loans,
            active_loans,
            total_principal,
            total_outstanding,
            total_repaid,
            loans_originated_today: 0,
            amount_originated_today: Decimal::ZERO,
            payments_received_today: Decimal::ZERO,
            loans_defaulted,
            loans_paid_off,
            default_rate,
            delinquency_rate: Decimal::ZERO,
            avg_loan_size,
            avg_interest_rate,
            weighted_avg_credit_score,
        }
    }

    /// Transform the whole extract bundle into the four target-table
    /// results.
    pub fn run_transform(&self, bundle: &crate::extract::ExtractBundle) -> TransformBundle {
        let snapshot_start = Instant::now();

        let dim_user = self.transform_users(&bundle.users.rows);
        let dim_loan_product = self.transform_products(&bundle.products.rows);
        let fact_loan_transactions = self.transform_loans(&bundle.loans.rows);

        let snapshot = self.calculate_portfolio_snapshot(&bundle.loans.rows, &bundle.users.rows);
        let fact_daily_portfolio = TransformResult {
            table: "fact_daily_portfolio",
            rows: vec![snapshot],
            row_count: 1,
            rejected_count: 0,
            errors: Vec::new(),
            transform_secs: snapshot_start.elapsed().as_secs_f64(),
        };

        let result = TransformBundle {
            dim_user,
            dim_loan_product,
            fact_loan_transactions,
            fact_daily_portfolio,
        };
        log::info!(
            "Transform complete: {} rows, {} rejected",
            result.total_rows(),
            result.total_rejected()
        );
        result
    }
}

#[cfg(test)]
#[path = "transform_test.rs"]
mod tests;
