//! Typed rows produced by the transform phase and consumed by the loader.

use chrono::NaiveDate;
use lm_core::{CreditTier, TermCategory};
use rust_decimal::Decimal;
use serde::Serialize;

/// Expiry date marking a dimension row as open-ended.
pub fn open_ended_expiry() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).expect("static date")
}

/// One dim_user row (current-state dimension).
#[derive(Debug, Clone, Serialize)]
pub struct DimUserRow {
    pub user_id: i64,
    pub email: String,
    pub full_name: Option<String>,
    pub role: String,
    pub credit_score: Option<i64>,
    pub credit_tier: CreditTier,
    pub region_code: Option<String>,
    pub region_name: Option<String>,
    pub is_active: bool,
    pub effective_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub is_current: bool,
}

/// One dim_loan_product row.
#[derive(Debug, Clone, Serialize)]
pub struct DimProductRow {
    pub product_code: String,
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub term_category: TermCategory,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub base_interest_rate: Option<Decimal>,
    pub risk_tier: String,
    pub effective_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub is_current: bool,
}

/// One loan-origination fact row. Money and rate fields carry both the
/// original currency and the USD-converted amount.
#[derive(Debug, Clone, Serialize)]
pub struct FactLoanRow {
    pub loan_id: i64,
    pub application_id: Option<i64>,
    pub borrower_id: i64,
    pub date_key: i64,
    pub transaction_type: String,
    pub principal_amount: Decimal,
    pub interest_amount: Decimal,
    pub total_amount: Decimal,
    pub amount_usd: Decimal,
    pub interest_rate: Decimal,
    pub term_months: i64,
    pub term_category: TermCategory,
    pub outstanding_balance: Decimal,
    pub status: String,
    pub currency_code: String,
    pub fx_rate: Decimal,
}

/// The portfolio-wide daily aggregate; exactly one per date key.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSnapshot {
    pub date_key: i64,
    pub total_users: i64,
    pub active_borrowers: i64,
    pub active_lenders: i64,
    pub total_loans: i64,
    pub active_loans: i64,
    pub total_principal: Decimal,
    pub total_outstanding: Decimal,
    pub total_repaid: Decimal,
    pub loans_originated_today: i64,
    pub amount_originated_today: Decimal,
    pub payments_received_today: Decimal,
    pub loans_defaulted: i64,
    pub loans_paid_off: i64,
    pub default_rate: Decimal,
    pub delinquency_rate: Decimal,
    pub avg_loan_size: Decimal,
    pub avg_interest_rate: Decimal,
    pub weighted_avg_credit_score: Decimal,
}
