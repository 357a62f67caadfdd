//! Enrichment business rules.
//!
//! These are fixed rules of the lending business, not configuration: the
//! credit-tier thresholds, term buckets, the epoch date-key sentinel, and the
//! simple-interest formula must reproduce the reporting layer's historical
//! outputs exactly. All functions are pure.

use crate::record::parse_datetime;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

/// Date key for null or unparseable dates, kept for join compatibility with
/// the date dimension.
pub const EPOCH_DATE_KEY: i64 = 19_700_101;

/// Credit-score bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CreditTier {
    Excellent,
    Good,
    Fair,
    Poor,
    NoScore,
}

impl std::fmt::Display for CreditTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CreditTier::Excellent => "Excellent",
            CreditTier::Good => "Good",
            CreditTier::Fair => "Fair",
            CreditTier::Poor => "Poor",
            CreditTier::NoScore => "NO_SCORE",
        };
        write!(f, "{label}")
    }
}

/// Bucket a credit score: >= 750 Excellent, >= 650 Good, >= 550 Fair,
/// else Poor; a missing score is NO_SCORE.
pub fn credit_tier(score: Option<i64>) -> CreditTier {
    match score {
        None => CreditTier::NoScore,
        Some(s) if s >= 750 => CreditTier::Excellent,
        Some(s) if s >= 650 => CreditTier::Good,
        Some(s) if s >= 550 => CreditTier::Fair,
        Some(_) => CreditTier::Poor,
    }
}

/// Loan-term bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TermCategory {
    Short,
    Medium,
    Long,
    Unknown,
}

impl std::fmt::Display for TermCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TermCategory::Short => "short",
            TermCategory::Medium => "medium",
            TermCategory::Long => "long",
            TermCategory::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

/// Bucket a term length: <= 6 months short, <= 24 medium, else long.
pub fn term_category(term_months: Option<i64>) -> TermCategory {
    match term_months {
        None => TermCategory::Unknown,
        Some(t) if t <= 6 => TermCategory::Short,
        Some(t) if t <= 24 => TermCategory::Medium,
        Some(_) => TermCategory::Long,
    }
}

/// Convert a date to its YYYYMMDD integer key.
pub fn date_key_for(date: NaiveDate) -> i64 {
    date.year() as i64 * 10_000 + date.month() as i64 * 100 + date.day() as i64
}

/// Convert a raw timestamp/date string to a date key, falling back to the
/// epoch sentinel on null or unparseable input.
pub fn date_key(raw: Option<&str>) -> i64 {
    raw.and_then(parse_datetime)
        .map(|ts| date_key_for(ts.date()))
        .unwrap_or(EPOCH_DATE_KEY)
}

/// Simple interest over the loan term:
/// `principal * (rate/100) * (term_months/12)`, rounded to 2 decimal places.
pub fn interest_amount(principal: Decimal, annual_rate: Decimal, term_months: i64) -> Decimal {
    let term_years = Decimal::from(term_months) / Decimal::from(12);
    (principal * (annual_rate / Decimal::from(100)) * term_years).round_dp(2)
}

/// Result of a currency conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FxConversion {
    /// Amount expressed in USD, rounded to 2 decimal places
    pub amount_usd: Decimal,
    /// Rate applied (quote units per USD); 1 for USD or when no rate exists
    pub rate: Decimal,
    /// True when a non-USD currency had no rate and fell back to 1.0
    pub rate_missing: bool,
}

/// Convert an amount to USD through the FX-rate map (quote currency -> rate,
/// quoted against USD). Same-currency is a no-op. A missing rate falls back
/// to 1.0 and flags the conversion so the caller can log it; the row itself
/// is still usable.
pub fn to_usd(
    amount: Decimal,
    currency: Option<&str>,
    fx_rates: &HashMap<String, Decimal>,
) -> FxConversion {
    let currency = currency.unwrap_or("USD");
    if currency == "USD" {
        return FxConversion {
            amount_usd: amount,
            rate: Decimal::ONE,
            rate_missing: false,
        };
    }
    match fx_rates.get(currency) {
        Some(rate) if !rate.is_zero() => FxConversion {
            amount_usd: (amount / rate).round_dp(2),
            rate: *rate,
            rate_missing: false,
        },
        _ => FxConversion {
            amount_usd: amount,
            rate: Decimal::ONE,
            rate_missing: true,
        },
    }
}

#[cfg(test)]
#[path = "enrich_test.rs"]
mod tests;
