//! Per-run reference and market lookups.
//!
//! A [`RunContext`] is built once from the extract bundle and passed to the
//! transformer; the next run constructs a fresh context, so there is no
//! global cache to invalidate.

use crate::extract::ExtractBundle;
use lm_core::record;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

/// Fallback lists for enum domains with no backing reference table.
const FALLBACK_ROLES: &[&str] = &["borrower", "lender", "admin"];

const FALLBACK_STATUSES: &[&str] = &[
    "pending",
    "approved",
    "rejected",
    "withdrawn",
    "active",
    "paid_off",
    "defaulted",
    "cancelled",
];

const FALLBACK_CURRENCIES: &[&str] = &["USD"];

/// Resolved lookup sets for one run.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Ids of users present in this run's extract, for FK validation.
    pub valid_user_ids: HashSet<i64>,
    /// Latest FX rates: quote currency -> rate quoted against USD.
    pub fx_rates: HashMap<String, Decimal>,
    /// Allowed user roles.
    pub valid_roles: Vec<String>,
    /// Allowed loan statuses.
    pub valid_statuses: Vec<String>,
    /// Allowed currency codes, from ref_currency when populated.
    pub valid_currencies: Vec<String>,
}

impl RunContext {
    /// Build the run's lookups from the extract bundle.
    pub fn from_extract(bundle: &ExtractBundle) -> Self {
        let valid_user_ids = bundle
            .users
            .rows
            .iter()
            .filter_map(|row| record::get_i64(row, "id"))
            .collect();

        let fx_rates = bundle
            .fx_rates
            .rows
            .iter()
            .filter_map(|row| {
                let quote = record::get_str(row, "quote_currency")?.to_string();
                let rate = record::get_decimal(row, "rate")?;
                Some((quote, rate))
            })
            .collect();

        let mut valid_currencies: Vec<String> = bundle
            .currencies
            .rows
            .iter()
            .filter(|row| record::get_bool(row, "is_active").unwrap_or(true))
            .filter_map(|row| record::get_str(row, "currency_code").map(str::to_string))
            .collect();
        if valid_currencies.is_empty() {
            valid_currencies = FALLBACK_CURRENCIES.iter().map(|s| s.to_string()).collect();
        }

        Self {
            valid_user_ids,
            fx_rates,
            valid_roles: FALLBACK_ROLES.iter().map(|s| s.to_string()).collect(),
            valid_statuses: FALLBACK_STATUSES.iter().map(|s| s.to_string()).collect(),
            valid_currencies,
        }
    }

    /// Context with empty lookups and the fallback enum lists, for tests
    /// and validation-only paths.
    pub fn empty() -> Self {
        Self {
            valid_user_ids: HashSet::new(),
            fx_rates: HashMap::new(),
            valid_roles: FALLBACK_ROLES.iter().map(|s| s.to_string()).collect(),
            valid_statuses: FALLBACK_STATUSES.iter().map(|s| s.to_string()).collect(),
            valid_currencies: FALLBACK_CURRENCIES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the valid user-id set (test convenience).
    pub fn with_user_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.valid_user_ids = ids.into_iter().collect();
        self
    }
}
