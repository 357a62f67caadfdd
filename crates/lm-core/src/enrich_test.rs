//! Tests for the enrichment business rules.

use super::*;
use rust_decimal::Decimal;
use std::str::FromStr;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

// ── credit tier ────────────────────────────────────────────────────────

#[test]
fn credit_tier_buckets() {
    assert_eq!(credit_tier(Some(800)), CreditTier::Excellent);
    assert_eq!(credit_tier(Some(700)), CreditTier::Good);
    assert_eq!(credit_tier(Some(600)), CreditTier::Fair);
    assert_eq!(credit_tier(Some(400)), CreditTier::Poor);
    assert_eq!(credit_tier(None), CreditTier::NoScore);
}

#[test]
fn credit_tier_boundaries() {
    assert_eq!(credit_tier(Some(750)), CreditTier::Excellent);
    assert_eq!(credit_tier(Some(749)), CreditTier::Good);
    assert_eq!(credit_tier(Some(650)), CreditTier::Good);
    assert_eq!(credit_tier(Some(649)), CreditTier::Fair);
    assert_eq!(credit_tier(Some(550)), CreditTier::Fair);
    assert_eq!(credit_tier(Some(549)), CreditTier::Poor);
}

#[test]
fn credit_tier_display() {
    assert_eq!(credit_tier(Some(800)).to_string(), "Excellent");
    assert_eq!(credit_tier(None).to_string(), "NO_SCORE");
}

// ── term category ──────────────────────────────────────────────────────

#[test]
fn term_category_buckets() {
    assert_eq!(term_category(Some(3)), TermCategory::Short);
    assert_eq!(term_category(Some(6)), TermCategory::Short);
    assert_eq!(term_category(Some(7)), TermCategory::Medium);
    assert_eq!(term_category(Some(24)), TermCategory::Medium);
    assert_eq!(term_category(Some(25)), TermCategory::Long);
    assert_eq!(term_category(None), TermCategory::Unknown);
    assert_eq!(term_category(Some(12)).to_string(), "medium");
}

// ── date key ───────────────────────────────────────────────────────────

#[test]
fn date_key_round_trip() {
    assert_eq!(date_key(Some("2025-10-29")), 20251029);
    assert_eq!(date_key(Some("2025-10-29 14:30:00")), 20251029);
    assert_eq!(date_key(Some("2025-10-29T14:30:00Z")), 20251029);
    assert_eq!(date_key(None), EPOCH_DATE_KEY);
    assert_eq!(date_key(Some("garbage")), EPOCH_DATE_KEY);
}

#[test]
fn date_key_is_pure() {
    let input = Some("2024-02-29");
    assert_eq!(date_key(input), date_key(input));
    assert_eq!(date_key(input), 20240229);
}

// ── interest ───────────────────────────────────────────────────────────

#[test]
fn interest_reference_scenario() {
    // principal=5000, rate=8.5, term=12 -> 5000 * 0.085 * 1 = 425.00
    let interest = interest_amount(dec("5000"), dec("8.5"), 12);
    assert_eq!(interest, dec("425.00"));
    assert_eq!(dec("5000") + interest, dec("5425.00"));
}

#[test]
fn interest_partial_year() {
    // 1200 * 0.10 * 0.5 = 60.00
    assert_eq!(interest_amount(dec("1200"), dec("10"), 6), dec("60.00"));
}

#[test]
fn interest_rounds_to_cents() {
    // 1000 * 0.0333 * (7/12) = 19.425 -> 19.42 (banker's rounding)
    assert_eq!(interest_amount(dec("1000"), dec("3.33"), 7), dec("19.42"));
}

// ── fx conversion ──────────────────────────────────────────────────────

#[test]
fn usd_is_a_no_op() {
    let rates = HashMap::new();
    let conv = to_usd(dec("100.00"), Some("USD"), &rates);
    assert_eq!(conv.amount_usd, dec("100.00"));
    assert_eq!(conv.rate, Decimal::ONE);
    assert!(!conv.rate_missing);
}

#[test]
fn null_currency_treated_as_usd() {
    let conv = to_usd(dec("50"), None, &HashMap::new());
    assert_eq!(conv.amount_usd, dec("50"));
    assert!(!conv.rate_missing);
}

#[test]
fn known_rate_divides() {
    let mut rates = HashMap::new();
    rates.insert("EUR".to_string(), dec("0.8"));
    let conv = to_usd(dec("80"), Some("EUR"), &rates);
    assert_eq!(conv.amount_usd, dec("100.00"));
    assert_eq!(conv.rate, dec("0.8"));
    assert!(!conv.rate_missing);
}

#[test]
fn missing_rate_falls_back_and_flags() {
    let rates = HashMap::new();
    let conv = to_usd(dec("80"), Some("EUR"), &rates);
    assert_eq!(conv.amount_usd, dec("80"));
    assert_eq!(conv.rate, Decimal::ONE);
    assert!(conv.rate_missing);
}

#[test]
fn zero_rate_treated_as_missing() {
    let mut rates = HashMap::new();
    rates.insert("XTS".to_string(), Decimal::ZERO);
    let conv = to_usd(dec("10"), Some("XTS"), &rates);
    assert_eq!(conv.amount_usd, dec("10"));
    assert!(conv.rate_missing);
}
