//! Tests for the row validation rules.

use super::*;
use serde_json::json;

fn row(pairs: &[(&str, Value)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

// ── not-null ───────────────────────────────────────────────────────────

#[test]
fn not_null_flags_missing_and_null_fields() {
    let r = row(&[("id", json!(1)), ("email", Value::Null)]);
    let errors = validate_not_null(&r, &["id", "email", "role"], "user");
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.kind == ErrorKind::NullValue));
    let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, vec!["email", "role"]);
    assert_eq!(errors[0].record_id, "1");
}

#[test]
fn not_null_passes_populated_row() {
    let r = row(&[("id", json!(1)), ("email", json!("a@b.c"))]);
    assert!(validate_not_null(&r, &["id", "email"], "user").is_empty());
}

// ── range ──────────────────────────────────────────────────────────────

#[test]
fn range_flags_out_of_range() {
    let r = row(&[("id", json!(1)), ("credit_score", json!(900))]);
    let err = validate_range(&r, "credit_score", 300.0, 850.0, "user").unwrap();
    assert_eq!(err.kind, ErrorKind::OutOfRange);
    assert_eq!(err.value, Some(json!(900)));
}

#[test]
fn range_coerces_numeric_strings() {
    let r = row(&[("id", json!(1)), ("rate", json!("8.5"))]);
    assert!(validate_range(&r, "rate", 0.0, 100.0, "loan").is_none());

    let r = row(&[("id", json!(1)), ("rate", json!("150"))]);
    let err = validate_range(&r, "rate", 0.0, 100.0, "loan").unwrap();
    assert_eq!(err.kind, ErrorKind::OutOfRange);
}

#[test]
fn range_flags_non_numeric_as_invalid_type() {
    let r = row(&[("id", json!(1)), ("rate", json!("abc"))]);
    let err = validate_range(&r, "rate", 0.0, 100.0, "loan").unwrap();
    assert_eq!(err.kind, ErrorKind::InvalidType);
}

#[test]
fn range_skips_null_values() {
    let r = row(&[("id", json!(1)), ("rate", Value::Null)]);
    assert!(validate_range(&r, "rate", 0.0, 100.0, "loan").is_none());
    let r = row(&[("id", json!(1))]);
    assert!(validate_range(&r, "rate", 0.0, 100.0, "loan").is_none());
}

// ── enum ───────────────────────────────────────────────────────────────

#[test]
fn enum_membership() {
    let allowed = vec!["borrower".to_string(), "lender".to_string()];
    let r = row(&[("id", json!(1)), ("role", json!("borrower"))]);
    assert!(validate_enum(&r, "role", &allowed, "user").is_none());

    let r = row(&[("id", json!(1)), ("role", json!("superuser"))]);
    let err = validate_enum(&r, "role", &allowed, "user").unwrap();
    assert_eq!(err.kind, ErrorKind::InvalidEnum);
    assert_eq!(err.field, "role");
}

#[test]
fn enum_skips_null() {
    let allowed = vec!["active".to_string()];
    let r = row(&[("id", json!(1)), ("status", Value::Null)]);
    assert!(validate_enum(&r, "status", &allowed, "loan").is_none());
}

// ── foreign key ────────────────────────────────────────────────────────

#[test]
fn fk_rejects_unknown_id() {
    let valid: HashSet<i64> = [1, 2, 3].into_iter().collect();
    let r = row(&[("id", json!(10)), ("borrower_id", json!(999))]);
    let err = validate_foreign_key(&r, "borrower_id", &valid, "loan", "user").unwrap();
    assert_eq!(err.kind, ErrorKind::InvalidFk);
    assert_eq!(err.field, "borrower_id");
    assert!(err.message.contains("999"));
}

#[test]
fn fk_accepts_known_id_and_null() {
    let valid: HashSet<i64> = [1, 2, 3].into_iter().collect();
    let r = row(&[("id", json!(10)), ("borrower_id", json!(2))]);
    assert!(validate_foreign_key(&r, "borrower_id", &valid, "loan", "user").is_none());
    let r = row(&[("id", json!(10)), ("borrower_id", Value::Null)]);
    assert!(validate_foreign_key(&r, "borrower_id", &valid, "loan", "user").is_none());
}

// ── duplicates ─────────────────────────────────────────────────────────

#[test]
fn duplicate_scan_flags_second_occurrences() {
    let rows: Vec<Record> = [1, 2, 1, 3, 2]
        .iter()
        .map(|id| row(&[("id", json!(id))]))
        .collect();
    let errors = check_duplicates(&rows, "id", "user");
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.kind == ErrorKind::Duplicate));
    assert_eq!(errors[0].record_id, "1");
    assert_eq!(errors[1].record_id, "2");
}

#[test]
fn duplicate_scan_clean_batch() {
    let rows: Vec<Record> = [1, 2, 3]
        .iter()
        .map(|id| row(&[("id", json!(id))]))
        .collect();
    assert!(check_duplicates(&rows, "id", "user").is_empty());
}

// ── severity mapping ───────────────────────────────────────────────────

#[test]
fn missing_fx_rate_is_warning_level() {
    assert_eq!(ErrorKind::MissingFxRate.severity(), Severity::Warning);
    assert_eq!(ErrorKind::NullValue.severity(), Severity::Error);
    assert_eq!(ErrorKind::InvalidFk.severity(), Severity::Error);
}

#[test]
fn error_kind_display_codes() {
    assert_eq!(ErrorKind::NullValue.to_string(), "NULL_VALUE");
    assert_eq!(ErrorKind::OutOfRange.to_string(), "OUT_OF_RANGE");
    assert_eq!(ErrorKind::InvalidType.to_string(), "INVALID_TYPE");
    assert_eq!(ErrorKind::InvalidEnum.to_string(), "INVALID_ENUM");
    assert_eq!(ErrorKind::InvalidFk.to_string(), "INVALID_FK");
    assert_eq!(ErrorKind::Duplicate.to_string(), "DUPLICATE");
    assert_eq!(ErrorKind::MissingFxRate.to_string(), "MISSING_FX_RATE");
}
