//! Extracted row representation and field accessors.
//!
//! Source rows travel through the pipeline as ordered JSON maps so that the
//! validation rules can inspect loosely-typed values (a numeric field that
//! arrives as text must be flagged, not crash). The accessors here implement
//! the coercion ladder: native type first, then a string parse.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// One extracted source row: column name -> value, in column order.
pub type Record = serde_json::Map<String, Value>;

/// Read a field as i64 (native integer or numeric string).
pub fn get_i64(row: &Record, field: &str) -> Option<i64> {
    match row.get(field) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a field as f64 (native number or numeric string).
pub fn get_f64(row: &Record, field: &str) -> Option<f64> {
    match row.get(field) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a field as a string slice.
pub fn get_str<'a>(row: &'a Record, field: &str) -> Option<&'a str> {
    row.get(field).and_then(Value::as_str)
}

/// Read a field as bool (native bool, or integer 0/1).
pub fn get_bool(row: &Record, field: &str) -> Option<bool> {
    match row.get(field) {
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::Number(n)) => n.as_i64().map(|v| v != 0),
        _ => None,
    }
}

/// Read a field as an exact decimal.
///
/// Numbers go through their literal representation so that `12.34` stays
/// `12.34` rather than picking up binary-float noise.
pub fn get_decimal(row: &Record, field: &str) -> Option<Decimal> {
    match row.get(field) {
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string()).ok(),
        Some(Value::String(s)) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

/// Read a field as a timestamp, accepting the formats the warehouse emits.
pub fn get_datetime(row: &Record, field: &str) -> Option<NaiveDateTime> {
    get_str(row, field).and_then(parse_datetime)
}

/// Parse a timestamp string: ISO-8601 with `T` or space separator, optional
/// fractional seconds, optional trailing `Z`, or a bare date (midnight).
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim().trim_end_matches('Z');
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// The record identifier used in validation errors: the `id` column rendered
/// as text, or `"unknown"` when absent.
pub fn record_id(row: &Record) -> String {
    match row.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "unknown".to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn i64_coerces_from_string() {
        let r = row(&[("a", json!(7)), ("b", json!("42")), ("c", json!("x"))]);
        assert_eq!(get_i64(&r, "a"), Some(7));
        assert_eq!(get_i64(&r, "b"), Some(42));
        assert_eq!(get_i64(&r, "c"), None);
        assert_eq!(get_i64(&r, "missing"), None);
    }

    #[test]
    fn decimal_is_exact() {
        let r = row(&[("amount", json!("5000.00")), ("rate", json!(8.5))]);
        assert_eq!(get_decimal(&r, "amount").unwrap().to_string(), "5000.00");
        assert_eq!(get_decimal(&r, "rate").unwrap().to_string(), "8.5");
    }

    #[test]
    fn bool_accepts_integers() {
        let r = row(&[("t", json!(true)), ("one", json!(1)), ("zero", json!(0))]);
        assert_eq!(get_bool(&r, "t"), Some(true));
        assert_eq!(get_bool(&r, "one"), Some(true));
        assert_eq!(get_bool(&r, "zero"), Some(false));
    }

    #[test]
    fn datetime_formats() {
        assert!(parse_datetime("2025-10-29 14:30:00").is_some());
        assert!(parse_datetime("2025-10-29T14:30:00.123456").is_some());
        assert!(parse_datetime("2025-10-29T14:30:00Z").is_some());
        assert_eq!(
            parse_datetime("2025-10-29").unwrap().to_string(),
            "2025-10-29 00:00:00"
        );
        assert!(parse_datetime("not a date").is_none());
    }

    #[test]
    fn record_id_falls_back_to_unknown() {
        assert_eq!(record_id(&row(&[("id", json!(9))])), "9");
        assert_eq!(record_id(&row(&[("id", json!("u-1"))])), "u-1");
        assert_eq!(record_id(&row(&[("id", Value::Null)])), "unknown");
        assert_eq!(record_id(&row(&[])), "unknown");
    }
}
