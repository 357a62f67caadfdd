//! Row-level validation rules.
//!
//! Validation errors are data, not control flow: every rule returns errors
//! instead of raising, callers collect all errors for a row before deciding
//! to reject it, and rejected rows never abort a batch.

use crate::record::{self, Record};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

/// Classification of a validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NullValue,
    OutOfRange,
    InvalidType,
    InvalidEnum,
    InvalidFk,
    Duplicate,
    MissingFxRate,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            ErrorKind::NullValue => "NULL_VALUE",
            ErrorKind::OutOfRange => "OUT_OF_RANGE",
            ErrorKind::InvalidType => "INVALID_TYPE",
            ErrorKind::InvalidEnum => "INVALID_ENUM",
            ErrorKind::InvalidFk => "INVALID_FK",
            ErrorKind::Duplicate => "DUPLICATE",
            ErrorKind::MissingFxRate => "MISSING_FX_RATE",
        };
        write!(f, "{code}")
    }
}

/// Severity attached to persisted error-log rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        };
        write!(f, "{label}")
    }
}

impl ErrorKind {
    /// A missing FX rate degrades precision but does not reject the row,
    /// so it logs at warning level; every other kind is an error.
    pub fn severity(&self) -> Severity {
        match self {
            ErrorKind::MissingFxRate => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// One validation failure for one field of one row
#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    pub table: String,
    pub record_id: String,
    pub field: String,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ValidationError {
    pub fn new(
        table: &str,
        record_id: impl Into<String>,
        field: &str,
        kind: ErrorKind,
        message: String,
    ) -> Self {
        Self {
            table: table.to_string(),
            record_id: record_id.into(),
            field: field.to_string(),
            kind,
            message,
            value: None,
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

/// Check that every field in `fields` is present and non-null.
pub fn validate_not_null(row: &Record, fields: &[&str], table: &str) -> Vec<ValidationError> {
    let record_id = record::record_id(row);
    fields
        .iter()
        .filter(|field| matches!(row.get(**field), None | Some(Value::Null)))
        .map(|field| {
            ValidationError::new(
                table,
                record_id.clone(),
                field,
                ErrorKind::NullValue,
                format!("Required field {field} is null"),
            )
        })
        .collect()
}

/// Coerce a JSON value to a number the way the validation rules see it:
/// numbers pass through, numeric strings parse, booleans count as 0/1.
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Check that a numeric field lies within `[min, max]`.
///
/// A null field passes (nullability is `validate_not_null`'s concern). A
/// non-coercible value is INVALID_TYPE; a coercible value outside the range
/// is OUT_OF_RANGE.
pub fn validate_range(
    row: &Record,
    field: &str,
    min: f64,
    max: f64,
    table: &str,
) -> Option<ValidationError> {
    let value = row.get(field)?;
    if value.is_null() {
        return None;
    }
    let record_id = record::record_id(row);
    match coerce_number(value) {
        Some(n) if n < min || n > max => Some(
            ValidationError::new(
                table,
                record_id,
                field,
                ErrorKind::OutOfRange,
                format!("{field} value {n} outside range [{min}, {max}]"),
            )
            .with_value(value.clone()),
        ),
        Some(_) => None,
        None => Some(
            ValidationError::new(
                table,
                record_id,
                field,
                ErrorKind::InvalidType,
                format!("{field} is not a valid number"),
            )
            .with_value(value.clone()),
        ),
    }
}

/// Check that a string field is one of the allowed values. Null passes.
pub fn validate_enum(
    row: &Record,
    field: &str,
    allowed: &[String],
    table: &str,
) -> Option<ValidationError> {
    let value = row.get(field)?;
    if value.is_null() {
        return None;
    }
    let matches_allowed = value
        .as_str()
        .map(|s| allowed.iter().any(|a| a == s))
        .unwrap_or(false);
    if matches_allowed {
        None
    } else {
        Some(
            ValidationError::new(
                table,
                record::record_id(row),
                field,
                ErrorKind::InvalidEnum,
                format!("{field} value '{value}' not in {allowed:?}"),
            )
            .with_value(value.clone()),
        )
    }
}

/// Check that an id field references a known row. Null passes.
pub fn validate_foreign_key(
    row: &Record,
    field: &str,
    valid_ids: &HashSet<i64>,
    table: &str,
    ref_table: &str,
) -> Option<ValidationError> {
    let value = row.get(field)?;
    if value.is_null() {
        return None;
    }
    let found = record::get_i64(row, field)
        .map(|id| valid_ids.contains(&id))
        .unwrap_or(false);
    if found {
        None
    } else {
        Some(
            ValidationError::new(
                table,
                record::record_id(row),
                field,
                ErrorKind::InvalidFk,
                format!("{field} value {value} not found in {ref_table}"),
            )
            .with_value(value.clone()),
        )
    }
}

/// Tracks key values across a batch; the first occurrence of each key wins
/// and every later occurrence is flagged DUPLICATE.
pub struct DuplicateTracker {
    table: String,
    key_field: String,
    seen: HashSet<String>,
}

impl DuplicateTracker {
    pub fn new(table: &str, key_field: &str) -> Self {
        Self {
            table: table.to_string(),
            key_field: key_field.to_string(),
            seen: HashSet::new(),
        }
    }

    /// Record this row's key; returns an error if the key was already seen.
    pub fn check(&mut self, row: &Record) -> Option<ValidationError> {
        let key = match row.get(&self.key_field) {
            Some(Value::String(s)) => s.clone(),
            Some(v) => v.to_string(),
            None => "null".to_string(),
        };
        if self.seen.insert(key.clone()) {
            None
        } else {
            Some(ValidationError::new(
                &self.table,
                key.clone(),
                &self.key_field,
                ErrorKind::Duplicate,
                format!("Duplicate {}: {key}", self.key_field),
            ))
        }
    }
}

/// Scan a batch for duplicate key values.
pub fn check_duplicates(rows: &[Record], key_field: &str, table: &str) -> Vec<ValidationError> {
    let mut tracker = DuplicateTracker::new(table, key_field);
    rows.iter().filter_map(|row| tracker.check(row)).collect()
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
