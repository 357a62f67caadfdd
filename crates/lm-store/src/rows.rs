//! Shared helpers for reading DuckDB rows into pipeline records.
//!
//! Extraction works over arbitrary column lists, so rows are materialized as
//! JSON maps keyed by column name. Values are converted by DuckDB type:
//! timestamps and dates render as ISO strings, decimals as strings (to keep
//! their scale out of binary floats), integers and doubles as JSON numbers.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, NaiveDate};
use duckdb::types::{TimeUnit, ValueRef};
use duckdb::Connection;
use lm_core::Record;
use serde_json::Value;

/// Days from 0001-01-01 (CE) to the 1970-01-01 epoch.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn timestamp_to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value * 1_000_000,
        TimeUnit::Millisecond => value * 1_000,
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

/// Convert a single DuckDB value into its JSON representation.
pub fn value_ref_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(v) => Value::from(v),
        ValueRef::SmallInt(v) => Value::from(v),
        ValueRef::Int(v) => Value::from(v),
        ValueRef::BigInt(v) => Value::from(v),
        ValueRef::HugeInt(v) => Value::String(v.to_string()),
        ValueRef::UTinyInt(v) => Value::from(v),
        ValueRef::USmallInt(v) => Value::from(v),
        ValueRef::UInt(v) => Value::from(v),
        ValueRef::UBigInt(v) => Value::from(v),
        ValueRef::Float(v) => serde_json::Number::from_f64(v as f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Double(v) => serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Decimal(d) => Value::String(d.to_string()),
        ValueRef::Timestamp(unit, v) => {
            match DateTime::from_timestamp_micros(timestamp_to_micros(unit, v)) {
                Some(ts) => Value::String(
                    ts.naive_utc()
                        .format("%Y-%m-%d %H:%M:%S%.6f")
                        .to_string(),
                ),
                None => Value::Null,
            }
        }
        ValueRef::Date32(days) => {
            match NaiveDate::from_num_days_from_ce_opt(EPOCH_DAYS_FROM_CE + days) {
                Some(date) => Value::String(date.format("%Y-%m-%d").to_string()),
                None => Value::Null,
            }
        }
        ValueRef::Time64(unit, v) => {
            let micros = timestamp_to_micros(unit, v);
            let secs = micros / 1_000_000;
            Value::String(format!(
                "{:02}:{:02}:{:02}",
                secs / 3600,
                (secs % 3600) / 60,
                secs % 60
            ))
        }
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        _ => Value::Null,
    }
}

/// Run a query and collect every row as a [`Record`] keyed by column name.
pub fn query_records<P: duckdb::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> StoreResult<Vec<Record>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| StoreError::QueryError(format!("prepare failed: {e}")))?;

    let records: Vec<Record> = stmt
        .query_map(params, |row| {
            let stmt_ref = row.as_ref();
            let column_count = stmt_ref.column_count();
            let mut record = Record::new();
            for idx in 0..column_count {
                let name = stmt_ref
                    .column_name(idx)
                    .map_or_else(|_| format!("col{idx}"), |v| v.to_string());
                record.insert(name, value_ref_to_json(row.get_ref(idx)?));
            }
            Ok(record)
        })
        .map_err(|e| StoreError::QueryError(format!("query failed: {e}")))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| StoreError::QueryError(format!("row error: {e}")))?;

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Warehouse;
    use serde_json::json;

    #[test]
    fn collects_typed_columns_as_json() {
        let wh = Warehouse::open_memory().unwrap();
        let rows = query_records(
            wh.conn(),
            "SELECT 42::BIGINT AS id,
                    'alice' AS name,
                    1.5::DOUBLE AS ratio,
                    12.34::DECIMAL(10,2) AS amount,
                    TIMESTAMP '2025-10-29 14:30:00' AS ts,
                    DATE '2025-10-29' AS day,
                    true AS flag,
                    NULL AS nothing",
            [],
        )
        .unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.get("id"), Some(&json!(42)));
        assert_eq!(row.get("name"), Some(&json!("alice")));
        assert_eq!(row.get("ratio"), Some(&json!(1.5)));
        assert_eq!(row.get("amount"), Some(&json!("12.34")));
        assert!(row
            .get("ts")
            .and_then(Value::as_str)
            .unwrap()
            .starts_with("2025-10-29 14:30:00"));
        assert_eq!(row.get("day"), Some(&json!("2025-10-29")));
        assert_eq!(row.get("flag"), Some(&json!(true)));
        assert_eq!(row.get("nothing"), Some(&Value::Null));
    }

    #[test]
    fn preserves_column_order() {
        let wh = Warehouse::open_memory().unwrap();
        let rows = query_records(wh.conn(), "SELECT 1 AS b, 2 AS a, 3 AS c", []).unwrap();
        let keys: Vec<_> = rows[0].keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn binds_parameters() {
        let wh = Warehouse::open_memory().unwrap();
        let rows = query_records(
            wh.conn(),
            "SELECT ?::BIGINT AS doubled",
            duckdb::params![21i64],
        )
        .unwrap();
        assert_eq!(rows[0].get("doubled"), Some(&json!(21)));
    }
}
