//! Incremental-extract watermark store.
//!
//! One row per (source, table), seeded by the schema migration. Watermarks
//! only move forward: the advance is a conditional UPDATE guarded on the
//! stored value being older, so a replayed or concurrent run can never
//! rewind a watermark.

use crate::error::{StoreError, StoreResult};
use chrono::NaiveDateTime;
use duckdb::Connection;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

fn format_ts(value: NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Read the stored watermark for a (source, table) pair.
pub fn get_watermark(
    conn: &Connection,
    source: &str,
    table: &str,
) -> StoreResult<Option<NaiveDateTime>> {
    let result = conn.query_row(
        "SELECT CAST(watermark_value AS VARCHAR) FROM etl_watermarks
         WHERE source_name = ? AND table_name = ?",
        duckdb::params![source, table],
        |row| row.get::<_, String>(0),
    );
    match result {
        Ok(raw) => {
            let parsed = lm_core::record::parse_datetime(&raw).ok_or_else(|| {
                StoreError::QueryError(format!("unparseable watermark '{raw}' for {source}.{table}"))
            })?;
            Ok(Some(parsed))
        }
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StoreError::QueryError(format!(
            "watermark lookup failed for {source}.{table}: {e}"
        ))),
    }
}

/// Advance a watermark, monotonically.
///
/// Returns `true` when the stored value moved. A `value` at or below the
/// stored watermark leaves the row untouched.
pub fn advance_watermark(
    conn: &Connection,
    source: &str,
    table: &str,
    value: NaiveDateTime,
    run_id: i64,
) -> StoreResult<bool> {
    let ts = format_ts(value);
    let changed = conn
        .execute(
            "UPDATE etl_watermarks
             SET watermark_value = CAST(? AS TIMESTAMP), last_run_id = ?, updated_at = now()
             WHERE source_name = ? AND table_name = ?
               AND watermark_value < CAST(? AS TIMESTAMP)",
            duckdb::params![ts, run_id, source, table, ts],
        )
        .map_err(|e| {
            StoreError::QueryError(format!("watermark update failed for {source}.{table}: {e}"))
        })?;
    Ok(changed > 0)
}

/// List all watermark rows (for the CLI status view).
pub fn list_watermarks(conn: &Connection) -> StoreResult<Vec<WatermarkRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT source_name, table_name, CAST(watermark_value AS VARCHAR), last_run_id
             FROM etl_watermarks ORDER BY source_name, table_name",
        )
        .map_err(|e| StoreError::QueryError(format!("prepare failed: {e}")))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(WatermarkRow {
                source_name: row.get(0)?,
                table_name: row.get(1)?,
                watermark_value: row.get(2)?,
                last_run_id: row.get(3)?,
            })
        })
        .map_err(|e| StoreError::QueryError(format!("query failed: {e}")))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| StoreError::QueryError(format!("row error: {e}")))?;
    Ok(rows)
}

/// One row of `etl_watermarks`.
#[derive(Debug, Clone)]
pub struct WatermarkRow {
    pub source_name: String,
    pub table_name: String,
    pub watermark_value: String,
    pub last_run_id: Option<i64>,
}

#[cfg(test)]
#[path = "watermark_test.rs"]
mod tests;
