//! Audit-trail writers: run, step, and error log rows.
//!
//! The audit tables are append-only and write-only from the pipeline's
//! perspective; nothing here reads them back except the CLI status views.

use crate::error::{StoreError, StoreResult};
use duckdb::Connection;

/// Aggregate row counts recorded when a run completes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunTotals {
    pub rows_extracted: i64,
    pub rows_transformed: i64,
    pub rows_loaded: i64,
    pub rows_rejected: i64,
}

/// Create the run record (status `running`) and return the new run id.
pub fn begin_run(conn: &Connection, run_type: &str, correlation_id: &str) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO etl_run_log (run_type, correlation_id) VALUES (?, ?)",
        duckdb::params![run_type, correlation_id],
    )
    .map_err(|e| StoreError::AuditError(format!("insert etl_run_log: {e}")))?;

    let run_id: i64 = conn
        .query_row("SELECT MAX(run_id) FROM etl_run_log", [], |row| row.get(0))
        .map_err(|e| StoreError::AuditError(format!("select run_id: {e}")))?;
    Ok(run_id)
}

/// Finalize the run record with its terminal status and aggregate counts.
pub fn complete_run(
    conn: &Connection,
    run_id: i64,
    status: &str,
    totals: &RunTotals,
    error: Option<&str>,
) -> StoreResult<()> {
    conn.execute(
        "UPDATE etl_run_log
         SET status = ?, completed_at = now(),
             rows_extracted = ?, rows_transformed = ?,
             rows_loaded = ?, rows_rejected = ?,
             error_message = ?
         WHERE run_id = ?",
        duckdb::params![
            status,
            totals.rows_extracted,
            totals.rows_transformed,
            totals.rows_loaded,
            totals.rows_rejected,
            error,
            run_id
        ],
    )
    .map_err(|e| StoreError::AuditError(format!("update etl_run_log: {e}")))?;
    Ok(())
}

/// One step-log row.
#[derive(Debug, Clone)]
pub struct StepRecord<'a> {
    pub run_id: i64,
    pub step_name: &'a str,
    pub step_type: &'a str,
    pub source_table: Option<&'a str>,
    pub target_table: Option<&'a str>,
    pub status: &'a str,
    pub rows_processed: i64,
    pub rows_inserted: i64,
    pub rows_rejected: i64,
    pub duration_seconds: f64,
    pub error_message: Option<&'a str>,
}

/// Append a step-log row.
pub fn insert_step(conn: &Connection, step: &StepRecord<'_>) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO etl_step_log
         (run_id, step_name, step_type, source_table, target_table,
          status, rows_processed, rows_inserted, rows_rejected,
          duration_seconds, error_message)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        duckdb::params![
            step.run_id,
            step.step_name,
            step.step_type,
            step.source_table,
            step.target_table,
            step.status,
            step.rows_processed,
            step.rows_inserted,
            step.rows_rejected,
            step.duration_seconds,
            step.error_message
        ],
    )
    .map_err(|e| StoreError::AuditError(format!("insert etl_step_log: {e}")))?;
    Ok(())
}

/// One error-log row.
#[derive(Debug, Clone)]
pub struct ErrorRecord<'a> {
    pub run_id: i64,
    pub step_id: Option<i64>,
    pub error_type: &'a str,
    pub error_code: Option<&'a str>,
    pub severity: &'a str,
    pub process_name: &'a str,
    pub message: &'a str,
    pub source_table: Option<&'a str>,
    pub source_record_id: Option<&'a str>,
    pub error_data: Option<String>,
    pub stack_trace: Option<&'a str>,
    pub correlation_id: &'a str,
}

/// Append an error-log row.
pub fn insert_error(conn: &Connection, error: &ErrorRecord<'_>) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO etl_error_log
         (run_id, step_id, error_type, error_code, severity, process_name,
          error_message, source_table, source_record_id, error_data,
          stack_trace, correlation_id)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        duckdb::params![
            error.run_id,
            error.step_id,
            error.error_type,
            error.error_code,
            error.severity,
            error.process_name,
            error.message,
            error.source_table,
            error.source_record_id,
            error.error_data,
            error.stack_trace,
            error.correlation_id
        ],
    )
    .map_err(|e| StoreError::AuditError(format!("insert etl_error_log: {e}")))?;
    Ok(())
}

#[cfg(test)]
#[path = "audit_test.rs"]
mod tests;
