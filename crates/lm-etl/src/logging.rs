//! Structured run logging and step metrics.
//!
//! Every run gets a correlation id that prefixes its log lines and tags its
//! persisted step and error records, so one run's trail can be reconstructed
//! from interleaved output. [`timed_step`] wraps a phase body and guarantees
//! exactly one step-log row per step, whatever the outcome.

use crate::error::EtlResult;
use lm_core::validate::ValidationError;
use lm_store::audit::{self, ErrorRecord, StepRecord};
use lm_store::Warehouse;
use std::time::Instant;
use uuid::Uuid;

/// Run-scoped logger carrying the correlation id.
pub struct EtlLogger<'a> {
    warehouse: &'a Warehouse,
    run_id: i64,
    correlation_id: String,
    process_name: String,
}

impl<'a> EtlLogger<'a> {
    /// Create a logger for one run with a fresh correlation id.
    pub fn new(warehouse: &'a Warehouse, run_id: i64, process_name: &str) -> Self {
        Self::with_correlation_id(warehouse, run_id, process_name, Uuid::new_v4().to_string())
    }

    /// Create a logger reusing an existing correlation id (the run record is
    /// created before the logger, with the same id).
    pub fn with_correlation_id(
        warehouse: &'a Warehouse,
        run_id: i64,
        process_name: &str,
        correlation_id: String,
    ) -> Self {
        Self {
            warehouse,
            run_id,
            correlation_id,
            process_name: process_name.to_string(),
        }
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Short display form of the correlation id used as the log-line prefix.
    pub fn short_id(&self) -> &str {
        &self.correlation_id[..self.correlation_id.len().min(8)]
    }

    pub fn info(&self, message: &str) {
        log::info!("[{}] {message}", self.short_id());
    }

    pub fn warn(&self, message: &str) {
        log::warn!("[{}] {message}", self.short_id());
    }

    pub fn error(&self, message: &str) {
        log::error!("[{}] {message}", self.short_id());
    }

    /// Persist one error-log row tagged with the run and correlation id.
    ///
    /// Audit writes never abort the pipeline; a failed insert degrades to a
    /// warning line.
    pub fn log_error_to_db(
        &self,
        severity: &str,
        error_type: &str,
        message: &str,
        source_table: Option<&str>,
        source_record_id: Option<&str>,
        error_data: Option<String>,
    ) {
        let record = ErrorRecord {
            run_id: self.run_id,
            step_id: None,
            error_type,
            error_code: None,
            severity,
            process_name: &self.process_name,
            message,
            source_table,
            source_record_id,
            error_data,
            stack_trace: None,
            correlation_id: &self.correlation_id,
        };
        if let Err(e) = audit::insert_error(self.warehouse.conn(), &record) {
            log::warn!("[{}] could not persist error record: {e}", self.short_id());
        }
    }

    /// Persist a batch of validation errors, one error-log row each, with
    /// severity derived from the error kind.
    pub fn persist_validation_errors(&self, errors: &[ValidationError]) {
        for err in errors {
            let payload = serde_json::to_string(err).ok();
            self.log_error_to_db(
                &err.kind.severity().to_string(),
                &err.kind.to_string(),
                &err.message,
                Some(&err.table),
                Some(&err.record_id),
                payload,
            );
        }
        if !errors.is_empty() {
            self.info(&format!("Persisted {} validation errors", errors.len()));
        }
    }
}

/// Mutable metrics accumulator handed to a [`timed_step`] body.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepMetrics {
    pub rows_processed: i64,
    pub rows_success: i64,
    pub rows_failed: i64,
    failed: bool,
}

impl StepMetrics {
    /// Record the step's row counts in one call.
    pub fn record(&mut self, processed: i64, success: i64, failed: i64) {
        self.rows_processed = processed;
        self.rows_success = success;
        self.rows_failed = failed;
    }

    /// Mark the step failed without raising, for bodies that capture their
    /// errors (per-table load isolation).
    pub fn mark_failed(&mut self) {
        self.failed = true;
    }

    /// Fraction of processed rows that failed.
    pub fn error_rate(&self) -> f64 {
        if self.rows_processed == 0 {
            0.0
        } else {
            self.rows_failed as f64 / self.rows_processed as f64
        }
    }

    fn status(&self) -> &'static str {
        if self.failed {
            "failed"
        } else if self.rows_failed > 0 {
            "partial"
        } else {
            "success"
        }
    }
}

/// Rows per second over a duration; 0 when the duration rounds to nothing.
fn throughput(rows: i64, secs: f64) -> f64 {
    if secs > 0.0 {
        rows as f64 / secs
    } else {
        0.0
    }
}

/// Run `body` as a named step: time it, log a summary line, and persist
/// exactly one step-log row whether the body succeeds, partially succeeds,
/// or errors. A body error is re-propagated after the row is written.
pub fn timed_step<T, F>(
    logger: &EtlLogger<'_>,
    step_name: &str,
    step_type: &str,
    source_table: Option<&str>,
    target_table: Option<&str>,
    body: F,
) -> EtlResult<T>
where
    F: FnOnce(&mut StepMetrics) -> EtlResult<T>,
{
    let start = Instant::now();
    let mut metrics = StepMetrics::default();

    logger.info(&format!("Step {step_name} started"));
    let result = body(&mut metrics);
    let duration = start.elapsed().as_secs_f64();

    let (status, error_message) = match &result {
        Ok(_) => (metrics.status(), None),
        Err(e) => ("failed", Some(e.to_string())),
    };

    logger.info(&format!(
        "Step {step_name} {status}: {} rows in {duration:.2}s ({:.0} rows/s, {:.1}% errors)",
        metrics.rows_processed,
        throughput(metrics.rows_processed, duration),
        metrics.error_rate() * 100.0,
    ));

    let record = StepRecord {
        run_id: logger.run_id(),
        step_name,
        step_type,
        source_table,
        target_table,
        status,
        rows_processed: metrics.rows_processed,
        rows_inserted: metrics.rows_success,
        rows_rejected: metrics.rows_failed,
        duration_seconds: duration,
        error_message: error_message.as_deref(),
    };
    if let Err(e) = audit::insert_step(logger.warehouse.conn(), &record) {
        logger.warn(&format!("could not persist step record for {step_name}: {e}"));
    }

    result
}

#[cfg(test)]
#[path = "logging_test.rs"]
mod tests;
