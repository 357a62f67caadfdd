//! Run orchestration: sequence extract, transform, and load for one run,
//! persist the audit trail, and assemble the run report.
//!
//! The orchestrator is the single place that translates an escaping error
//! into a terminal run state: the run record is marked failed with the
//! message, then the error propagates to the caller for the process exit
//! code. Rejected rows alone never fail a run; a caught table-load failure
//! makes it `partial`.

use crate::context::RunContext;
use crate::error::EtlResult;
use crate::extract::{ExtractBundle, Extractor};
use crate::load::{LoadBundle, Loader};
use crate::logging::{timed_step, EtlLogger};
use crate::report::{self, ReportTotals, RunReport, RunStatus};
use crate::transform::{TransformBundle, Transformer};
use chrono::{NaiveDate, Utc};
use lm_core::EtlConfig;
use lm_store::audit::{self, RunTotals};
use lm_store::Warehouse;
use uuid::Uuid;

pub struct EtlOrchestrator<'a> {
    warehouse: &'a Warehouse,
    config: EtlConfig,
    as_of: NaiveDate,
}

impl<'a> EtlOrchestrator<'a> {
    /// Orchestrator for one run against an open warehouse. The business
    /// date defaults to today (UTC).
    pub fn new(warehouse: &'a Warehouse, config: EtlConfig) -> Self {
        Self {
            warehouse,
            config,
            as_of: Utc::now().date_naive(),
        }
    }

    /// Override the run's business date (historical reruns, tests).
    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = as_of;
        self
    }

    /// Execute one full run: pending -> running on run-record creation,
    /// then success / partial on completion or failed on an escaping error
    /// (which is re-raised after the run record is finalized).
    pub fn run(&self) -> EtlResult<RunReport> {
        let started_at = Utc::now().naive_utc();
        let correlation_id = Uuid::new_v4().to_string();
        let run_id = audit::begin_run(
            self.warehouse.conn(),
            &self.config.mode.to_string(),
            &correlation_id,
        )?;
        let logger = EtlLogger::with_correlation_id(
            self.warehouse,
            run_id,
            "etl_orchestrator",
            correlation_id.clone(),
        );
        logger.info(&format!(
            "Run {run_id} started: mode {}, batch size {}{}",
            self.config.mode,
            self.config.batch_size,
            if self.config.dry_run { ", dry run" } else { "" },
        ));

        match self.execute_phases(&logger, run_id) {
            Ok((extracted, transformed, loaded)) => {
                let totals = ReportTotals {
                    rows_extracted: extracted.total_rows() as i64,
                    rows_transformed: transformed.total_rows() as i64,
                    rows_loaded: loaded.as_ref().map_or(0, LoadBundle::total_loaded),
                    rows_rejected: transformed.total_rejected() as i64
                        + loaded.as_ref().map_or(0, LoadBundle::total_rejected),
                };
                let status = match &loaded {
                    Some(l) if l.any_failed() => RunStatus::Partial,
                    _ => RunStatus::Success,
                };
                audit::complete_run(
                    self.warehouse.conn(),
                    run_id,
                    status.as_str(),
                    &RunTotals {
                        rows_extracted: totals.rows_extracted,
                        rows_transformed: totals.rows_transformed,
                        rows_loaded: totals.rows_loaded,
                        rows_rejected: totals.rows_rejected,
                    },
                    None,
                )?;
                let completed_at = Utc::now().naive_utc();
                logger.info(&format!(
                    "Run {run_id} {status}: {} extracted, {} transformed, {} loaded, {} rejected",
                    totals.rows_extracted,
                    totals.rows_transformed,
                    totals.rows_loaded,
                    totals.rows_rejected,
                ));

                Ok(RunReport {
                    run_id,
                    mode: self.config.mode,
                    dry_run: self.config.dry_run,
                    status,
                    correlation_id,
                    started_at,
                    completed_at,
                    error: None,
                    totals,
                    extract: report::extract_metrics(&extracted),
                    transform: report::transform_metrics(&transformed),
                    load: report::load_metrics(loaded.as_ref()),
                })
            }
            Err(e) => {
                let message = e.to_string();
                logger.error(&format!("Run {run_id} failed: {message}"));
                logger.log_error_to_db("CRITICAL", "RUN_FAILURE", &message, None, None, None);
                if let Err(complete_err) = audit::complete_run(
                    self.warehouse.conn(),
                    run_id,
                    RunStatus::Failed.as_str(),
                    &RunTotals::default(),
                    Some(&message),
                ) {
                    logger.warn(&format!(
                        "could not finalize failed run record: {complete_err}"
                    ));
                }
                Err(e)
            }
        }
    }

    /// Extract, transform, and (unless dry-running) load, each as one
    /// timed step. Extraction must complete before transform starts, and
    /// transform before load.
    fn execute_phases(
        &self,
        logger: &EtlLogger<'_>,
        run_id: i64,
    ) -> EtlResult<(ExtractBundle, TransformBundle, Option<LoadBundle>)> {
        let extractor =
            Extractor::new(self.warehouse, self.config.batch_size).with_as_of(Some(self.as_of));
        let extracted = timed_step(logger, "extract", "extract", None, None, |metrics| {
            let bundle = extractor.run_extract(self.config.mode, run_id)?;
            let total = bundle.total_rows() as i64;
            metrics.record(total, total, 0);
            Ok(bundle)
        })?;

        let ctx = RunContext::from_extract(&extracted);
        let transformer = Transformer::new(&ctx, self.as_of);
        let transformed = timed_step(logger, "transform", "transform", None, None, |metrics| {
            let bundle = transformer.run_transform(&extracted);
            let accepted = bundle.total_rows() as i64;
            let rejected = bundle.total_rejected() as i64;
            metrics.record(accepted + rejected, accepted, rejected);
            Ok(bundle)
        })?;
        let errors: Vec<_> = transformed.all_errors().cloned().collect();
        logger.persist_validation_errors(&errors);

        let loaded = if self.config.dry_run {
            logger.info("Dry run: load phase skipped");
            None
        } else {
            let loader = Loader::new(self.warehouse, self.config.batch_size);
            let results = timed_step(logger, "load", "load", None, None, |metrics| {
                let results = loader.run_load(&transformed, run_id, self.as_of);
                let staged: i64 = results.results().iter().map(|r| r.rows_staged as i64).sum();
                let loaded = results.total_loaded();
                metrics.record(staged, loaded, staged - loaded);
                Ok(results)
            })?;
            Some(results)
        };

        Ok((extracted, transformed, loaded))
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
