//! Run report: the per-phase summary the orchestrator hands back to its
//! caller. The CLI renders it as tables or JSON; the pipeline itself never
//! reads it back.

use crate::extract::ExtractBundle;
use crate::load::{LoadBundle, LoadResult};
use crate::transform::TransformBundle;
use chrono::NaiveDateTime;
use lm_core::RunMode;
use serde::Serialize;

/// Terminal status of one orchestrator run.
///
/// `Success` describes pipeline completion, not zero-defect data: a run with
/// rejected rows still succeeds. `Partial` means at least one table load
/// failed without aborting the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One source table's extract summary.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractMetric {
    pub table: String,
    pub source: String,
    pub rows: usize,
    pub secs: f64,
}

/// One target table's transform summary.
#[derive(Debug, Clone, Serialize)]
pub struct TransformMetric {
    pub table: String,
    pub rows: usize,
    pub rejected: usize,
    pub secs: f64,
}

/// Aggregate row counts across the run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ReportTotals {
    pub rows_extracted: i64,
    pub rows_transformed: i64,
    pub rows_loaded: i64,
    pub rows_rejected: i64,
}

/// Everything one run produced, for the summary printer and `--output json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: i64,
    pub mode: RunMode,
    pub dry_run: bool,
    pub status: RunStatus,
    pub correlation_id: String,
    pub started_at: NaiveDateTime,
    pub completed_at: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub totals: ReportTotals,
    pub extract: Vec<ExtractMetric>,
    pub transform: Vec<TransformMetric>,
    pub load: Vec<LoadResult>,
}

impl RunReport {
    pub fn total_secs(&self) -> f64 {
        (self.completed_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// Extract metrics in extraction order, keyed by logical name.
pub fn extract_metrics(bundle: &ExtractBundle) -> Vec<ExtractMetric> {
    bundle
        .results()
        .into_iter()
        .map(|(name, r)| ExtractMetric {
            table: name.to_string(),
            source: r.source.to_string(),
            rows: r.row_count,
            secs: r.extract_secs,
        })
        .collect()
}

/// Transform metrics keyed by target table.
pub fn transform_metrics(bundle: &TransformBundle) -> Vec<TransformMetric> {
    bundle
        .summaries()
        .into_iter()
        .map(|(table, s)| TransformMetric {
            table: table.to_string(),
            rows: s.row_count,
            rejected: s.rejected_count,
            secs: s.transform_secs,
        })
        .collect()
}

/// Load metrics in load order; empty for dry runs.
pub fn load_metrics(bundle: Option<&LoadBundle>) -> Vec<LoadResult> {
    bundle
        .map(|b| b.results().into_iter().cloned().collect())
        .unwrap_or_default()
}
