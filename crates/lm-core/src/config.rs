//! Environment-driven configuration for the Lendmill pipeline
//!
//! All values come from `LENDMILL_*` environment variables, with CLI flags
//! overriding them at the binary boundary. The warehouse path is required and
//! fails fast when absent; there is no fallback to a hardcoded location.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lower bound for the processing batch size.
pub const MIN_BATCH_SIZE: usize = 1_000;

/// Upper bound for the processing batch size.
pub const MAX_BATCH_SIZE: usize = 10_000;

/// Default rows per fetch/insert unit.
pub const DEFAULT_BATCH_SIZE: usize = 5_000;

/// Extraction mode for a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Reload all source rows
    #[default]
    Full,
    /// Extract only rows newer than the stored watermarks
    Incremental,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Full => write!(f, "full"),
            RunMode::Incremental => write!(f, "incremental"),
        }
    }
}

impl FromStr for RunMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(RunMode::Full),
            "incremental" => Ok(RunMode::Incremental),
            other => Err(CoreError::ConfigInvalid {
                message: format!("Unknown run mode '{other}' (expected 'full' or 'incremental')"),
            }),
        }
    }
}

/// Warehouse connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Path to the DuckDB warehouse file (`:memory:` allowed for tests)
    pub path: String,
}

impl WarehouseConfig {
    /// Load the warehouse location from `LENDMILL_DB_PATH`.
    ///
    /// Fails fast when the variable is unset or empty — the pipeline never
    /// falls back to an implicit database location.
    pub fn from_env() -> CoreResult<Self> {
        match std::env::var("LENDMILL_DB_PATH") {
            Ok(path) if !path.trim().is_empty() => Ok(Self { path }),
            _ => Err(CoreError::ConfigMissing {
                message: "Warehouse path is required - set LENDMILL_DB_PATH".to_string(),
            }),
        }
    }
}

/// Pipeline tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    /// Rows per fetch/insert unit, bounded to [MIN_BATCH_SIZE, MAX_BATCH_SIZE]
    pub batch_size: usize,

    /// Extraction mode
    pub mode: RunMode,

    /// Run extract and transform only, skip the load phase
    pub dry_run: bool,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            mode: RunMode::default(),
            dry_run: false,
        }
    }
}

impl EtlConfig {
    /// Load tunables from `LENDMILL_BATCH_SIZE`, `LENDMILL_MODE`, and
    /// `LENDMILL_DRY_RUN`, falling back to defaults when unset.
    pub fn from_env() -> CoreResult<Self> {
        let batch_size = match std::env::var("LENDMILL_BATCH_SIZE") {
            Ok(raw) => {
                let parsed: usize = raw.parse().map_err(|_| CoreError::ConfigInvalid {
                    message: format!("LENDMILL_BATCH_SIZE '{raw}' is not a number"),
                })?;
                validate_batch_size(parsed)?
            }
            Err(_) => DEFAULT_BATCH_SIZE,
        };

        let mode = match std::env::var("LENDMILL_MODE") {
            Ok(raw) => raw.parse()?,
            Err(_) => RunMode::default(),
        };

        let dry_run = matches!(
            std::env::var("LENDMILL_DRY_RUN").as_deref(),
            Ok("1") | Ok("true") | Ok("yes")
        );

        Ok(Self {
            batch_size,
            mode,
            dry_run,
        })
    }

    /// Replace the batch size, re-validating the bounds.
    pub fn with_batch_size(mut self, batch_size: usize) -> CoreResult<Self> {
        self.batch_size = validate_batch_size(batch_size)?;
        Ok(self)
    }
}

/// Validate that a batch size lies within the supported range.
pub fn validate_batch_size(batch_size: usize) -> CoreResult<usize> {
    if (MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&batch_size) {
        Ok(batch_size)
    } else {
        Err(CoreError::ConfigInvalid {
            message: format!(
                "Batch size {batch_size} outside supported range [{MIN_BATCH_SIZE}, {MAX_BATCH_SIZE}]"
            ),
        })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
