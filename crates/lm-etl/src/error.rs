//! Error types for the pipeline.

use thiserror::Error;

/// Pipeline error type.
///
/// Row-level validation problems are *not* errors — they travel inside
/// transform results. An `EtlError` escaping a phase aborts the run.
#[derive(Error, Debug)]
pub enum EtlError {
    /// Extraction failed for one source table (P001). Any single-table
    /// failure aborts the whole extract phase.
    #[error("[P001] Extract failed for {table}: {message}")]
    Extract { table: String, message: String },

    /// Transform-phase failure outside row validation (P002).
    #[error("[P002] Transform failed for {table}: {message}")]
    Transform { table: String, message: String },

    /// Load failed for one target table (P003). The loader catches this and
    /// records a failed LoadResult instead of aborting the run.
    #[error("[P003] Load failed for {table}: {message}")]
    Load { table: String, message: String },

    /// Configuration or parse error from the core layer.
    #[error(transparent)]
    Core(#[from] lm_core::CoreError),

    /// Warehouse access error.
    #[error(transparent)]
    Store(#[from] lm_store::StoreError),
}

/// Result type alias for [`EtlError`].
pub type EtlResult<T> = Result<T, EtlError>;
