//! Error types for the warehouse layer.

use thiserror::Error;

/// Warehouse access errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the warehouse database (S001).
    #[error("[S001] Warehouse connection failed: {0}")]
    ConnectionError(String),

    /// Schema migration failed (S002).
    #[error("[S002] Warehouse migration failed: {0}")]
    MigrationError(String),

    /// SQL execution error (S003).
    #[error("[S003] Warehouse query failed: {0}")]
    QueryError(String),

    /// Transaction management error (S004).
    #[error("[S004] Warehouse transaction failed: {0}")]
    TransactionError(String),

    /// Audit-trail write failed (S005).
    #[error("[S005] Audit write failed: {0}")]
    AuditError(String),

    /// Bulk procedure failed at the SQL level (S006).
    #[error("[S006] Bulk procedure failed: {0}")]
    ProcedureError(String),

    /// DuckDB driver error with preserved source chain (S007).
    #[error("[S007] DuckDB error")]
    DuckDb(#[source] duckdb::Error),
}

/// Result type alias for [`StoreError`].
pub type StoreResult<T> = Result<T, StoreError>;

impl From<duckdb::Error> for StoreError {
    fn from(err: duckdb::Error) -> Self {
        StoreError::DuckDb(err)
    }
}
