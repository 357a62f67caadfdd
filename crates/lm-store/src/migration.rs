//! Schema migration runner for the warehouse database.
//!
//! Tracks applied migration versions in `etl_schema_version` and runs any
//! unapplied migrations on each open.

use crate::ddl::MIGRATIONS;
use crate::error::{StoreError, StoreResult};
use duckdb::Connection;

/// Ensure the `etl_schema_version` table exists.
fn ensure_version_table(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS etl_schema_version (
             version    INTEGER NOT NULL,
             applied_at TIMESTAMP NOT NULL DEFAULT now()
         );",
    )
    .map_err(|e| {
        StoreError::MigrationError(format!("failed to create etl_schema_version table: {e}"))
    })?;
    Ok(())
}

/// Return the highest applied migration version, or 0 if none.
fn current_version(conn: &Connection) -> StoreResult<i32> {
    let version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM etl_schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::MigrationError(format!("failed to read schema version: {e}")))?;
    Ok(version)
}

/// Highest applied migration version, 0 when the warehouse is empty.
pub fn schema_version(conn: &Connection) -> StoreResult<i32> {
    ensure_version_table(conn)?;
    current_version(conn)
}

/// Run all unapplied migrations against `conn`.
///
/// Each migration runs via `execute_batch` (DuckDB auto-commit); the version
/// number is recorded in `etl_schema_version` after successful execution.
pub fn run_migrations(conn: &Connection) -> StoreResult<()> {
    ensure_version_table(conn)?;
    let current = current_version(conn)?;

    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        log::debug!("Applying warehouse migration v{:03}", migration.version);

        conn.execute_batch(migration.sql).map_err(|e| {
            StoreError::MigrationError(format!("migration v{:03} failed: {e}", migration.version))
        })?;

        conn.execute(
            "INSERT INTO etl_schema_version (version) VALUES (?)",
            duckdb::params![migration.version],
        )
        .map_err(|e| {
            StoreError::MigrationError(format!(
                "failed to record migration v{:03}: {e}",
                migration.version
            ))
        })?;
    }
    Ok(())
}
