//! Shared utilities for CLI commands

use crate::cli::GlobalArgs;
use anyhow::{Context, Result};
use lm_core::WarehouseConfig;
use lm_store::Warehouse;

/// Resolve the warehouse path from the CLI flag or the environment,
/// failing fast when neither supplies one.
pub(crate) fn resolve_db_path(global: &GlobalArgs) -> Result<String> {
    match &global.db_path {
        Some(path) if !path.trim().is_empty() => Ok(path.clone()),
        _ => Ok(WarehouseConfig::from_env()?.path),
    }
}

/// Open the warehouse named by the CLI flag or environment, running any
/// pending schema migrations.
pub(crate) fn open_warehouse(global: &GlobalArgs) -> Result<Warehouse> {
    let path = resolve_db_path(global)?;
    Warehouse::open_str(&path).with_context(|| format!("Failed to open warehouse at {path}"))
}

/// Calculate column widths for a table given headers and row data.
///
/// For each column, returns the maximum width across the header and all
/// row values so that data aligns when printed with left-padding.
pub(crate) fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }
    widths
}

/// Print a formatted table to stdout.
///
/// Calculates column widths from `headers` and `rows`, then prints
/// a left-aligned header row, a separator line of dashes, and each
/// data row. Columns are separated by two spaces.
pub(crate) fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let widths = calculate_column_widths(headers, rows);

    let header_parts: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, &w)| format!("{:<width$}", h, width = w))
        .collect();
    println!("{}", header_parts.join("  "));

    let sep_parts: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep_parts.join("  "));

    for row in rows {
        let row_parts: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{:<width$}", cell, width = w))
            .collect();
        println!("{}", row_parts.join("  "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_cover_headers_and_cells() {
        let rows = vec![
            vec!["users".to_string(), "12".to_string()],
            vec!["fact_loan_transactions".to_string(), "3".to_string()],
        ];
        let widths = calculate_column_widths(&["TABLE", "ROWS"], &rows);
        assert_eq!(widths, vec!["fact_loan_transactions".len(), "ROWS".len()]);
    }

    #[test]
    fn missing_db_path_fails_fast() {
        let global = crate::cli::GlobalArgs {
            verbose: false,
            db_path: Some("   ".to_string()),
        };
        // A blank flag falls through to the environment lookup, which
        // reports the configuration error.
        if std::env::var("LENDMILL_DB_PATH").is_err() {
            let err = resolve_db_path(&global).unwrap_err();
            assert!(err.to_string().contains("LENDMILL_DB_PATH"));
        }
    }
}
