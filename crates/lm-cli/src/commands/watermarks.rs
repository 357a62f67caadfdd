//! Watermarks command - show the incremental-extract watermarks.

use crate::cli::{GlobalArgs, WatermarksArgs};
use crate::commands::common::{open_warehouse, print_table};
use anyhow::Result;
use lm_store::watermark;

pub fn execute(_args: &WatermarksArgs, global: &GlobalArgs) -> Result<()> {
    let warehouse = open_warehouse(global)?;
    let rows = watermark::list_watermarks(warehouse.conn())?;

    let table_rows: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            vec![
                row.source_name.clone(),
                row.table_name.clone(),
                row.watermark_value.clone(),
                row.last_run_id
                    .map_or_else(|| "-".to_string(), |id| id.to_string()),
            ]
        })
        .collect();

    print_table(&["SOURCE", "TABLE", "WATERMARK", "LAST RUN"], &table_rows);
    Ok(())
}
