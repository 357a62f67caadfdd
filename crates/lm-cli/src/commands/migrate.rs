//! Migrate command - create or upgrade the warehouse schema.

use crate::cli::{GlobalArgs, MigrateArgs};
use crate::commands::common::{open_warehouse, resolve_db_path};
use anyhow::Result;
use lm_store::migration;

pub fn execute(_args: &MigrateArgs, global: &GlobalArgs) -> Result<()> {
    let path = resolve_db_path(global)?;
    // Opening runs any pending migrations.
    let warehouse = open_warehouse(global)?;
    let version = migration::schema_version(warehouse.conn())?;
    println!("Warehouse at {path} is on schema v{version:03}");
    Ok(())
}
