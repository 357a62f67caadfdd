//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Lendmill - batch ETL for the lending analytics warehouse
#[derive(Parser, Debug)]
#[command(name = "lendmill")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the warehouse database file
    #[arg(short = 'd', long, global = true, env = "LENDMILL_DB_PATH")]
    pub db_path: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create or upgrade the warehouse schema
    Migrate(MigrateArgs),

    /// Execute one ETL run
    Run(RunArgs),

    /// Show the incremental-extract watermarks
    Watermarks(WatermarksArgs),
}

/// Arguments for the migrate command
#[derive(Args, Debug)]
pub struct MigrateArgs {}

/// Extraction modes selectable from the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    /// Reload all source rows
    Full,
    /// Extract only rows newer than the stored watermarks
    Incremental,
}

/// Output formats for the run summary
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Per-phase summary tables
    Table,
    /// The full run report as JSON
    Json,
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Extraction mode (defaults to LENDMILL_MODE, then full)
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Rows per fetch/insert unit, within [1000, 10000]
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Run extract and transform only, skip the load phase
    #[arg(long)]
    pub dry_run: bool,

    /// Business date for the run (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    pub as_of: Option<String>,

    /// Output format for the summary
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

/// Arguments for the watermarks command
#[derive(Args, Debug)]
pub struct WatermarksArgs {}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
