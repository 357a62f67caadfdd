//! Run command - execute one ETL run and print the per-phase summary.

use crate::cli::{GlobalArgs, ModeArg, OutputFormat, RunArgs};
use crate::commands::common::{open_warehouse, print_table};
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use lm_core::{EtlConfig, RunMode};
use lm_etl::{EtlOrchestrator, RunReport};

/// Build the run configuration: environment values first, CLI flags on top.
fn build_config(args: &RunArgs) -> Result<EtlConfig> {
    let mut config = EtlConfig::from_env()?;
    if let Some(mode) = args.mode {
        config.mode = match mode {
            ModeArg::Full => RunMode::Full,
            ModeArg::Incremental => RunMode::Incremental,
        };
    }
    if let Some(batch_size) = args.batch_size {
        config = config.with_batch_size(batch_size)?;
    }
    if args.dry_run {
        config.dry_run = true;
    }
    Ok(config)
}

fn parse_as_of(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| anyhow!("Invalid --as-of date '{raw}' (expected YYYY-MM-DD)"))
}

pub fn execute(args: &RunArgs, global: &GlobalArgs) -> Result<()> {
    let config = build_config(args)?;
    let warehouse = open_warehouse(global)?;

    let mut orchestrator = EtlOrchestrator::new(&warehouse, config);
    if let Some(raw) = &args.as_of {
        orchestrator = orchestrator.with_as_of(parse_as_of(raw)?);
    }

    let report = orchestrator.run().context("ETL run failed")?;

    match args.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => print_summary(&report),
    }
    Ok(())
}

/// Per-phase tabular summary, printed on success and partial success alike
/// so data-quality problems stay visible without failing the process.
fn print_summary(report: &RunReport) {
    println!(
        "\nRun {} ({}) {} in {:.2}s{}",
        report.run_id,
        report.mode,
        report.status,
        report.total_secs(),
        if report.dry_run { " [dry run]" } else { "" },
    );

    println!("\nExtract");
    print_table(
        &["TABLE", "SOURCE", "ROWS", "SECONDS"],
        &report
            .extract
            .iter()
            .map(|m| {
                vec![
                    m.table.clone(),
                    m.source.clone(),
                    m.rows.to_string(),
                    format!("{:.2}", m.secs),
                ]
            })
            .collect::<Vec<_>>(),
    );

    println!("\nTransform");
    print_table(
        &["TABLE", "ROWS", "REJECTED", "SECONDS"],
        &report
            .transform
            .iter()
            .map(|m| {
                vec![
                    m.table.clone(),
                    m.rows.to_string(),
                    m.rejected.to_string(),
                    format!("{:.2}", m.secs),
                ]
            })
            .collect::<Vec<_>>(),
    );

    if !report.load.is_empty() {
        println!("\nLoad");
        print_table(
            &["TABLE", "STAGED", "LOADED", "REJECTED", "ROWS/S", "METHOD", "STATUS"],
            &report
                .load
                .iter()
                .map(|r| {
                    vec![
                        r.table.to_string(),
                        r.rows_staged.to_string(),
                        r.rows_inserted.to_string(),
                        r.rows_rejected.to_string(),
                        format!("{:.0}", r.rows_per_second()),
                        r.load_method.to_string(),
                        if r.success {
                            "ok".to_string()
                        } else {
                            r.error_code.clone().unwrap_or_else(|| "failed".to_string())
                        },
                    ]
                })
                .collect::<Vec<_>>(),
        );

        for result in report.load.iter().filter(|r| !r.success) {
            if let Some(error) = &result.error {
                eprintln!("warning: {} load failed: {error}", result.table);
            }
        }
    }

    println!(
        "\nTotals: {} extracted, {} transformed, {} loaded, {} rejected",
        report.totals.rows_extracted,
        report.totals.rows_transformed,
        report.totals.rows_loaded,
        report.totals.rows_rejected,
    );
}
