use super::*;
use clap::CommandFactory;

#[test]
fn verify_cli_args() {
    // Validates the entire command tree: short flag conflicts,
    // duplicate args, and other clap definition errors.
    Cli::command().debug_assert();
}

#[test]
fn parses_run_flags() {
    let cli = Cli::try_parse_from([
        "lendmill",
        "run",
        "--mode",
        "incremental",
        "--batch-size",
        "2000",
        "--dry-run",
        "--as-of",
        "2025-10-29",
    ])
    .unwrap();

    let Commands::Run(args) = cli.command else {
        panic!("expected run subcommand");
    };
    assert_eq!(args.mode, Some(ModeArg::Incremental));
    assert_eq!(args.batch_size, Some(2000));
    assert!(args.dry_run);
    assert_eq!(args.as_of.as_deref(), Some("2025-10-29"));
    assert_eq!(args.output, OutputFormat::Table);
}

#[test]
fn db_path_flag_is_global() {
    let cli = Cli::try_parse_from(["lendmill", "--db-path", "wh.duckdb", "watermarks"]).unwrap();
    assert_eq!(cli.global.db_path.as_deref(), Some("wh.duckdb"));
    assert!(matches!(cli.command, Commands::Watermarks(_)));
}

#[test]
fn json_output_is_selectable() {
    let cli = Cli::try_parse_from(["lendmill", "run", "--output", "json"]).unwrap();
    let Commands::Run(args) = cli.command else {
        panic!("expected run subcommand");
    };
    assert_eq!(args.output, OutputFormat::Json);
}
