//! Unit tests for CLI argument parsing and validation

use clap::Parser;
use datadiff::cli::{Cli, Commands, DataOrigin};
use datadiff::commands::build_options;
use datadiff::{DiffColumn, EqualityMode, ReportDensity, ReportStrategy};

fn diff_args(args: &[&str]) -> datadiff::cli::DiffArgs {
    let mut argv = vec!["datadiff", "diff"];
    argv.extend_from_slice(args);
    match Cli::try_parse_from(argv).unwrap().command {
        Commands::Diff(args) => args,
        _ => panic!("Expected Diff command"),
    }
}

#[test]
fn test_cli_diff_defaults() {
    let args = diff_args(&["old.csv", "new.csv"]);
    assert_eq!(args.source, "old.csv");
    assert_eq!(args.target.as_deref(), Some("new.csv"));
    assert!(args.key.is_empty());
    assert!(args.equality.is_none());
    assert!(args.report.is_none());
    assert!(args.max_changes.is_none());
    assert_eq!(args.data_origin, "record");
    assert!(!args.json);
    assert!(!args.fail);
}

#[test]
fn test_cli_diff_with_all_options() {
    let args = diff_args(&[
        "old.csv", "new.csv", "--key", "id", "--key", "region", "--equality", "loss", "--report",
        "cell", "--density", "sparse", "--max-changes", "0", "--prefix", "chg_", "--columns",
        "id,status,origin", "--data-origin", "structure", "--output", "report.csv", "--json",
        "--fail",
    ]);
    assert_eq!(args.key, vec!["id", "region"]);
    assert_eq!(args.max_changes, Some(0));
    assert_eq!(args.prefix.as_deref(), Some("chg_"));
    assert_eq!(args.output.as_deref(), Some(std::path::Path::new("report.csv")));
    assert_eq!(DataOrigin::parse(&args.data_origin), Ok(DataOrigin::Structure));

    let options = build_options(&args).unwrap();
    assert_eq!(options.driver_columns, vec!["id", "region"]);
    assert_eq!(options.equality, EqualityMode::Loss);
    assert_eq!(options.report, ReportStrategy::Cell);
    assert_eq!(options.density, ReportDensity::Sparse);
    assert_eq!(options.max_change_count, Some(0));
    assert_eq!(options.column_prefix, "chg_");
    assert_eq!(
        options.diff_columns,
        Some(vec![DiffColumn::Id, DiffColumn::Status, DiffColumn::Origin])
    );
}

#[test]
fn test_cli_key_is_comma_delimited() {
    let args = diff_args(&["a.csv", "--key", "id,region"]);
    assert_eq!(args.key, vec!["id", "region"]);
}

#[test]
fn test_cli_describe_command() {
    let cli = Cli::try_parse_from(["datadiff", "describe", "orders", "--database", "shop.db", "--json"]).unwrap();
    match cli.command {
        Commands::Describe {
            resource,
            database,
            key,
            json,
        } => {
            assert_eq!(resource, "orders");
            assert_eq!(database.as_deref(), Some(std::path::Path::new("shop.db")));
            assert!(key.is_empty());
            assert!(json);
        }
        _ => panic!("Expected Describe command"),
    }
}

#[test]
fn test_cli_verbose_is_global() {
    let cli = Cli::try_parse_from(["datadiff", "diff", "a.csv", "--verbose"]).unwrap();
    assert!(cli.verbose);
}

#[test]
fn test_cli_invalid_arguments() {
    assert!(Cli::try_parse_from(["datadiff"]).is_err());
    assert!(Cli::try_parse_from(["datadiff", "diff"]).is_err());
    assert!(Cli::try_parse_from(["datadiff", "diff", "a.csv", "--max-changes", "-1"]).is_err());
    assert!(Cli::try_parse_from(["datadiff", "merge", "a.csv"]).is_err());
}

#[test]
fn test_options_file_is_overridden_by_flags() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = dir.path().join("options.json");
    std::fs::write(
        &config,
        r#"{"equality": "loss", "density": "sparse", "column_prefix": "x_", "max_change_count": 5}"#,
    )
    .unwrap();

    let config_arg = config.to_str().unwrap();
    let options = build_options(&diff_args(&["a.csv", "--config", config_arg, "--density", "dense"])).unwrap();
    assert_eq!(options.equality, EqualityMode::Loss);
    assert_eq!(options.density, ReportDensity::Dense);
    assert_eq!(options.column_prefix, "x_");
    assert_eq!(options.max_change_count, Some(5));
}
