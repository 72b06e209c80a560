//! Argument parsing and configuration merging for the binary.

use std::fs;

use clap::Parser;
use oxide_pgdiff::cli::{Cli, Commands};
use oxide_pgdiff::DiffError;

/// Parses `args` with the libpq environment variables cleared, so that
/// only the arguments and configuration file count.
fn parse(args: &[&str]) -> Cli {
    for var in ["PGHOST", "PGPORT", "PGUSER", "PGPASSWORD"] {
        std::env::remove_var(var);
    }
    Cli::try_parse_from(std::iter::once("oxide-pgdiff").chain(args.iter().copied()))
        .unwrap_or_else(|e| panic!("failed to parse {args:?}: {e}"))
}

// =============================================================================
// Parsing
// =============================================================================

#[test]
fn dump_with_selection_flags() {
    let cli = parse(&[
        "dump", "app", "-n", "public", "--schema", "s1", "-t", "t1", "-O", "-x",
    ]);
    match cli.command {
        Commands::Dump {
            dbname,
            selection,
            output,
            multiple_files,
        } => {
            assert_eq!(dbname.as_deref(), Some("app"));
            assert_eq!(selection.schemas, vec!["public", "s1"]);
            assert_eq!(selection.tables, vec!["t1"]);
            assert!(selection.no_owner);
            assert!(selection.no_privileges);
            assert!(output.is_none());
            assert!(multiple_files.is_none());
        }
        Commands::Diff { .. } => panic!("expected dump"),
    }
}

#[test]
fn diff_with_spec_and_switches() {
    let cli = parse(&[
        "-p", "5433", "diff", "app", "app.yaml", "--revert", "-1", "--update", "-v",
    ]);
    assert!(cli.verbose);
    assert_eq!(cli.port, Some(5433));
    match cli.command {
        Commands::Diff {
            dbname,
            spec,
            revert,
            single_transaction,
            update,
            ..
        } => {
            assert_eq!(dbname, "app");
            assert_eq!(spec.unwrap().to_str(), Some("app.yaml"));
            assert!(revert);
            assert!(single_transaction);
            assert!(update);
        }
        Commands::Dump { .. } => panic!("expected diff"),
    }
}

#[test]
fn diff_requires_a_database() {
    assert!(Cli::try_parse_from(["oxide-pgdiff", "diff"]).is_err());
}

#[test]
fn output_and_multiple_files_conflict() {
    assert!(
        Cli::try_parse_from(["oxide-pgdiff", "dump", "app", "-o", "a.yaml", "-m", "dir"]).is_err()
    );
}

// =============================================================================
// Configuration
// =============================================================================

const CONFIG: &str = "
connection:
  host: db.internal
  port: 6543
  username: deploy
  dbname: app
options:
  schemas: [billing]
  no_owner: true
  multiple_files: described
";

#[test]
fn config_file_supplies_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pgdiff.yaml");
    fs::write(&path, CONFIG).unwrap();

    let cli = parse(&["--config", path.to_str().unwrap(), "dump"]);
    let config = cli.settings().unwrap();
    assert_eq!(config.connection.host, "db.internal");
    assert_eq!(config.connection.port, 6543);
    assert_eq!(config.connection.username.as_deref(), Some("deploy"));
    assert_eq!(config.connection.dbname.as_deref(), Some("app"));
    assert_eq!(config.options.schemas, vec!["billing"]);
    assert!(config.options.no_owner);
    assert_eq!(
        config.options.multiple_files.unwrap().to_str(),
        Some("described")
    );
}

#[test]
fn flags_override_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pgdiff.yaml");
    fs::write(&path, CONFIG).unwrap();

    let cli = parse(&[
        "--config",
        path.to_str().unwrap(),
        "--host",
        "other",
        "--port",
        "5432",
        "diff",
        "staging",
        "-n",
        "public",
        "-x",
    ]);
    let config = cli.settings().unwrap();
    assert_eq!(config.connection.host, "other");
    assert_eq!(config.connection.port, 5432);
    assert_eq!(config.connection.dbname.as_deref(), Some("staging"));
    assert_eq!(config.options.schemas, vec!["public"]);
    assert!(config.options.no_owner);
    assert!(config.options.no_privs);
}

#[test]
fn bad_config_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.yaml");
    fs::write(&path, "connection: [oops\n").unwrap();

    let cli = parse(&["--config", path.to_str().unwrap(), "dump", "app"]);
    match cli.settings() {
        Err(DiffError::Config { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn missing_config_file_is_an_io_error() {
    let cli = parse(&["--config", "/nonexistent/pgdiff.yaml", "dump", "app"]);
    assert!(matches!(cli.settings(), Err(DiffError::Io(_))));
}
