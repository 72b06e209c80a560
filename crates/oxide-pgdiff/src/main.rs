//! oxide-pgdiff CLI
//!
//! Dumps PostgreSQL catalogs as YAML and generates DDL from YAML.

use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use oxide_pgdiff::cli::{run, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match run(cli).await {
        Err(err) if err.is_connect() => {
            eprintln!("fatal: {err}");
            std::process::exit(1);
        }
        other => Ok(other?),
    }
}
