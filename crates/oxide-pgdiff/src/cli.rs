//! Command-line interface.
//!
//! Two commands share one set of connection and selection flags:
//!
//! ```bash
//! # Write the catalog of `app` as YAML
//! oxide-pgdiff dump app -o app.yaml
//!
//! # Same, one file per object
//! oxide-pgdiff dump app --multiple-files app-schema/
//!
//! # Statements that turn `app` into what app.yaml describes
//! oxide-pgdiff diff app app.yaml --single-transaction
//! ```

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use oxide_pgdiff_core::wire::{from_map, read_files, to_map, write_files};
use oxide_pgdiff_core::{diff, Database, DiffOptions};
use serde_yaml::{Mapping, Value};
use tracing::info;

use crate::config::{Config, OptionsConfig};
use crate::connection::load_catalog;
use crate::error::Result;
use crate::executor::{apply, render_script};

/// Compare PostgreSQL catalogs with YAML schema descriptions.
#[derive(Debug, Parser)]
#[command(name = "oxide-pgdiff")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Database server host or socket directory.
    #[arg(long, env = "PGHOST", global = true)]
    pub host: Option<String>,

    /// Database server port.
    #[arg(short, long, env = "PGPORT", global = true)]
    pub port: Option<u16>,

    /// Database user name.
    #[arg(short = 'U', long, env = "PGUSER", global = true)]
    pub username: Option<String>,

    /// Database password.
    #[arg(long, env = "PGPASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Configuration file (YAML).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Object selection flags common to both commands.
#[derive(Debug, Default, Args)]
pub struct Selection {
    /// Only objects in this schema (repeatable).
    #[arg(short = 'n', long = "schema")]
    pub schemas: Vec<String>,

    /// Leave out this schema (repeatable).
    #[arg(short = 'N', long = "exclude-schema")]
    pub exclude_schemas: Vec<String>,

    /// Only this table and what it owns (repeatable).
    #[arg(short = 't', long = "table")]
    pub tables: Vec<String>,

    /// Ignore object ownership.
    #[arg(short = 'O', long)]
    pub no_owner: bool,

    /// Ignore privileges.
    #[arg(short = 'x', long = "no-privileges")]
    pub no_privileges: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write the database catalog as YAML.
    Dump {
        /// Database name (falls back to the configuration file).
        dbname: Option<String>,

        #[command(flatten)]
        selection: Selection,

        /// Output file (stdout if not specified).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write one file per object under this directory.
        #[arg(short, long, conflicts_with = "output")]
        multiple_files: Option<PathBuf>,
    },

    /// Generate the SQL that makes the database match a YAML description.
    Diff {
        /// Database name.
        dbname: String,

        /// YAML file or multiple-files directory (stdin if not specified).
        spec: Option<PathBuf>,

        #[command(flatten)]
        selection: Selection,

        /// Generate statements that undo the changes instead.
        #[arg(short, long)]
        revert: bool,

        /// Output file (stdout if not specified).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Wrap the statements in a single transaction.
        #[arg(short = '1', long)]
        single_transaction: bool,

        /// Execute the statements against the database.
        #[arg(short, long)]
        update: bool,
    },
}

impl Cli {
    /// Loads the configuration file, if any, and applies the flags on
    /// top of it.
    pub fn settings(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        let conn = &mut config.connection;
        if let Some(host) = &self.host {
            conn.host.clone_from(host);
        }
        if let Some(port) = self.port {
            conn.port = port;
        }
        if self.username.is_some() {
            conn.username.clone_from(&self.username);
        }
        if self.password.is_some() {
            conn.password.clone_from(&self.password);
        }

        let options = &mut config.options;
        match &self.command {
            Commands::Dump {
                dbname,
                selection,
                multiple_files,
                ..
            } => {
                if dbname.is_some() {
                    config.connection.dbname.clone_from(dbname);
                }
                selection.apply_to(options);
                if multiple_files.is_some() {
                    options.multiple_files.clone_from(multiple_files);
                }
            }
            Commands::Diff {
                dbname,
                selection,
                revert,
                single_transaction,
                ..
            } => {
                config.connection.dbname = Some(dbname.clone());
                selection.apply_to(options);
                options.revert |= revert;
                options.single_transaction |= single_transaction;
            }
        }
        Ok(config)
    }
}

impl Selection {
    fn apply_to(&self, options: &mut OptionsConfig) {
        if !self.schemas.is_empty() {
            options.schemas.clone_from(&self.schemas);
        }
        if !self.exclude_schemas.is_empty() {
            options.exclude_schemas.clone_from(&self.exclude_schemas);
        }
        if !self.tables.is_empty() {
            options.tables.clone_from(&self.tables);
        }
        options.no_owner |= self.no_owner;
        options.no_privs |= self.no_privileges;
    }
}

/// Runs the parsed command.
pub async fn run(cli: Cli) -> Result<()> {
    let config = cli.settings()?;
    match cli.command {
        Commands::Dump { output, .. } => dump(&config, output.as_deref()).await,
        Commands::Diff {
            spec,
            output,
            update,
            ..
        } => run_diff(&config, spec.as_deref(), output.as_deref(), update).await,
    }
}

async fn dump(config: &Config, output: Option<&Path>) -> Result<()> {
    let (_pool, mut db) = load_catalog(&config.connection).await?;
    select(&mut db, &config.options);
    let mut map = to_map(&db)?;
    strip_attributes(&mut map, config.options.no_owner, config.options.no_privs);

    if let Some(dir) = &config.options.multiple_files {
        let written = write_files(&map, dir)?;
        info!(dir = %dir.display(), files = written.len(), "Wrote catalog");
        return Ok(());
    }
    let yaml = serde_yaml::to_string(&map).map_err(oxide_pgdiff_core::CatalogError::from)?;
    write_output(output, &yaml)
}

async fn run_diff(
    config: &Config,
    spec: Option<&Path>,
    output: Option<&Path>,
    update: bool,
) -> Result<()> {
    let options = &config.options;
    let mut desired = from_map(&read_spec(spec.or(options.multiple_files.as_deref()))?)?;
    let (pool, mut current) = load_catalog(&config.connection).await?;
    select(&mut current, options);
    select(&mut desired, options);

    let mut diff_options = DiffOptions::new();
    if options.no_owner {
        diff_options = diff_options.without_owner();
    }
    if options.no_privs {
        diff_options = diff_options.without_privileges();
    }
    if options.revert {
        diff_options = diff_options.reverted();
    }
    let stmts = diff(&current, &desired, diff_options)?;
    if stmts.is_empty() {
        info!("Database matches the description");
        return Ok(());
    }
    info!(statements = stmts.len(), "Generated changes");

    write_output(output, &render_script(&stmts, options.single_transaction))?;
    if update {
        apply(&pool, &stmts).await?;
    }
    Ok(())
}

fn select(db: &mut Database, options: &OptionsConfig) {
    if !options.schemas.is_empty() || !options.exclude_schemas.is_empty() {
        db.filter_schemas(&options.schemas, &options.exclude_schemas);
    }
    if !options.tables.is_empty() {
        db.filter_tables(&options.tables);
    }
}

/// Reads a description from a file, a multiple-files directory, or
/// stdin.
fn read_spec(path: Option<&Path>) -> Result<Mapping> {
    let text = match path {
        Some(dir) if dir.is_dir() => return Ok(read_files(dir)?),
        Some(file) if file != Path::new("-") => fs::read_to_string(file)?,
        _ => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            text
        }
    };
    parse_spec(&text)
}

fn parse_spec(text: &str) -> Result<Mapping> {
    if text.trim().is_empty() {
        return Ok(Mapping::new());
    }
    let map = serde_yaml::from_str(text).map_err(oxide_pgdiff_core::CatalogError::from)?;
    Ok(map)
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => fs::write(path, text)?,
        None => io::stdout().lock().write_all(text.as_bytes())?,
    }
    Ok(())
}

/// Removes `owner` and `privileges` attributes throughout a wire map.
/// Only scalar owners and list-valued privileges are attributes; a
/// mapping under either name is an object that happens to be called so.
pub fn strip_attributes(map: &mut Mapping, owner: bool, privileges: bool) {
    if owner && matches!(map.get("owner"), Some(Value::String(_))) {
        map.remove("owner");
    }
    if privileges && matches!(map.get("privileges"), Some(Value::Sequence(_))) {
        map.remove("privileges");
    }
    for (_, value) in map.iter_mut() {
        strip_value(value, owner, privileges);
    }
}

fn strip_value(value: &mut Value, owner: bool, privileges: bool) {
    match value {
        Value::Mapping(map) => strip_attributes(map, owner, privileges),
        Value::Sequence(items) => {
            for item in items {
                strip_value(item, owner, privileges);
            }
        }
        _ => {}
    }
}
