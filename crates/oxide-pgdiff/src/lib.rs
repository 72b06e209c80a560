//! Command-line driver for `oxide-pgdiff-core`.
//!
//! `oxide-pgdiff` connects to a PostgreSQL database, loads its catalog
//! into an object tree, and either writes that tree out as YAML (`dump`)
//! or compares it with a YAML description and prints the SQL that would
//! make the database match (`diff`).
//!
//! # Architecture
//!
//! - **Config** - YAML configuration file with connection settings and defaults
//! - **Connection** - `sqlx` pool and a prefetched catalog snapshot
//! - **Executor** - Script rendering and transactional application
//! - **CLI** - `clap` commands tying the pieces together
//!
//! # CLI Usage
//!
//! ```bash
//! # Dump the public schema of `app`
//! oxide-pgdiff dump app --schema public
//!
//! # Bring `app` in line with a description and apply the result
//! oxide-pgdiff diff app app.yaml --update
//! ```

pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod executor;

pub use config::{Config, ConnectionConfig, OptionsConfig};
pub use connection::{connect, load_catalog, CatalogSnapshot};
pub use error::{DiffError, Result};
pub use executor::{apply, render_script};

/// Re-exports of commonly used types.
pub mod prelude {
    pub use crate::cli::{Cli, Commands};
    pub use crate::config::Config;
    pub use crate::connection::CatalogSnapshot;
    pub use crate::error::{DiffError, Result};
    pub use oxide_pgdiff_core::prelude::*;
}
