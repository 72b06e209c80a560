//! Configuration file support.
//!
//! A configuration file carries connection settings and default options
//! so they need not be repeated on every invocation:
//!
//! ```yaml
//! connection:
//!   host: db.internal
//!   port: 5433
//!   username: deploy
//!   dbname: app
//! options:
//!   schemas: [public, billing]
//!   no_owner: true
//! ```
//!
//! Command-line flags always win over values read here.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DiffError, Result};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where to connect.
    pub connection: ConnectionConfig,

    /// Selection and output options.
    pub options: OptionsConfig,
}

/// PostgreSQL connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Server host name or socket directory (default: localhost).
    pub host: String,

    /// Server port (default: 5432).
    pub port: u16,

    /// Role to connect as. Falls back to the driver's default.
    pub username: Option<String>,

    /// Password. Usually better left to `PGPASSWORD`.
    pub password: Option<String>,

    /// Database name.
    pub dbname: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: None,
            password: None,
            dbname: None,
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

const fn default_port() -> u16 {
    5432
}

/// Which objects to consider and how to present the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsConfig {
    /// Schemas to include (all when empty).
    pub schemas: Vec<String>,

    /// Schemas to leave out.
    pub exclude_schemas: Vec<String>,

    /// Tables to include (all when empty).
    pub tables: Vec<String>,

    /// Ignore ownership.
    pub no_owner: bool,

    /// Ignore privileges.
    pub no_privs: bool,

    /// Generate statements that undo the changes.
    pub revert: bool,

    /// Wrap generated statements in `BEGIN`/`COMMIT`.
    pub single_transaction: bool,

    /// Directory for the one-file-per-object layout.
    pub multiple_files: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = Self::from_yaml(&content).map_err(|source| DiffError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parses configuration from a YAML string. An empty document yields
    /// the defaults.
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }
}

impl ConnectionConfig {
    /// `host:port/dbname`, for messages.
    #[must_use]
    pub fn target(&self) -> String {
        format!(
            "{}:{}/{}",
            self.host,
            self.port,
            self.dbname.as_deref().unwrap_or("")
        )
    }
}
