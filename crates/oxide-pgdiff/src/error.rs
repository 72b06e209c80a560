//! Error types for the command-line driver.

use std::path::PathBuf;

use oxide_pgdiff_core::CatalogError;

/// Errors that can occur while dumping or diffing a live database.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// The catalog tree could not be loaded, diffed or serialized.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Database error while querying the catalog or applying statements.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The server refused or never answered the connection.
    #[error("could not connect to database {target}: {source}")]
    Connect {
        /// `host:port/dbname` that was tried.
        target: String,
        /// The driver error.
        source: sqlx::Error,
    },

    /// The configuration file is not valid YAML or has the wrong shape.
    #[error("Failed to parse configuration file '{path}': {source}")]
    Config {
        /// Path to the configuration file.
        path: PathBuf,
        /// The parser error.
        source: serde_yaml::Error,
    },

    /// No database name was given on the command line or in the
    /// configuration.
    #[error("No database name given")]
    MissingDatabase,

    /// IO error (reading configuration, writing output).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, DiffError>;

impl DiffError {
    /// Returns `true` for failures to reach the server.
    #[must_use]
    pub const fn is_connect(&self) -> bool {
        matches!(self, Self::Connect { .. })
    }
}
