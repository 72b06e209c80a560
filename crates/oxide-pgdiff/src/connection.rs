//! PostgreSQL connectivity.
//!
//! Catalog loading in the core crate is synchronous, so the driver runs
//! every catalog query up front and serves the rows from memory.

use std::collections::HashMap;

use oxide_pgdiff_core::catalog::{required_queries, MIN_SERVER_VERSION};
use oxide_pgdiff_core::{CatalogError, CatalogSource, Database};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::error::{DiffError, Result};

/// Opens a single-connection pool to the configured database.
pub async fn connect(config: &ConnectionConfig) -> Result<PgPool> {
    let dbname = config.dbname.as_deref().ok_or(DiffError::MissingDatabase)?;
    let mut options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(dbname);
    if let Some(username) = &config.username {
        options = options.username(username);
    }
    if let Some(password) = &config.password {
        options = options.password(password);
    }

    let target = config.target();
    debug!(database = %target, "Connecting");
    PgPoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|source| DiffError::Connect { target, source })
}

/// The answers to every catalog query, fetched ahead of loading.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    version: u32,
    rows: HashMap<String, Vec<String>>,
}

impl CatalogSnapshot {
    /// Builds a snapshot from rows already in hand.
    #[must_use]
    pub fn new(version: u32, rows: HashMap<String, Vec<String>>) -> Self {
        Self { version, rows }
    }

    /// Runs the catalog queries for the connected server's version.
    pub async fn prefetch(pool: &PgPool) -> Result<Self> {
        let version: i32 = sqlx::query_scalar("SELECT current_setting('server_version_num')::int")
            .fetch_one(pool)
            .await?;
        let version = u32::try_from(version).unwrap_or_default();
        if version < MIN_SERVER_VERSION {
            return Err(CatalogError::Source(format!(
                "server version {version} is not supported (minimum {MIN_SERVER_VERSION})"
            ))
            .into());
        }
        info!(version, "Reading catalogs");

        let mut rows = HashMap::new();
        for query in required_queries(version) {
            let result: Vec<String> = sqlx::query_scalar(&query).fetch_all(pool).await?;
            debug!(rows = result.len(), "Fetched catalog rows");
            rows.insert(query, result);
        }
        Ok(Self { version, rows })
    }

    /// Loads the catalog tree out of the snapshot.
    pub fn load(&self) -> Result<Database> {
        Ok(Database::from_catalog(self)?)
    }
}

impl CatalogSource for CatalogSnapshot {
    fn server_version(&self) -> u32 {
        self.version
    }

    fn fetch(&self, query: &str) -> oxide_pgdiff_core::Result<Vec<String>> {
        self.rows
            .get(query)
            .cloned()
            .ok_or_else(|| CatalogError::Source(format!("query was not prefetched: {query}")))
    }
}

/// Connects, reads the catalogs and returns the tree together with the
/// pool for later use.
pub async fn load_catalog(config: &ConnectionConfig) -> Result<(PgPool, Database)> {
    let pool = connect(config).await?;
    let snapshot = CatalogSnapshot::prefetch(&pool).await?;
    let db = snapshot.load()?;
    info!(objects = db.object_count(), "Loaded catalog");
    Ok((pool, db))
}
