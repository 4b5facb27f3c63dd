//! Database connection pool setup

use std::time::Duration;

use prospect_common::{SyncError, SyncResult};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde::Deserialize;

/// Connection pool options for one database
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    /// Seconds
    pub connect_timeout: u64,
    /// Seconds
    pub acquire_timeout: u64,
    /// Seconds
    pub idle_timeout: u64,
    /// Seconds
    pub max_lifetime: u64,
    /// Seconds one statement may run before it counts as a connectivity failure
    pub statement_timeout: u64,
    pub sqlx_logging: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 1,
            connect_timeout: 30,
            acquire_timeout: 8,
            idle_timeout: 10,
            max_lifetime: 1800,
            statement_timeout: 60,
            sqlx_logging: false,
        }
    }
}

/// Open a pooled connection. Failures are connectivity errors.
pub async fn connect(url: &str, pool: &PoolSettings) -> SyncResult<DatabaseConnection> {
    if url.is_empty() {
        return Err(SyncError::configuration("database url is not set"));
    }

    let mut opt = ConnectOptions::new(url.to_string());

    opt.max_connections(pool.max_connections)
        .min_connections(pool.min_connections)
        .connect_timeout(Duration::from_secs(pool.connect_timeout))
        .acquire_timeout(Duration::from_secs(pool.acquire_timeout))
        .idle_timeout(Duration::from_secs(pool.idle_timeout))
        .max_lifetime(Duration::from_secs(pool.max_lifetime))
        .sqlx_logging(pool.sqlx_logging)
        .sqlx_logging_level(tracing::log::LevelFilter::Debug);

    tracing::info!(
        max_connections = pool.max_connections,
        min_connections = pool.min_connections,
        connect_timeout = pool.connect_timeout,
        idle_timeout = pool.idle_timeout,
        max_lifetime = pool.max_lifetime,
        statement_timeout = pool.statement_timeout,
        "Database connection pool configured"
    );

    Database::connect(opt).await.map_err(SyncError::connectivity)
}

impl PoolSettings {
    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout)
    }
}
