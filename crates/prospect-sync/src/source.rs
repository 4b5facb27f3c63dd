//! Source database connection per region

use std::sync::Arc;

use async_trait::async_trait;
use prospect_common::SyncResult;
use prospect_persistence::sea_orm::DatabaseConnection;
use prospect_persistence::{SqlChangeLog, SqlDocumentStore, connect};
use tokio::sync::Mutex;
use tracing::info;

use crate::saga::SourceStores;
use crate::settings::SourceDbSettings;

/// Yields the stores of one region's source database
#[async_trait]
pub trait SourceConnector: Send + Sync {
    async fn connect(&self) -> SyncResult<SourceStores>;
}

/// Connects lazily on first use and keeps the pool for later cycles.
///
/// A failed connect leaves nothing cached, so the next cycle tries again.
pub struct SqlSourceConnector {
    region: String,
    settings: SourceDbSettings,
    connection: Mutex<Option<DatabaseConnection>>,
}

impl SqlSourceConnector {
    pub fn new(region: impl Into<String>, settings: SourceDbSettings) -> Self {
        Self {
            region: region.into(),
            settings,
            connection: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SourceConnector for SqlSourceConnector {
    async fn connect(&self) -> SyncResult<SourceStores> {
        let mut connection = self.connection.lock().await;

        let db = match connection.as_ref() {
            Some(db) => db.clone(),
            None => {
                let db = connect(&self.settings.url, &self.settings.pool).await?;
                info!(region = %self.region, "Connected to source database");
                *connection = Some(db.clone());
                db
            }
        };

        let statement_timeout = self.settings.pool.statement_timeout();
        Ok(SourceStores {
            change_log: Arc::new(SqlChangeLog::new(
                db.clone(),
                &self.settings.log_table,
                statement_timeout,
            )),
            documents: Arc::new(SqlDocumentStore::new(
                db,
                &self.settings.document_table,
                statement_timeout,
            )),
        })
    }
}

/// Fixed stores, for backends that need no connection step
pub struct StaticSourceConnector {
    stores: SourceStores,
}

impl StaticSourceConnector {
    pub fn new(stores: SourceStores) -> Self {
        Self { stores }
    }
}

#[async_trait]
impl SourceConnector for StaticSourceConnector {
    async fn connect(&self) -> SyncResult<SourceStores> {
        Ok(self.stores.clone())
    }
}
