//! Cycle Orchestrator
//!
//! Owns one dispatcher per region plus the target handles they share, and fans
//! each cycle out so that every region runs as its own task.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use prospect_common::SyncResult;
use prospect_persistence::{SqlDocumentStore, connect};
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info};

use crate::dispatcher::RegionDispatcher;
use crate::report::RegionReport;
use crate::resolver::resolver_for;
use crate::saga::TargetStores;
use crate::settings::EngineSettings;
use crate::source::SqlSourceConnector;
use crate::transfer::{HttpBlobSource, LocalFileStore, http_client};

pub struct Orchestrator {
    dispatchers: Vec<Arc<RegionDispatcher>>,
    in_flight: Mutex<JoinSet<RegionReport>>,
}

impl Orchestrator {
    pub fn new(dispatchers: Vec<RegionDispatcher>) -> Self {
        Self {
            dispatchers: dispatchers.into_iter().map(Arc::new).collect(),
            in_flight: Mutex::new(JoinSet::new()),
        }
    }

    /// Validate settings, connect the target store and build every region's dispatcher.
    ///
    /// Source databases are connected lazily by each region's first cycle.
    pub async fn connect(settings: &EngineSettings) -> SyncResult<Self> {
        settings.validate()?;

        let target_db = connect(&settings.target.db.url, &settings.target.db.pool).await?;
        info!(root = %settings.target.root_dir, "Connected to target database");

        let target = TargetStores {
            documents: Arc::new(SqlDocumentStore::new(
                target_db,
                &settings.target.db.document_table,
                settings.target.db.pool.statement_timeout(),
            )),
            files: Arc::new(LocalFileStore::new()),
            translator: settings.target.translator(),
            layout: settings.target.layout(&settings.sync.naming_prefix),
        };

        let client = http_client(
            Duration::from_secs(settings.sync.connect_timeout_secs),
            Duration::from_secs(settings.sync.request_timeout_secs),
        )?;
        let blobs = Arc::new(HttpBlobSource::new(client.clone()));

        let mut dispatchers = Vec::with_capacity(settings.regions.len());
        for region in &settings.regions {
            let resolver = resolver_for(region, client.clone())?;
            info!(region = %region.name, resolver = resolver.name(), "Region configured");

            let dispatcher = RegionDispatcher::new(
                &region.name,
                Arc::new(SqlSourceConnector::new(&region.name, region.db.clone())),
                resolver,
                blobs.clone(),
                target.clone(),
            )
            .with_dead_letter_after(settings.sync.dead_letter_after);
            dispatchers.push(dispatcher);
        }

        Ok(Self::new(dispatchers))
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.dispatchers.iter().map(|d| d.region())
    }

    /// Start a cycle for every region without waiting for it to finish.
    ///
    /// A region still busy with the previous trigger reports itself skipped;
    /// a slow region never delays the others' next trigger.
    pub async fn trigger(&self) {
        let mut in_flight = self.in_flight.lock().await;
        while let Some(joined) = in_flight.try_join_next() {
            log_join(joined);
        }

        for dispatcher in &self.dispatchers {
            let dispatcher = dispatcher.clone();
            in_flight.spawn(async move { dispatcher.run_cycle().await });
        }
    }

    /// Run one cycle for every region concurrently and wait for all of them
    pub async fn run_cycle(&self) -> Vec<RegionReport> {
        let handles: Vec<_> = self
            .dispatchers
            .iter()
            .map(|dispatcher| {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move { dispatcher.run_cycle().await })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(&self.dispatchers)
            .map(|(joined, dispatcher)| {
                joined.unwrap_or_else(|e| {
                    error!(region = %dispatcher.region(), error = %e, "Region cycle task failed");
                    RegionReport::crashed(dispatcher.region(), e.to_string())
                })
            })
            .collect()
    }

    /// Wait for cycles started by [`Orchestrator::trigger`] to finish
    pub async fn wait_idle(&self) {
        let mut in_flight = self.in_flight.lock().await;
        while let Some(joined) = in_flight.join_next().await {
            log_join(joined);
        }
    }
}

fn log_join(joined: Result<RegionReport, JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Region cycle task failed");
    }
}
