//! Reconciliation Dispatcher
//!
//! Drives one region's cycle: connect, prepare the resolver, poll, then apply
//! every entry strictly in sequence order. An entry's failure is recorded and
//! the next entry proceeds; only failures before the first entry abort the
//! cycle.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use prospect_common::{SyncError, SyncResult};
use prospect_persistence::{ChangeLogEntry, OperationKind};
use tracing::{Instrument, error, info, info_span, warn};

use crate::metrics;
use crate::poller;
use crate::report::{CycleStatus, EntryOutcome, EntryResult, RegionReport};
use crate::resolver::LocationResolver;
use crate::saga::{self, SagaContext, TargetStores};
use crate::source::SourceConnector;
use crate::transfer::BlobSource;

/// Target used for dead-letter reports, routed to their own log file
pub const DEAD_LETTER_TARGET: &str = "prospect_sync::dead_letter";

/// Default consecutive permanent failures before an entry is dead-lettered
pub const DEFAULT_DEAD_LETTER_AFTER: u32 = 5;

/// Long-lived driver of one region
pub struct RegionDispatcher {
    region: String,
    connector: Arc<dyn SourceConnector>,
    resolver: Arc<dyn LocationResolver>,
    blobs: Arc<dyn BlobSource>,
    target: TargetStores,
    dead_letter_after: u32,
    /// Consecutive permanent failures per sequence, across cycles
    attempts: Mutex<HashMap<i64, u32>>,
    running: tokio::sync::Mutex<()>,
}

impl RegionDispatcher {
    pub fn new(
        region: impl Into<String>,
        connector: Arc<dyn SourceConnector>,
        resolver: Arc<dyn LocationResolver>,
        blobs: Arc<dyn BlobSource>,
        target: TargetStores,
    ) -> Self {
        Self {
            region: region.into(),
            connector,
            resolver,
            blobs,
            target,
            dead_letter_after: DEFAULT_DEAD_LETTER_AFTER,
            attempts: Mutex::new(HashMap::new()),
            running: tokio::sync::Mutex::new(()),
        }
    }

    /// Set the dead-letter threshold; 0 keeps failing entries forever
    pub fn with_dead_letter_after(mut self, dead_letter_after: u32) -> Self {
        self.dead_letter_after = dead_letter_after;
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Run one cycle for this region.
    ///
    /// Returns a skipped report when the previous cycle is still running, so
    /// two cycles never interleave entries of the same region.
    pub async fn run_cycle(&self) -> RegionReport {
        let Ok(_running) = self.running.try_lock() else {
            warn!(region = %self.region, "Previous cycle still running, skipping trigger");
            return RegionReport::skipped(&self.region);
        };

        let started = Instant::now();
        info!(region = %self.region, "Sync cycle started");

        let (status, entries) = match self.drain().await {
            Ok(entries) => (CycleStatus::Completed, entries),
            Err(err) => {
                error!(region = %self.region, error = %err, "Sync cycle aborted");
                (CycleStatus::Aborted(err), Vec::new())
            }
        };

        let elapsed = started.elapsed();
        metrics::record_cycle_duration(&self.region, elapsed);

        let report = RegionReport {
            region: self.region.clone(),
            status,
            entries,
            elapsed,
        };
        info!(
            region = %self.region,
            applied = report.applied(),
            converged = report.converged(),
            failed = report.failed(),
            dead_lettered = report.dead_lettered(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Sync cycle finished"
        );
        report
    }

    async fn drain(&self) -> SyncResult<Vec<EntryOutcome>> {
        let source = self.connector.connect().await?;
        self.resolver.prepare().await?;

        let entries = poller::poll(&self.region, source.change_log.as_ref()).await?;

        let ctx = SagaContext {
            region: self.region.clone(),
            source,
            target: self.target.clone(),
            resolver: self.resolver.clone(),
            blobs: self.blobs.clone(),
        };

        let pending: HashSet<i64> = entries.iter().map(|e| e.sequence).collect();
        let mut outcomes = Vec::with_capacity(entries.len());
        for entry in entries {
            outcomes.push(self.dispatch(&ctx, entry).await);
        }

        // Counters of entries that left the log some other way are stale
        self.attempts.lock().retain(|sequence, _| pending.contains(sequence));

        Ok(outcomes)
    }

    async fn dispatch(&self, ctx: &SagaContext, entry: ChangeLogEntry) -> EntryOutcome {
        let span = info_span!(
            "entry",
            region = %self.region,
            sequence = entry.sequence,
            op = %entry.operation,
            well_id = %entry.key.well_id,
            document = %entry.key.document_name
        );

        let applied = async {
            match &entry.operation {
                OperationKind::Insert => saga::apply_insert(ctx, &entry).await,
                OperationKind::Delete => saga::apply_delete(ctx, &entry).await,
                OperationKind::Update => saga::apply_update(ctx, &entry).await,
                OperationKind::Unknown(code) => Err(SyncError::UnknownOperation(code.clone())),
            }
        }
        .instrument(span.clone())
        .await;

        let result = match applied {
            Ok(outcome) => {
                self.attempts.lock().remove(&entry.sequence);
                EntryResult::from(outcome)
            }
            Err(err) => self.settle_failure(ctx, &entry, err).instrument(span).await,
        };

        metrics::record_entry(&self.region, entry.operation.as_str(), result.label());

        EntryOutcome {
            sequence: entry.sequence,
            key: entry.key,
            operation: entry.operation,
            result,
        }
    }

    /// Decide whether a failed entry stays for the next cycle or is dead-lettered
    async fn settle_failure(
        &self,
        ctx: &SagaContext,
        entry: &ChangeLogEntry,
        err: SyncError,
    ) -> EntryResult {
        if !err.is_permanent() || self.dead_letter_after == 0 {
            self.attempts.lock().remove(&entry.sequence);
            error!(error = %err, kind = err.kind(), "Entry failed, retained for next cycle");
            return EntryResult::Failed(err);
        }

        let attempts = {
            let mut counts = self.attempts.lock();
            let count = counts.entry(entry.sequence).or_insert(0);
            *count += 1;
            *count
        };

        if attempts < self.dead_letter_after {
            warn!(
                error = %err,
                attempts,
                limit = self.dead_letter_after,
                "Entry failed permanently, retained for next cycle"
            );
            return EntryResult::Failed(err);
        }

        if let Err(remove_err) = ctx.source.change_log.remove_entry(entry.sequence).await {
            error!(
                error = %err,
                remove_error = %remove_err,
                "Failed to dead-letter entry, retained for next cycle"
            );
            return EntryResult::Failed(err);
        }

        self.attempts.lock().remove(&entry.sequence);
        error!(
            target: DEAD_LETTER_TARGET,
            region = %self.region,
            sequence = entry.sequence,
            op = entry.operation.code(),
            owner_unit = %entry.key.owner_unit,
            well_id = %entry.key.well_id,
            document = %entry.key.document_name,
            attempts,
            error = %err,
            "Dropped change-log entry after repeated permanent failures"
        );
        metrics::record_dead_letter(&self.region);

        EntryResult::DeadLettered(err)
    }
}
