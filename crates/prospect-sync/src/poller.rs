//! Change Log Poller

use prospect_common::SyncResult;
use prospect_persistence::{ChangeLogEntry, ChangeLogStore};
use tracing::{info, warn};

/// Read a region's pending entries in ascending sequence order.
///
/// Backends already order by sequence; a backend that does not is sorted
/// here with a stable sort so ties keep their stored order.
pub async fn poll(region: &str, log: &dyn ChangeLogStore) -> SyncResult<Vec<ChangeLogEntry>> {
    let mut entries = log.pending_entries().await?;

    if !entries.windows(2).all(|w| w[0].sequence <= w[1].sequence) {
        warn!(region, "Change log returned entries out of sequence order");
        entries.sort_by_key(|e| e.sequence);
    }

    info!(region, count = entries.len(), "Polled change log");
    Ok(entries)
}
