//! Change-log persistence trait

use async_trait::async_trait;
use prospect_common::SyncResult;

use crate::model::ChangeLogEntry;

/// Access to one region's change-log relation
#[async_trait]
pub trait ChangeLogStore: Send + Sync {
    /// All pending entries ordered by ascending sequence
    async fn pending_entries(&self) -> SyncResult<Vec<ChangeLogEntry>>;

    /// Remove the entry with the given sequence.
    ///
    /// Removing an entry that is already gone is not an error.
    async fn remove_entry(&self, sequence: i64) -> SyncResult<()>;
}
