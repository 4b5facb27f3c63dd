//! Document metadata persistence trait

use async_trait::async_trait;
use prospect_common::{NaturalKey, SyncResult};

use crate::model::DocumentRecord;

/// Document metadata operations keyed by natural key
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Find the record for a key, `None` when absent
    async fn find_document(&self, key: &NaturalKey) -> SyncResult<Option<DocumentRecord>>;

    /// Whether any record exists for a key
    async fn document_exists(&self, key: &NaturalKey) -> SyncResult<bool>;

    /// Insert a record
    async fn insert_document(&self, record: &DocumentRecord) -> SyncResult<()>;

    /// Delete every record for a key, returning how many were removed
    async fn delete_document(&self, key: &NaturalKey) -> SyncResult<u64>;
}
