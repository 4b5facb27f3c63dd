// In-memory persistence backend
// Holds change-log entries and document rows in process memory; the
// reference backend for reconciliation tests

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;
use prospect_common::{NaturalKey, SyncResult};

use crate::model::{ChangeLogEntry, DocumentRecord};
use crate::traits::{ChangeLogStore, DocumentStore};

/// Change log kept in sequence order
#[derive(Default)]
pub struct MemoryChangeLog {
    entries: Mutex<BTreeMap<i64, ChangeLogEntry>>,
}

impl MemoryChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: impl IntoIterator<Item = ChangeLogEntry>) -> Self {
        let log = Self::new();
        for entry in entries {
            log.push(entry);
        }
        log
    }

    pub fn push(&self, entry: ChangeLogEntry) {
        self.entries.lock().insert(entry.sequence, entry);
    }

    pub fn contains(&self, sequence: i64) -> bool {
        self.entries.lock().contains_key(&sequence)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl ChangeLogStore for MemoryChangeLog {
    async fn pending_entries(&self) -> SyncResult<Vec<ChangeLogEntry>> {
        Ok(self.entries.lock().values().cloned().collect())
    }

    async fn remove_entry(&self, sequence: i64) -> SyncResult<()> {
        self.entries.lock().remove(&sequence);
        Ok(())
    }
}

/// Document rows keyed by natural key.
///
/// Like a relation without a unique constraint, it accepts several rows for
/// one key, which lets callers observe duplicates they failed to prevent.
#[derive(Default)]
pub struct MemoryDocumentStore {
    rows: Mutex<HashMap<NaturalKey, Vec<DocumentRecord>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows stored for a key
    pub fn count(&self, key: &NaturalKey) -> usize {
        self.rows.lock().get(key).map_or(0, Vec::len)
    }

    /// All rows stored for a key
    pub fn records(&self, key: &NaturalKey) -> Vec<DocumentRecord> {
        self.rows.lock().get(key).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find_document(&self, key: &NaturalKey) -> SyncResult<Option<DocumentRecord>> {
        Ok(self
            .rows
            .lock()
            .get(key)
            .and_then(|rows| rows.first().cloned()))
    }

    async fn document_exists(&self, key: &NaturalKey) -> SyncResult<bool> {
        Ok(self.count(key) > 0)
    }

    async fn insert_document(&self, record: &DocumentRecord) -> SyncResult<()> {
        self.rows
            .lock()
            .entry(record.key.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn delete_document(&self, key: &NaturalKey) -> SyncResult<u64> {
        Ok(self
            .rows
            .lock()
            .remove(key)
            .map_or(0, |rows| rows.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OperationKind;

    fn key(doc: &str) -> NaturalKey {
        NaturalKey::new("U1", "W100", doc)
    }

    #[tokio::test]
    async fn test_change_log_orders_by_sequence() {
        let log = MemoryChangeLog::with_entries([
            ChangeLogEntry::new(key("b.pdf"), 9, OperationKind::Delete),
            ChangeLogEntry::new(key("a.pdf"), 2, OperationKind::Insert),
            ChangeLogEntry::new(key("c.pdf"), 5, OperationKind::Update),
        ]);

        let sequences: Vec<i64> = log
            .pending_entries()
            .await
            .unwrap()
            .iter()
            .map(|e| e.sequence)
            .collect();
        assert_eq!(sequences, vec![2, 5, 9]);

        log.remove_entry(5).await.unwrap();
        log.remove_entry(5).await.unwrap();
        assert!(!log.contains(5));
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn test_document_store_keeps_duplicates_visible() {
        let store = MemoryDocumentStore::new();
        let record = DocumentRecord::new(key("a.pdf"), "ftp://h/a.pdf");

        store.insert_document(&record).await.unwrap();
        store.insert_document(&record).await.unwrap();
        assert_eq!(store.count(&key("a.pdf")), 2);
        assert!(store.document_exists(&key("a.pdf")).await.unwrap());

        assert_eq!(store.delete_document(&key("a.pdf")).await.unwrap(), 2);
        assert_eq!(store.delete_document(&key("a.pdf")).await.unwrap(), 0);
        assert!(store.find_document(&key("a.pdf")).await.unwrap().is_none());
    }
}
