//! Common test utilities for reconciliation tests
//!
//! This module provides shared test infrastructure including:
//! - Failure-injecting wrappers around the in-memory stores and the local filesystem
//! - A static blob source recording every fetched URL
//! - `Harness`: one region wired against a temporary target root

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::MAIN_SEPARATOR;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use prospect_common::{NaturalKey, PathTranslator, StorageLayout, SyncError, SyncResult};
use prospect_persistence::{
    ChangeLogEntry, ChangeLogStore, DocumentRecord, DocumentStore, MemoryChangeLog,
    MemoryDocumentStore, OperationKind,
};
use prospect_sync::{
    BlobSource, FileStore, LocalFileStore, LocationResolver, PrefixResolver, RegionDispatcher,
    SagaContext, SourceStores, StaticSourceConnector, TargetStores,
};
use tempfile::TempDir;

pub const REGION: &str = "east";
pub const SOURCE_ROOT: &str = "/root";
pub const BASE_URL: &str = "http://src/";
pub const PUBLISH_PREFIX: &str = "ftp://10.0.0.8/files";
pub const OWNER_UNIT: &str = "U1";
pub const WELL_ID: &str = "W100";

pub fn key(document: &str) -> NaturalKey {
    NaturalKey::new(OWNER_UNIT, WELL_ID, document)
}

pub fn entry(sequence: i64, document: &str, operation: OperationKind) -> ChangeLogEntry {
    ChangeLogEntry::new(key(document), sequence, operation)
}

fn injected(what: &str) -> SyncError {
    SyncError::connectivity(format!("injected {} failure", what))
}

// ============================================================================
// Failure-injecting stores
// ============================================================================

#[derive(Default)]
pub struct FlakyChangeLog {
    pub inner: MemoryChangeLog,
    pub fail_poll: AtomicBool,
    pub fail_remove: AtomicBool,
}

#[async_trait]
impl ChangeLogStore for FlakyChangeLog {
    async fn pending_entries(&self) -> SyncResult<Vec<ChangeLogEntry>> {
        if self.fail_poll.load(Ordering::SeqCst) {
            return Err(injected("poll"));
        }
        self.inner.pending_entries().await
    }

    async fn remove_entry(&self, sequence: i64) -> SyncResult<()> {
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(injected("log remove"));
        }
        self.inner.remove_entry(sequence).await
    }
}

#[derive(Default)]
pub struct FlakyDocumentStore {
    pub inner: MemoryDocumentStore,
    pub fail_find: AtomicBool,
    pub fail_insert: AtomicBool,
    pub fail_delete: AtomicBool,
}

#[async_trait]
impl DocumentStore for FlakyDocumentStore {
    async fn find_document(&self, key: &NaturalKey) -> SyncResult<Option<DocumentRecord>> {
        if self.fail_find.load(Ordering::SeqCst) {
            return Err(injected("find"));
        }
        self.inner.find_document(key).await
    }

    async fn document_exists(&self, key: &NaturalKey) -> SyncResult<bool> {
        if self.fail_find.load(Ordering::SeqCst) {
            return Err(injected("exists"));
        }
        self.inner.document_exists(key).await
    }

    async fn insert_document(&self, record: &DocumentRecord) -> SyncResult<()> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(injected("insert"));
        }
        self.inner.insert_document(record).await
    }

    async fn delete_document(&self, key: &NaturalKey) -> SyncResult<u64> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(injected("delete"));
        }
        self.inner.delete_document(key).await
    }
}

#[derive(Default)]
pub struct FlakyFileStore {
    pub inner: LocalFileStore,
    pub fail_write: AtomicBool,
    pub fail_remove: AtomicBool,
}

#[async_trait]
impl FileStore for FlakyFileStore {
    async fn write(&self, path: &str, contents: Bytes) -> SyncResult<()> {
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(injected("write"));
        }
        self.inner.write(path, contents).await
    }

    async fn remove(&self, path: &str) -> SyncResult<bool> {
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(SyncError::Filesystem(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "injected remove failure",
            )));
        }
        self.inner.remove(path).await
    }
}

/// Serves registered blobs; any other URL is not found
#[derive(Default)]
pub struct StaticBlobSource {
    blobs: Mutex<HashMap<String, Bytes>>,
    requests: Mutex<Vec<String>>,
    pub unauthorized: AtomicBool,
}

impl StaticBlobSource {
    pub fn put(&self, url: &str, contents: &'static [u8]) {
        self.blobs
            .lock()
            .insert(url.to_string(), Bytes::from_static(contents));
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl BlobSource for StaticBlobSource {
    async fn fetch(&self, url: &str) -> SyncResult<Bytes> {
        self.requests.lock().push(url.to_string());
        if self.unauthorized.load(Ordering::SeqCst) {
            return Err(SyncError::Unauthorized(format!("GET {} rejected", url)));
        }
        self.blobs
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| SyncError::not_found(format!("GET {}: no such blob", url)))
    }
}

/// Prefix resolver that counts invalidations
pub struct RecordingResolver {
    inner: PrefixResolver,
    pub invalidations: AtomicUsize,
}

#[async_trait]
impl LocationResolver for RecordingResolver {
    async fn resolve(&self, raw_location: &str) -> SyncResult<String> {
        self.inner.resolve(raw_location).await
    }

    fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

// ============================================================================
// Harness
// ============================================================================

/// One region against a temporary target root
pub struct Harness {
    pub dir: TempDir,
    pub root: String,
    pub source_log: Arc<FlakyChangeLog>,
    pub source_docs: Arc<FlakyDocumentStore>,
    pub target_docs: Arc<FlakyDocumentStore>,
    pub files: Arc<FlakyFileStore>,
    pub blobs: Arc<StaticBlobSource>,
    pub resolver: Arc<RecordingResolver>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let root = dir.path().to_string_lossy().into_owned();

        Self {
            dir,
            root,
            source_log: Arc::new(FlakyChangeLog::default()),
            source_docs: Arc::new(FlakyDocumentStore::default()),
            target_docs: Arc::new(FlakyDocumentStore::default()),
            files: Arc::new(FlakyFileStore::default()),
            blobs: Arc::new(StaticBlobSource::default()),
            resolver: Arc::new(RecordingResolver {
                inner: PrefixResolver::new(BASE_URL, SOURCE_ROOT).expect("valid resolver"),
                invalidations: AtomicUsize::new(0),
            }),
        }
    }

    /// Source row and blob for `document`, stored at `/root/<document>`
    pub async fn with_source_document(&self, document: &str, contents: &'static [u8]) {
        let location = format!("{}/{}", SOURCE_ROOT, document);
        self.source_docs
            .inner
            .insert_document(&DocumentRecord {
                document_type: Some("logging".to_string()),
                note: Some("v1".to_string()),
                ..DocumentRecord::new(key(document), location)
            })
            .await
            .expect("seed source record");
        self.blobs.put(&format!("{}{}", BASE_URL, document), contents);
    }

    pub fn log(&self, entry: ChangeLogEntry) {
        self.source_log.inner.push(entry);
    }

    pub fn storage_path(&self, document: &str) -> String {
        let sep = MAIN_SEPARATOR.to_string();
        [self.root.as_str(), "cnpc_east", "W10", WELL_ID, document].join(&sep)
    }

    pub fn published_path(&self, document: &str) -> String {
        format!("{}/cnpc_east/W10/{}/{}", PUBLISH_PREFIX, WELL_ID, document)
    }

    pub fn file_contents(&self, document: &str) -> Option<Vec<u8>> {
        std::fs::read(self.storage_path(document)).ok()
    }

    pub fn target_rows(&self, document: &str) -> usize {
        self.target_docs.inner.count(&key(document))
    }

    pub fn source_stores(&self) -> SourceStores {
        SourceStores {
            change_log: self.source_log.clone(),
            documents: self.source_docs.clone(),
        }
    }

    pub fn target_stores(&self) -> TargetStores {
        TargetStores {
            documents: self.target_docs.clone(),
            files: self.files.clone(),
            translator: PathTranslator::new(&self.root, PUBLISH_PREFIX, MAIN_SEPARATOR),
            layout: StorageLayout::new(&self.root, "cnpc_", MAIN_SEPARATOR),
        }
    }

    pub fn context(&self) -> SagaContext {
        SagaContext {
            region: REGION.to_string(),
            source: self.source_stores(),
            target: self.target_stores(),
            resolver: self.resolver.clone(),
            blobs: self.blobs.clone(),
        }
    }

    pub fn dispatcher(&self) -> RegionDispatcher {
        RegionDispatcher::new(
            REGION,
            Arc::new(StaticSourceConnector::new(self.source_stores())),
            self.resolver.clone(),
            self.blobs.clone(),
            self.target_stores(),
        )
    }
}

pub fn set(flag: &AtomicBool, value: bool) {
    flag.store(value, Ordering::SeqCst);
}
