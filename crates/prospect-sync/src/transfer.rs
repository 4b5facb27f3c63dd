//! Blob transfer and target filesystem surface

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use prospect_common::{SyncError, SyncResult};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

/// Build the HTTP client shared by every region's blob source and gateway
pub fn http_client(connect_timeout: Duration, request_timeout: Duration) -> SyncResult<Client> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .build()
        .map_err(|e| SyncError::configuration(format!("http client: {}", e)))
}

/// Source of document bytes
#[async_trait]
pub trait BlobSource: Send + Sync {
    async fn fetch(&self, url: &str) -> SyncResult<Bytes>;
}

/// Plain HTTP GET
pub struct HttpBlobSource {
    client: Client,
}

impl HttpBlobSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BlobSource for HttpBlobSource {
    async fn fetch(&self, url: &str) -> SyncResult<Bytes> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::connectivity(format!("GET {}: {}", url, e)))?;

        let status = response.status();
        match status {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SyncError::Unauthorized(format!(
                    "GET {} rejected with status {}",
                    url, status
                )));
            }
            StatusCode::NOT_FOUND => {
                return Err(SyncError::not_found(format!("GET {}: no such blob", url)));
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                return Err(SyncError::connectivity(format!(
                    "GET {} failed with status {}: {}",
                    url, status, body
                )));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SyncError::connectivity(format!("GET {}: {}", url, e)))?;
        debug!(url, size = bytes.len(), "Fetched blob");
        Ok(bytes)
    }
}

/// Target filesystem operations used by the sagas
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Write `contents` to `path`, creating parent directories on demand and
    /// replacing any existing file
    async fn write(&self, path: &str, contents: Bytes) -> SyncResult<()>;

    /// Remove the file at `path`. Returns `false` when it was already absent.
    async fn remove(&self, path: &str) -> SyncResult<bool>;
}

/// Local (or mounted) filesystem
#[derive(Debug, Default, Clone)]
pub struct LocalFileStore;

impl LocalFileStore {
    pub fn new() -> Self {
        Self
    }

    fn partial_path(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{}.part", name))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn write(&self, path: &str, contents: Bytes) -> SyncResult<()> {
        let path = Path::new(path);
        if path.file_name().is_none() {
            return Err(SyncError::transform(format!(
                "storage path '{}' has no file name",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write beside the destination and rename, so a torn download never
        // sits at the storage path
        let partial = Self::partial_path(path);
        if let Err(e) = tokio::fs::write(&partial, &contents).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&partial, path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }

        debug!(path = %path.display(), size = contents.len(), "Wrote file");
        Ok(())
    }

    async fn remove(&self, path: &str) -> SyncResult<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(path, "Removed file");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path, "File already absent");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}
