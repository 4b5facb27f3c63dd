//! Location resolvers
//!
//! Turn the raw location recorded in a region's source metadata into a URL the
//! blob source can fetch. Each region owns exactly one resolver, chosen from
//! its settings by [`resolver_for`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use prospect_common::{SyncError, SyncResult, strip_anchored};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::settings::{GatewaySettings, RegionSettings};

/// Token lifetime assumed when the login response carries no `expires_in`
const DEFAULT_TOKEN_TTL_SECS: u64 = 300;

/// Upper bound of the early-refresh margin applied to every token
const MAX_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Strategy turning a raw source location into a fetchable URL
#[async_trait]
pub trait LocationResolver: Send + Sync {
    /// Acquire whatever the resolver needs before a cycle starts
    async fn prepare(&self) -> SyncResult<()> {
        Ok(())
    }

    async fn resolve(&self, raw_location: &str) -> SyncResult<String>;

    /// Drop cached credentials after the blob source rejected them
    fn invalidate(&self) {}

    fn name(&self) -> &'static str;
}

/// Build the resolver a region's settings select
pub fn resolver_for(
    region: &RegionSettings,
    client: Client,
) -> SyncResult<Arc<dyn LocationResolver>> {
    match &region.gateway {
        Some(gateway) => Ok(Arc::new(GatewayResolver::new(gateway.clone(), client)?)),
        None => Ok(Arc::new(PrefixResolver::new(
            &region.base_url,
            &region.root_dir,
        )?)),
    }
}

// ============================================================================
// Prefix substitution
// ============================================================================

/// Replaces the region's root path prefix with its blob base URL
#[derive(Debug, Clone)]
pub struct PrefixResolver {
    base_url: Url,
    root_dir: String,
}

impl PrefixResolver {
    pub fn new(base_url: &str, root_dir: impl Into<String>) -> SyncResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            SyncError::configuration(format!("invalid base url '{}': {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::configuration(format!(
                "base url '{}' cannot carry a path",
                base_url
            )));
        }

        let root_dir = root_dir.into();
        if root_dir.is_empty() {
            return Err(SyncError::configuration("root path prefix is empty"));
        }

        Ok(Self { base_url, root_dir })
    }
}

#[async_trait]
impl LocationResolver for PrefixResolver {
    async fn resolve(&self, raw_location: &str) -> SyncResult<String> {
        let rest = strip_anchored(raw_location, &self.root_dir, &['/', '\\']).ok_or_else(|| {
            SyncError::transform(format!(
                "location '{}' does not start with root '{}'",
                raw_location, self.root_dir
            ))
        })?;

        let segments: Vec<&str> = rest.split(['/', '\\']).filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Err(SyncError::transform(format!(
                "location '{}' names no file below root '{}'",
                raw_location, self.root_dir
            )));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                SyncError::transform(format!("base url '{}' cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);

        Ok(url.to_string())
    }

    fn name(&self) -> &'static str {
        "prefix"
    }
}

// ============================================================================
// Token-gated gateway
// ============================================================================

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    scope: Option<String>,
}

/// Cached bearer token
#[derive(Clone, Debug)]
struct TokenInfo {
    access_token: String,
    refresh_at: Instant,
}

/// Rewrites bucket-style locations through an authenticated download gateway.
///
/// `http://host/bucket/a/b.pdf` is relocated to `https://bucket.host/a/b.pdf`
/// and handed to the gateway as `?access_token=..&url=..`.
pub struct GatewayResolver {
    client: Client,
    settings: GatewaySettings,
    download_url: Url,
    token: RwLock<Option<TokenInfo>>,
    login_lock: tokio::sync::Mutex<()>,
}

impl GatewayResolver {
    pub fn new(settings: GatewaySettings, client: Client) -> SyncResult<Self> {
        let download_url = Url::parse(&settings.download_url).map_err(|e| {
            SyncError::configuration(format!(
                "invalid gateway download url '{}': {}",
                settings.download_url, e
            ))
        })?;

        Ok(Self {
            client,
            settings,
            download_url,
            token: RwLock::new(None),
            login_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Get the cached token if it is not due for refresh
    fn cached_token(&self) -> Option<String> {
        self.token
            .read()
            .as_ref()
            .filter(|t| Instant::now() < t.refresh_at)
            .map(|t| t.access_token.clone())
    }

    fn set_token(&self, access_token: String, ttl: Duration) {
        let margin = MAX_REFRESH_MARGIN.min(ttl / 2);
        *self.token.write() = Some(TokenInfo {
            access_token,
            refresh_at: Instant::now() + ttl - margin,
        });
    }

    /// Log in to the gateway and cache the token
    async fn login(&self) -> SyncResult<()> {
        debug!(url = %self.settings.login_url, "Logging in to download gateway");

        let response = self
            .client
            .post(&self.settings.login_url)
            .form(&[
                ("grant_type", &self.settings.grant_type),
                ("client_id", &self.settings.client_id),
                ("client_secret", &self.settings.client_secret),
            ])
            .send()
            .await
            .map_err(|e| SyncError::connectivity(format!("gateway login: {}", e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SyncError::Unauthorized(format!(
                "gateway login rejected with status {}, check client credentials",
                status
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::connectivity(format!(
                "gateway login failed with status {}: {}",
                status, body
            )));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| SyncError::connectivity(format!("gateway login response: {}", e)))?;
        if login.access_token.is_empty() {
            return Err(SyncError::Unauthorized(
                "gateway login returned an empty access token".to_string(),
            ));
        }

        let ttl = login.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        info!(
            token_type = login.token_type.as_deref().unwrap_or("bearer"),
            scope = login.scope.as_deref().unwrap_or(""),
            expires_in = ttl,
            "Download gateway login succeeded"
        );
        self.set_token(login.access_token, Duration::from_secs(ttl));
        Ok(())
    }

    /// Ensure we have a valid token, logging in again if needed
    async fn ensure_token(&self) -> SyncResult<String> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let _login = self.login_lock.lock().await;
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        self.login().await?;
        self.cached_token().ok_or_else(|| {
            SyncError::Unauthorized("gateway token expired immediately after login".to_string())
        })
    }

    /// `http://host[:port]/bucket/rest?q` -> `https://bucket.host[:port]/rest?q`
    fn relocate(raw_location: &str) -> SyncResult<String> {
        let source = Url::parse(raw_location).map_err(|e| {
            SyncError::transform(format!("location '{}' is not a url: {}", raw_location, e))
        })?;
        if source.scheme() != "http" {
            return Err(SyncError::transform(format!(
                "scheme '{}' not handled: {}",
                source.scheme(),
                raw_location
            )));
        }

        let host = source
            .host_str()
            .ok_or_else(|| SyncError::transform(format!("location '{}' has no host", raw_location)))?;
        let segments: Vec<&str> = source
            .path_segments()
            .map(|segments| segments.collect())
            .unwrap_or_default();
        let (bucket, rest) = match segments.split_first() {
            Some((bucket, rest)) if !bucket.is_empty() => (*bucket, rest),
            _ => {
                return Err(SyncError::transform(format!(
                    "location '{}' has no bucket segment",
                    raw_location
                )));
            }
        };

        let mut relocated = format!("https://{}.{}", bucket, host);
        if let Some(port) = source.port() {
            relocated.push_str(&format!(":{}", port));
        }
        relocated.push('/');
        relocated.push_str(&rest.join("/"));
        if let Some(query) = source.query() {
            relocated.push('?');
            relocated.push_str(query);
        }
        Ok(relocated)
    }
}

#[async_trait]
impl LocationResolver for GatewayResolver {
    async fn prepare(&self) -> SyncResult<()> {
        self.ensure_token().await.map(|_| ())
    }

    async fn resolve(&self, raw_location: &str) -> SyncResult<String> {
        let relocated = Self::relocate(raw_location)?;
        let token = self.ensure_token().await?;

        let mut fetch = self.download_url.clone();
        fetch
            .query_pairs_mut()
            .append_pair("access_token", &token)
            .append_pair("url", &relocated);
        Ok(fetch.to_string())
    }

    fn invalidate(&self) {
        if self.token.write().take().is_some() {
            warn!(url = %self.settings.login_url, "Discarded rejected gateway token");
        }
    }

    fn name(&self) -> &'static str {
        "gateway"
    }
}
