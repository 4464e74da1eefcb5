//! OpenID Connect discovery with a TTL cache.
//!
//! # Responsibilities
//! - Fetch `<issuer>/.well-known/openid-configuration`
//! - Cache parsed metadata per issuer for a fixed TTL
//!
//! # Design Decisions
//! - Expired entries count as absent; no background refresh
//! - A failed fetch never touches the existing entry
//! - The lock guards the map only; network I/O runs unlocked, so two
//!   callers may race a fetch and the last writer wins

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::DiscoveryConfig;
use crate::observability::metrics;

const WELL_KNOWN_PATH: &str = ".well-known/openid-configuration";

/// Failures while talking to an identity provider.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("invalid provider URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("malformed document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Provider metadata from the discovery document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub jwks_uri: String,
    #[serde(default)]
    pub authorization_endpoint: Option<String>,
    #[serde(default)]
    pub token_endpoint: Option<String>,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub revocation_endpoint: Option<String>,
    #[serde(default)]
    pub introspection_endpoint: Option<String>,
    #[serde(default)]
    pub scopes_supported: Vec<String>,
    #[serde(default)]
    pub response_types_supported: Vec<String>,
    #[serde(default)]
    pub grant_types_supported: Vec<String>,
    #[serde(default)]
    pub token_endpoint_auth_methods_supported: Vec<String>,
}

struct CacheEntry {
    metadata: Arc<ProviderMetadata>,
    fetched_at: Instant,
}

/// Read-through metadata cache keyed by issuer URL.
pub struct DiscoveryClient {
    http: reqwest::Client,
    cache: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    request_timeout: Duration,
}

impl DiscoveryClient {
    pub fn new(ttl: Duration, request_timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            cache: Mutex::new(HashMap::new()),
            ttl,
            request_timeout,
        }
    }

    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self::new(
            Duration::from_secs(config.cache_ttl_secs),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Shared HTTP client, reused for JWKS fetches.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Metadata for `issuer_url`, from cache when fresh.
    pub async fn get_metadata(&self, issuer_url: &str) -> Option<Arc<ProviderMetadata>> {
        if let Some(cached) = self.cached(issuer_url) {
            metrics::record_discovery_fetch("hit");
            return Some(cached);
        }

        match self.fetch(issuer_url).await {
            Ok(metadata) => {
                let metadata = Arc::new(metadata);
                self.cache
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(
                        issuer_url.to_string(),
                        CacheEntry {
                            metadata: Arc::clone(&metadata),
                            fetched_at: Instant::now(),
                        },
                    );
                metrics::record_discovery_fetch("fetched");
                tracing::debug!(issuer = %issuer_url, "Provider metadata cached");
                Some(metadata)
            }
            Err(e) => {
                metrics::record_discovery_fetch("error");
                tracing::warn!(issuer = %issuer_url, error = %e, "Provider discovery failed");
                None
            }
        }
    }

    fn cached(&self, issuer_url: &str) -> Option<Arc<ProviderMetadata>> {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .get(issuer_url)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| Arc::clone(&entry.metadata))
    }

    async fn fetch(&self, issuer_url: &str) -> Result<ProviderMetadata, DiscoveryError> {
        let url = discovery_url(issuer_url)?;
        fetch_json(&self.http, url, self.request_timeout).await
    }

    /// Drop every cached entry.
    pub fn clear_cache(&self) {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Number of entries, fresh or stale.
    pub fn cached_entries(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// `<issuer>/.well-known/openid-configuration` with exactly one separator.
pub fn discovery_url(issuer_url: &str) -> Result<url::Url, url::ParseError> {
    let base = issuer_url.trim_end_matches('/');
    url::Url::parse(&format!("{base}/{WELL_KNOWN_PATH}"))
}

/// GET `url` and parse a JSON body from a 200 response.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: url::Url,
    timeout: Duration,
) -> Result<T, DiscoveryError> {
    let response = client.get(url.clone()).timeout(timeout).send().await?;
    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(DiscoveryError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
