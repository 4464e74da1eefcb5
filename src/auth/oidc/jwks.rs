//! Signing key cache for one identity provider.
//!
//! # Responsibilities
//! - Fetch and hold the provider's JWK set for a TTL
//! - Resolve a `kid` to a decoding key
//! - Refetch once when a `kid` is unknown (key rotation)
//!
//! # Design Decisions
//! - One store per handler; nothing is shared across issuers
//! - A failed refresh keeps the previous set

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::DecodingKey;

use crate::auth::oidc::discovery::{fetch_json, DiscoveryError};

#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("JWKS fetch failed: {0}")]
    Fetch(#[from] DiscoveryError),
    #[error("no signing key with kid '{0}'")]
    UnknownKey(String),
    #[error("unusable signing key: {0}")]
    InvalidKey(#[from] jsonwebtoken::errors::Error),
}

struct CachedKeys {
    jwks_uri: String,
    keys: Arc<JwkSet>,
    fetched_at: Instant,
}

pub struct JwksKeyStore {
    http: reqwest::Client,
    cached: Mutex<Option<CachedKeys>>,
    ttl: Duration,
    request_timeout: Duration,
}

impl JwksKeyStore {
    pub fn new(http: reqwest::Client, ttl: Duration, request_timeout: Duration) -> Self {
        Self {
            http,
            cached: Mutex::new(None),
            ttl,
            request_timeout,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Decoding key for `kid` published at `jwks_uri`.
    pub async fn decoding_key(&self, jwks_uri: &str, kid: &str) -> Result<DecodingKey, KeyStoreError> {
        if let Some(keys) = self.fresh(jwks_uri) {
            if let Some(jwk) = keys.find(kid) {
                return Ok(DecodingKey::from_jwk(jwk)?);
            }
            tracing::debug!(kid = %kid, "Unknown kid, refreshing JWKS");
        }

        let keys = self.refresh(jwks_uri).await?;
        let jwk = keys
            .find(kid)
            .ok_or_else(|| KeyStoreError::UnknownKey(kid.to_string()))?;
        Ok(DecodingKey::from_jwk(jwk)?)
    }

    fn fresh(&self, jwks_uri: &str) -> Option<Arc<JwkSet>> {
        let cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        cached
            .as_ref()
            .filter(|c| c.jwks_uri == jwks_uri && c.fetched_at.elapsed() < self.ttl)
            .map(|c| Arc::clone(&c.keys))
    }

    async fn refresh(&self, jwks_uri: &str) -> Result<Arc<JwkSet>, KeyStoreError> {
        let url = url::Url::parse(jwks_uri).map_err(DiscoveryError::from)?;
        let keys: JwkSet = fetch_json(&self.http, url, self.request_timeout).await?;
        let keys = Arc::new(keys);

        tracing::debug!(jwks_uri = %jwks_uri, keys = keys.keys.len(), "JWKS refreshed");
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = Some(CachedKeys {
            jwks_uri: jwks_uri.to_string(),
            keys: Arc::clone(&keys),
            fetched_at: Instant::now(),
        });
        Ok(keys)
    }
}
