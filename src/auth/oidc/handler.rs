//! Token validation for one identity provider.
//!
//! # Responsibilities
//! - Check the token header (`kid`, asymmetric `alg`)
//! - Locate the signing key via discovery metadata and the JWKS store
//! - Verify signature, issuer, audience and expiry
//! - Map provider claims onto gateway identity fields
//!
//! # Design Decisions
//! - Symmetric algorithms are never accepted from a provider
//! - Claim names may be dotted paths into nested objects
//! - Roles and groups accept an array of strings or a single string

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde_json::Value;

use crate::auth::oidc::discovery::DiscoveryClient;
use crate::auth::oidc::jwks::{JwksKeyStore, KeyStoreError};
use crate::auth::oidc::presets::{apply_preset, validate_provider_config, PresetError};
use crate::config::OidcConfig;

const ALLOWED_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
];

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token header: {0}")]
    Header(jsonwebtoken::errors::Error),
    #[error("token header has no kid")]
    MissingKid,
    #[error("algorithm {0:?} not accepted")]
    UnsupportedAlgorithm(Algorithm),
    #[error("provider metadata unavailable for {0}")]
    MetadataUnavailable(String),
    #[error(transparent)]
    Key(#[from] KeyStoreError),
    #[error("verification failed: {0}")]
    Verification(jsonwebtoken::errors::Error),
    #[error("token has no subject")]
    MissingSubject,
}

/// Identity fields extracted from a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenClaims {
    pub subject: String,
    pub issuer: String,
    pub audience: Vec<String>,
    pub username: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub name: Option<String>,
    pub roles: Vec<String>,
    pub groups: Vec<String>,
    pub issued_at: Option<u64>,
    pub expires_at: Option<u64>,
    pub jti: Option<String>,
}

pub struct OidcHandler {
    config: OidcConfig,
    discovery: Arc<DiscoveryClient>,
    keys: JwksKeyStore,
}

impl OidcHandler {
    /// Apply provider presets, validate, and build the handler.
    pub fn new(mut config: OidcConfig, discovery: Arc<DiscoveryClient>) -> Result<Self, PresetError> {
        apply_preset(&mut config);
        validate_provider_config(&config)?;

        let keys = JwksKeyStore::new(
            discovery.http().clone(),
            Duration::from_secs(config.jwks_cache_hours.saturating_mul(3600)),
            discovery.request_timeout(),
        );

        tracing::info!(
            issuer = %config.issuer_url,
            provider = %config.provider_type,
            "OIDC handler created"
        );
        Ok(Self {
            config,
            discovery,
            keys,
        })
    }

    /// Effective (preset-applied) configuration.
    pub fn config(&self) -> &OidcConfig {
        &self.config
    }

    /// Validate `token`, logging the reason on failure.
    pub async fn validate_token(&self, token: &str) -> Option<TokenClaims> {
        match self.verify(token).await {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::debug!(issuer = %self.config.issuer_url, error = %e, "OIDC token rejected");
                None
            }
        }
    }

    pub async fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let header = decode_header(token).map_err(TokenError::Header)?;
        let kid = header.kid.as_deref().ok_or(TokenError::MissingKid)?;
        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            return Err(TokenError::UnsupportedAlgorithm(header.alg));
        }

        let metadata = self
            .discovery
            .get_metadata(&self.config.issuer_url)
            .await
            .ok_or_else(|| TokenError::MetadataUnavailable(self.config.issuer_url.clone()))?;
        let key = self.keys.decoding_key(&metadata.jwks_uri, kid).await?;

        let data = decode::<Value>(token, &key, &self.validation(header.alg))
            .map_err(TokenError::Verification)?;
        self.map_claims(&data.claims)
    }

    fn validation(&self, alg: Algorithm) -> Validation {
        let mut validation = Validation::new(alg);
        validation.set_issuer(&[&self.config.issuer_url]);
        if self.config.allowed_audiences.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(self.config.allowed_audiences.as_slice());
        }
        validation.validate_exp = self.config.verify_expiration;
        validation.leeway = self.config.clock_skew_seconds;
        validation.required_spec_claims = HashSet::from(["iss".to_string(), "sub".to_string()]);
        validation
    }

    fn map_claims(&self, claims: &Value) -> Result<TokenClaims, TokenError> {
        let subject = claims
            .get("sub")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or(TokenError::MissingSubject)?
            .to_string();

        let username = claim_path(claims, &self.config.username_claim)
            .and_then(Value::as_str)
            .unwrap_or(&subject)
            .to_string();

        let roles = match self.config.role_claim_path.as_deref() {
            Some(path) if !path.is_empty() => claim_strings(claim_path(claims, path)),
            _ => claim_strings(claim_path(claims, &self.config.roles_claim)),
        };

        let string_claim = |name: &str| {
            claim_path(claims, name)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Ok(TokenClaims {
            issuer: string_claim("iss").unwrap_or_default(),
            audience: claim_strings(claims.get("aud")),
            email: string_claim(&self.config.email_claim),
            email_verified: claims
                .get("email_verified")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            name: string_claim("name"),
            groups: claim_strings(claim_path(claims, &self.config.groups_claim)),
            issued_at: claims.get("iat").and_then(Value::as_u64),
            expires_at: claims.get("exp").and_then(Value::as_u64),
            jti: string_claim("jti"),
            subject,
            username,
            roles,
        })
    }
}

/// Look up a claim by exact name, then as a dotted path.
fn claim_path<'a>(claims: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    if let Some(value) = claims.get(path) {
        return Some(value);
    }
    path.split('.')
        .try_fold(claims, |current, segment| current.get(segment))
}

fn claim_strings(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn handler(config: OidcConfig) -> OidcHandler {
        let discovery = Arc::new(DiscoveryClient::new(
            Duration::from_secs(60),
            Duration::from_millis(200),
        ));
        OidcHandler::new(config, discovery).unwrap()
    }

    fn generic() -> OidcConfig {
        OidcConfig {
            issuer_url: "https://idp.example.com".into(),
            ..OidcConfig::default()
        }
    }

    #[test]
    fn test_jwks_ttl_saturates() {
        let mut config = generic();
        config.jwks_cache_hours = u64::MAX;
        assert_eq!(handler(config).keys.ttl(), Duration::from_secs(u64::MAX));

        assert_eq!(handler(generic()).keys.ttl(), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_claim_path_nested_and_literal() {
        let claims = json!({
            "realm_access": {"roles": ["analyst", "admin"]},
            "https://example.com/roles": ["namespaced"]
        });
        assert_eq!(
            claim_strings(claim_path(&claims, "realm_access.roles")),
            vec!["analyst", "admin"]
        );
        assert_eq!(
            claim_strings(claim_path(&claims, "https://example.com/roles")),
            vec!["namespaced"]
        );
        assert!(claim_path(&claims, "realm_access.missing").is_none());
        assert!(claim_path(&claims, "").is_none());
    }

    #[test]
    fn test_claim_strings_shapes() {
        assert_eq!(claim_strings(Some(&json!("solo"))), vec!["solo"]);
        assert_eq!(claim_strings(Some(&json!(["a", 1, "b"]))), vec!["a", "b"]);
        assert!(claim_strings(Some(&json!(42))).is_empty());
        assert!(claim_strings(None).is_empty());
    }

    #[test]
    fn test_map_claims() {
        let mut config = generic();
        config.username_claim = "preferred_username".into();
        config.role_claim_path = Some("realm_access.roles".into());
        let handler = handler(config);

        let claims = json!({
            "sub": "u-1",
            "iss": "https://idp.example.com",
            "aud": "gateway",
            "preferred_username": "jdoe",
            "email": "jdoe@example.com",
            "email_verified": true,
            "realm_access": {"roles": ["analyst"]},
            "groups": "finance",
            "jti": "abc",
            "exp": 2_000_000_000u64
        });
        let mapped = handler.map_claims(&claims).unwrap();
        assert_eq!(mapped.username, "jdoe");
        assert_eq!(mapped.audience, vec!["gateway"]);
        assert_eq!(mapped.email.as_deref(), Some("jdoe@example.com"));
        assert!(mapped.email_verified);
        assert_eq!(mapped.roles, vec!["analyst"]);
        assert_eq!(mapped.groups, vec!["finance"]);
        assert_eq!(mapped.jti.as_deref(), Some("abc"));
        assert_eq!(mapped.expires_at, Some(2_000_000_000));
    }

    #[test]
    fn test_username_falls_back_to_subject() {
        let handler = handler(generic());
        let mut claims = json!({"sub": "u-2"});
        let mapped = handler.map_claims(&claims).unwrap();
        assert_eq!(mapped.username, "u-2");

        claims["sub"] = json!("");
        assert!(matches!(
            handler.map_claims(&claims),
            Err(TokenError::MissingSubject)
        ));
    }

    #[tokio::test]
    async fn test_symmetric_algorithm_rejected() {
        let handler = handler(generic());
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some("k1".into());
        let token = encode(
            &header,
            &json!({"sub": "x", "iss": "https://idp.example.com"}),
            &EncodingKey::from_secret(b"guessable"),
        )
        .unwrap();

        assert!(matches!(
            handler.verify(&token).await,
            Err(TokenError::UnsupportedAlgorithm(Algorithm::HS256))
        ));
    }

    #[tokio::test]
    async fn test_missing_kid_rejected() {
        let handler = handler(generic());
        let token = encode(
            &Header::new(Algorithm::HS256),
            &json!({"sub": "x"}),
            &EncodingKey::from_secret(b"k"),
        )
        .unwrap();
        assert!(matches!(handler.verify(&token).await, Err(TokenError::MissingKid)));
        assert!(handler.validate_token("not-a-jwt").await.is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let discovery = Arc::new(DiscoveryClient::new(
            Duration::from_secs(60),
            Duration::from_secs(1),
        ));
        let result = OidcHandler::new(OidcConfig::default(), discovery);
        assert!(matches!(result, Err(PresetError::MissingIssuer(_))));
    }
}
