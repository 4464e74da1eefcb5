//! Shared-secret bearer tokens (HS256).

use std::collections::HashSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;

use crate::auth::context::{AuthContext, AuthMethod};

const BEARER_PREFIX: &str = "Bearer ";

/// Verifies HS256 tokens bound to one secret and issuer.
#[derive(Clone)]
pub struct BearerVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl BearerVerifier {
    pub fn new(secret: &str, issuer: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.validate_aud = false;
        // exp is checked only when present
        validation.required_spec_claims = HashSet::from(["iss".to_string(), "sub".to_string()]);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Authenticate a `Bearer` header.
    pub fn authenticate(&self, header: &str) -> Option<AuthContext> {
        let token = bearer_token(header)?;

        let data = match decode::<Value>(token, &self.key, &self.validation) {
            Ok(data) => data,
            Err(e) => {
                tracing::debug!(error = %e, "Bearer token rejected");
                return None;
            }
        };
        let claims = data.claims;

        let subject = claims.get("sub").and_then(Value::as_str)?;
        let roles = string_array(claims.get("roles"));

        let mut ctx = AuthContext::new(subject, AuthMethod::Bearer).with_roles(roles);
        ctx.token_id = claims.get("jti").and_then(Value::as_str).map(str::to_string);
        ctx.expires_at = claims.get("exp").and_then(Value::as_u64).map(unix_time);
        Some(ctx)
    }
}

/// Token part of a `Bearer <token>` header.
pub fn bearer_token(header: &str) -> Option<&str> {
    let token = header.strip_prefix(BEARER_PREFIX)?.trim();
    (!token.is_empty()).then_some(token)
}

/// String elements of an array claim; any other shape yields nothing.
fn string_array(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn unix_time(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}
