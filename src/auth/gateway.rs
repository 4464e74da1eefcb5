//! Authentication and authorization entry point.
//!
//! # Responsibilities
//! - Dispatch a credential header to the configured strategy
//! - Own the lazily-built OIDC handler registry
//! - Decide whether a method may run for a given context
//!
//! # Design Decisions
//! - Strategies are a closed enum chosen once at startup
//! - Every failure degrades to "no context"; callers answer 401
//! - Roles are carried but never consulted for authorization

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::auth::basic;
use crate::auth::bearer::{bearer_token, unix_time, BearerVerifier};
use crate::auth::context::{AuthContext, AuthMethod};
use crate::auth::oidc::{apply_preset, DiscoveryClient, OidcHandler};
use crate::config::{AuthConfig, AuthScheme, MethodAuthConfig, OidcConfig, UserConfig};
use crate::observability::metrics;

const REALM: &str = "gateway";

/// Verification strategy selected by `auth.scheme`.
enum AuthStrategy {
    Disabled,
    Basic(Vec<UserConfig>),
    Bearer(BearerVerifier),
    Oidc(Option<OidcConfig>),
}

pub struct AuthenticationGateway {
    strategy: AuthStrategy,
    methods: BTreeMap<String, MethodAuthConfig>,
    handlers: DashMap<String, Arc<OidcHandler>>,
    discovery: Arc<DiscoveryClient>,
    challenge: String,
}

impl AuthenticationGateway {
    pub fn new(config: &AuthConfig, discovery: Arc<DiscoveryClient>) -> Self {
        let strategy = if !config.enabled {
            AuthStrategy::Disabled
        } else {
            match config.scheme {
                AuthScheme::Basic => AuthStrategy::Basic(config.users.clone()),
                AuthScheme::Bearer => AuthStrategy::Bearer(BearerVerifier::new(
                    &config.jwt_secret,
                    &config.jwt_issuer,
                )),
                AuthScheme::Oidc => AuthStrategy::Oidc(config.oidc.clone()),
            }
        };

        Self {
            challenge: challenge_for(&strategy),
            strategy,
            methods: config.methods.clone(),
            handlers: DashMap::new(),
            discovery,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.strategy, AuthStrategy::Disabled)
    }

    /// `WWW-Authenticate` value for 401 responses.
    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    /// Authenticate an `Authorization` header value.
    ///
    /// Returns `None` both when auth is disabled and when the credential is
    /// missing or invalid; `authorize` tells the two apart.
    pub async fn authenticate(&self, header: Option<&str>) -> Option<AuthContext> {
        let (scheme, result) = match &self.strategy {
            AuthStrategy::Disabled => return None,
            AuthStrategy::Basic(users) => ("basic", header.and_then(|h| basic::authenticate(h, users))),
            AuthStrategy::Bearer(verifier) => ("bearer", header.and_then(|h| verifier.authenticate(h))),
            AuthStrategy::Oidc(config) => ("oidc", self.authenticate_oidc(config.as_ref(), header).await),
        };

        if result.is_none() && header.is_some() {
            metrics::record_auth_failure(scheme);
            tracing::warn!(scheme = scheme, "Authentication failed");
        }
        result
    }

    async fn authenticate_oidc(
        &self,
        config: Option<&OidcConfig>,
        header: Option<&str>,
    ) -> Option<AuthContext> {
        let token = bearer_token(header?)?;

        let Some(config) = config else {
            tracing::warn!("OIDC scheme selected without an [auth.oidc] section");
            return None;
        };
        let handler = self.handler_for(config)?;
        let claims = handler.validate_token(token).await?;

        let mut ctx = AuthContext::new(claims.username, AuthMethod::Oidc).with_roles(claims.roles);
        ctx.token_id = claims.jti;
        ctx.expires_at = claims.expires_at.map(unix_time);
        Some(ctx)
    }

    /// Handler for (issuer, client_id), created on first use.
    fn handler_for(&self, config: &OidcConfig) -> Option<Arc<OidcHandler>> {
        let key = format!("{}:{}", config.issuer_url, config.client_id);
        if let Some(existing) = self.handlers.get(&key) {
            return Some(Arc::clone(existing.value()));
        }

        let handler = match OidcHandler::new(config.clone(), Arc::clone(&self.discovery)) {
            Ok(handler) => Arc::new(handler),
            Err(e) => {
                tracing::warn!(error = %e, "Invalid OIDC provider configuration");
                return None;
            }
        };

        let entry = self.handlers.entry(key).or_insert(handler);
        Some(Arc::clone(entry.value()))
    }

    /// Whether `method` needs an authenticated context.
    pub fn method_requires_auth(&self, method: &str) -> bool {
        self.is_enabled() && self.methods.get(method).map_or(true, |m| m.required)
    }

    /// Whether `method` may run with `ctx`.
    pub fn authorize(&self, method: &str, ctx: Option<&AuthContext>) -> bool {
        if !self.method_requires_auth(method) {
            return true;
        }
        ctx.is_some_and(|c| c.authenticated)
    }

    /// Number of OIDC handlers created so far.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn discovery(&self) -> &Arc<DiscoveryClient> {
        &self.discovery
    }
}

fn challenge_for(strategy: &AuthStrategy) -> String {
    match strategy {
        AuthStrategy::Disabled | AuthStrategy::Basic(_) => format!("Basic realm=\"{REALM}\""),
        AuthStrategy::Bearer(_) | AuthStrategy::Oidc(None) => format!("Bearer realm=\"{REALM}\""),
        AuthStrategy::Oidc(Some(config)) => {
            let mut effective = config.clone();
            apply_preset(&mut effective);
            format!(
                "Bearer realm=\"{REALM}\", scope=\"{}\"",
                effective.scopes.join(" ")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use std::time::Duration;

    fn discovery() -> Arc<DiscoveryClient> {
        Arc::new(DiscoveryClient::new(
            Duration::from_secs(60),
            Duration::from_millis(200),
        ))
    }

    fn basic_config() -> AuthConfig {
        AuthConfig {
            enabled: true,
            scheme: AuthScheme::Basic,
            users: vec![UserConfig {
                username: "alice".into(),
                password: "wonderland".into(),
                roles: vec!["admin".into()],
            }],
            ..AuthConfig::default()
        }
    }

    fn basic_header(credentials: &str) -> String {
        format!("Basic {}", STANDARD.encode(credentials))
    }

    #[tokio::test]
    async fn test_disabled_admits_everything() {
        let gateway = AuthenticationGateway::new(&AuthConfig::default(), discovery());
        assert!(!gateway.is_enabled());
        assert!(gateway.authenticate(Some("Basic whatever")).await.is_none());
        assert!(gateway.authorize("tools/call", None));
        assert!(!gateway.method_requires_auth("tools/call"));
    }

    #[tokio::test]
    async fn test_basic_dispatch() {
        let gateway = AuthenticationGateway::new(&basic_config(), discovery());

        let ctx = gateway
            .authenticate(Some(&basic_header("alice:wonderland")))
            .await
            .unwrap();
        assert_eq!(ctx.principal, "alice");
        assert!(gateway.authorize("tools/call", Some(&ctx)));

        assert!(gateway.authenticate(Some(&basic_header("alice:nope"))).await.is_none());
        assert!(gateway.authenticate(None).await.is_none());
        assert_eq!(gateway.challenge(), "Basic realm=\"gateway\"");
    }

    #[test]
    fn test_authorize_requires_context() {
        let mut config = basic_config();
        config
            .methods
            .insert("ping".into(), MethodAuthConfig { required: false });
        config
            .methods
            .insert("tools/list".into(), MethodAuthConfig { required: true });
        let gateway = AuthenticationGateway::new(&config, discovery());

        assert!(gateway.authorize("ping", None));
        assert!(!gateway.authorize("tools/list", None));
        assert!(!gateway.authorize("unlisted", None));

        let mut ctx = AuthContext::new("alice", AuthMethod::Basic);
        assert!(gateway.authorize("unlisted", Some(&ctx)));
        ctx.authenticated = false;
        assert!(!gateway.authorize("unlisted", Some(&ctx)));
    }

    #[tokio::test]
    async fn test_oidc_without_provider_config() {
        let config = AuthConfig {
            enabled: true,
            scheme: AuthScheme::Oidc,
            ..AuthConfig::default()
        };
        let gateway = AuthenticationGateway::new(&config, discovery());
        assert!(gateway.authenticate(Some("Bearer abc")).await.is_none());
        assert_eq!(gateway.handler_count(), 0);
    }

    #[tokio::test]
    async fn test_oidc_handler_created_once() {
        let config = AuthConfig {
            enabled: true,
            scheme: AuthScheme::Oidc,
            oidc: Some(OidcConfig {
                issuer_url: "http://127.0.0.1:1".into(),
                client_id: "gateway".into(),
                ..OidcConfig::default()
            }),
            ..AuthConfig::default()
        };
        let gateway = AuthenticationGateway::new(&config, discovery());

        assert!(gateway.authenticate(Some("Bearer not-a-jwt")).await.is_none());
        assert!(gateway.authenticate(Some("Bearer still-not")).await.is_none());
        assert_eq!(gateway.handler_count(), 1);
        assert_eq!(
            gateway.challenge(),
            "Bearer realm=\"gateway\", scope=\"openid profile email\""
        );
    }

    #[tokio::test]
    async fn test_invalid_oidc_config_is_auth_failure() {
        let config = AuthConfig {
            enabled: true,
            scheme: AuthScheme::Oidc,
            oidc: Some(OidcConfig {
                provider_type: "microsoft".into(),
                client_id: "gateway".into(),
                ..OidcConfig::default()
            }),
            ..AuthConfig::default()
        };
        let gateway = AuthenticationGateway::new(&config, discovery());
        assert!(gateway.authenticate(Some("Bearer abc")).await.is_none());
        assert_eq!(gateway.handler_count(), 0);
    }
}
