//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::security::path::DEFAULT_MAX_DECODE_ITERATIONS;

/// Root configuration for the endpoint gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Storage path policy.
    pub paths: PathPolicyConfig,

    /// Protocol-level authentication.
    pub auth: AuthConfig,

    /// Identity provider discovery.
    pub discovery: DiscoveryConfig,

    /// Global rate limiter settings.
    pub rate_limit: RateLimitConfig,

    /// Declared endpoints, matched in order.
    pub endpoints: Vec<EndpointConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            request_timeout_secs: 30,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Policy for paths supplied by configuration or by callers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathPolicyConfig {
    pub allow_local_paths: bool,
    pub allow_relative_paths: bool,

    /// Resolve symlinks through the filesystem before the prefix check.
    pub resolve_symlinks: bool,

    /// URI schemes accepted for remote locations (plus `file`).
    pub allowed_schemes: Vec<String>,

    /// Directories local paths must live under. Empty admits any.
    pub allowed_prefixes: Vec<String>,

    /// Percent-decoding passes before the traversal scan.
    pub max_decode_iterations: usize,

    /// Base directory for relative template sources and resource reads.
    pub base_dir: String,
}

impl Default for PathPolicyConfig {
    fn default() -> Self {
        Self {
            allow_local_paths: true,
            allow_relative_paths: true,
            resolve_symlinks: false,
            allowed_schemes: vec!["file".to_string(), "https".to_string()],
            allowed_prefixes: Vec::new(),
            max_decode_iterations: DEFAULT_MAX_DECODE_ITERATIONS,
            base_dir: String::new(),
        }
    }
}

/// Authentication scheme applied to every protected call.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    #[default]
    Basic,
    Bearer,
    Oidc,
}

impl AuthScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthScheme::Basic => "basic",
            AuthScheme::Bearer => "bearer",
            AuthScheme::Oidc => "oidc",
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// When false every call is admitted without a context.
    pub enabled: bool,

    pub scheme: AuthScheme,

    /// Users for the basic scheme.
    pub users: Vec<UserConfig>,

    /// HS256 secret for the bearer scheme.
    pub jwt_secret: String,

    /// Expected `iss` claim for the bearer scheme.
    pub jwt_issuer: String,

    /// Identity provider for the oidc scheme.
    pub oidc: Option<OidcConfig>,

    /// Per-method overrides keyed by method name.
    pub methods: BTreeMap<String, MethodAuthConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scheme: AuthScheme::Basic,
            users: Vec::new(),
            jwt_secret: String::new(),
            jwt_issuer: "endpoint-gateway".to_string(),
            oidc: None,
            methods: BTreeMap::new(),
        }
    }
}

/// A basic-auth user.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserConfig {
    pub username: String,

    /// `$sha256$<hex>`, `$md5$<hex>`, bare 32-hex MD5, or plaintext.
    pub password: String,

    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MethodAuthConfig {
    pub required: bool,
}

impl Default for MethodAuthConfig {
    fn default() -> Self {
        Self { required: true }
    }
}

/// Delegated identity provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct OidcConfig {
    /// `generic`, `google`, `microsoft`, `keycloak`, `auth0`, `okta`, `github`.
    pub provider_type: String,

    pub issuer_url: String,
    pub client_id: String,

    /// Values substituted for `{name}` placeholders in `issuer_url`.
    pub placeholders: BTreeMap<String, String>,

    /// Accepted `aud` values. Empty disables the audience check.
    pub allowed_audiences: Vec<String>,

    pub verify_expiration: bool,
    pub clock_skew_seconds: u64,

    pub username_claim: String,
    pub email_claim: String,
    pub roles_claim: String,
    pub groups_claim: String,

    /// Dotted path to a nested role array, e.g. `realm_access.roles`.
    pub role_claim_path: Option<String>,

    pub scopes: Vec<String>,

    /// Lifetime of the signing key cache.
    pub jwks_cache_hours: u64,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            provider_type: "generic".to_string(),
            issuer_url: String::new(),
            client_id: String::new(),
            placeholders: BTreeMap::new(),
            allowed_audiences: Vec::new(),
            verify_expiration: true,
            clock_skew_seconds: 300,
            username_claim: "sub".to_string(),
            email_claim: "email".to_string(),
            roles_claim: "roles".to_string(),
            groups_claim: "groups".to_string(),
            role_claim_path: None,
            scopes: Vec::new(),
            jwks_cache_hours: 24,
        }
    }
}

/// Discovery client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// How long fetched provider metadata stays fresh.
    pub cache_ttl_secs: u64,

    /// Timeout for a single discovery or JWKS request.
    pub request_timeout_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 86_400,
            request_timeout_secs: 10,
        }
    }
}

/// Rate limiter housekeeping.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Purge expired windows every N admission calls.
    pub sweep_every: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { sweep_every: 100 }
    }
}

/// A declared data-serving endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Endpoint identifier for logging, metrics and authorization.
    pub name: String,

    /// Path pattern with `:name` captures.
    pub url_path: String,

    /// Tool name on the JSON-RPC surface.
    #[serde(default)]
    pub mcp_tool: Option<String>,

    #[serde(default)]
    pub description: String,

    /// Query template location, checked against the path policy.
    #[serde(default)]
    pub template_source: Option<String>,

    #[serde(default)]
    pub rate_limit: EndpointRateLimit,
}

/// Per-endpoint fixed-window limit.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointRateLimit {
    pub enabled: bool,

    /// Requests admitted per window.
    pub max: u32,

    /// Window length in seconds.
    pub interval_secs: u64,
}

impl Default for EndpointRateLimit {
    fn default() -> Self {
        Self {
            enabled: false,
            max: 100,
            interval_secs: 60,
        }
    }
}
