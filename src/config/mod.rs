//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, path policy)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AuthConfig, AuthScheme, DiscoveryConfig, EndpointConfig, EndpointRateLimit, GatewayConfig,
    ListenerConfig, LogFormat, MethodAuthConfig, ObservabilityConfig, OidcConfig,
    PathPolicyConfig, RateLimitConfig, TlsConfig, UserConfig,
};
pub use validation::{validate_config, ValidationError};
