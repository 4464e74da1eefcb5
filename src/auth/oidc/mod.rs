//! Delegated authentication through an OpenID Connect provider.
//!
//! # Data Flow
//! ```text
//! Bearer token
//!     → handler.rs (header checks: kid, asymmetric alg)
//!     → discovery.rs (issuer metadata, TTL cache)
//!     → jwks.rs (signing key by kid, refresh on miss)
//!     → handler.rs (signature, iss, aud, exp; claim mapping)
//!     → TokenClaims or rejection
//! ```
//!
//! # Design Decisions
//! - Handlers are configured once through presets.rs and reused
//! - All provider I/O failures degrade to "no identity"

pub mod discovery;
pub mod handler;
pub mod jwks;
pub mod presets;

pub use discovery::{DiscoveryClient, DiscoveryError, ProviderMetadata};
pub use handler::{OidcHandler, TokenClaims, TokenError};
pub use jwks::{JwksKeyStore, KeyStoreError};
pub use presets::{apply_preset, validate_provider_config, PresetError};
