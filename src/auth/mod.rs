//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Authorization header
//!     → gateway.rs (dispatch on configured scheme)
//!         basic.rs  → user list, password forms
//!         bearer.rs → HS256 + issuer
//!         oidc/     → discovery + JWKS + claim mapping
//!     → AuthContext or None
//!     → gateway.rs authorize(method, context)
//! ```
//!
//! # Design Decisions
//! - Fail closed: any doubt yields no context
//! - Contexts live for one request and are never stored

pub mod basic;
pub mod bearer;
pub mod context;
pub mod gateway;
pub mod oidc;

pub use context::{AuthContext, AuthMethod};
pub use gateway::AuthenticationGateway;
