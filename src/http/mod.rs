//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → request.rs (request ID, trace span)
//!     → server.rs (timeout, router)
//!         /{*path}  → rate limit middleware → rest.rs (auth, acknowledge)
//!         /mcp      → mcp.rs (auth by method, tools, resources)
//!         /health   → liveness
//!     → Send to client
//! ```

pub mod mcp;
pub mod request;
pub mod rest;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, GatewayServer, ServerError};
