//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → router.rs (endpoint lookup, declaration order)
//!     → matcher.rs (segment match, capture :params)
//!     → Return: (Endpoint, PathParams) or None
//!
//! Route Compilation (at startup):
//!     EndpointConfig[]
//!     → Compile url_path patterns
//!     → Freeze as immutable EndpointDirectory
//! ```
//!
//! # Design Decisions
//! - Patterns compiled at startup, immutable at runtime
//! - No regex in hot path (segment comparison only)
//! - Deterministic: same input always matches same endpoint
//! - First match wins

pub mod matcher;
pub mod router;

pub use matcher::{PathParams, PatternError, RoutePattern};
pub use router::{Endpoint, EndpointDirectory, EndpointMatch};
