//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per caller+route fixed window)
//!     → [auth subsystem]
//!     → endpoint logic
//!
//! Path-shaped values (config load, resources/read):
//!     → path.rs (decode, traversal scan, scheme/prefix policy)
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple layers of protection
//! - Fail closed: reject on any security check failure
//! - No trust in client input

pub mod path;
pub mod rate_limit;

pub use path::{PathKind, PathRejection, PathSecurityValidator, ValidatedPath};
pub use rate_limit::{RateDecision, RateLimiter};
