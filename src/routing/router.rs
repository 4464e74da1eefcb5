//! Endpoint lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled endpoint patterns
//! - Resolve an inbound path to an endpoint plus captured parameters
//! - Look up endpoints by JSON-RPC tool name
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) pattern scan (acceptable for typical endpoint counts)
//! - First match in declaration order wins
//! - Explicit `None` rather than a silent default

use crate::config::EndpointConfig;
use crate::routing::matcher::{PathParams, PatternError, RoutePattern};

/// A declared endpoint with its compiled pattern.
#[derive(Debug, Clone)]
pub struct Endpoint {
    config: EndpointConfig,
    pattern: RoutePattern,
}

impl Endpoint {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.config.mcp_tool.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.config.description
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Window size for this endpoint, if it is rate limited.
    pub fn rate_limit(&self) -> Option<(u32, u64)> {
        let limit = &self.config.rate_limit;
        limit.enabled.then_some((limit.max, limit.interval_secs))
    }
}

/// Result of a successful lookup.
#[derive(Debug)]
pub struct EndpointMatch<'a> {
    pub endpoint: &'a Endpoint,
    pub params: PathParams,
}

/// Keyed directory of declared endpoints.
#[derive(Debug, Default)]
pub struct EndpointDirectory {
    endpoints: Vec<Endpoint>,
}

impl EndpointDirectory {
    /// Compile every declared endpoint, preserving declaration order.
    pub fn from_config(configs: &[EndpointConfig]) -> Result<Self, PatternError> {
        let endpoints = configs
            .iter()
            .map(|config| {
                Ok(Endpoint {
                    pattern: RoutePattern::compile(&config.url_path)?,
                    config: config.clone(),
                })
            })
            .collect::<Result<Vec<_>, PatternError>>()?;

        tracing::debug!(endpoints = endpoints.len(), "Endpoint directory compiled");
        Ok(Self { endpoints })
    }

    /// First endpoint whose pattern matches `path`.
    pub fn resolve(&self, path: &str) -> Option<EndpointMatch<'_>> {
        self.endpoints.iter().find_map(|endpoint| {
            endpoint
                .pattern
                .match_path(path)
                .map(|params| EndpointMatch { endpoint, params })
        })
    }

    pub fn by_tool_name(&self, tool: &str) -> Option<&Endpoint> {
        self.endpoints
            .iter()
            .find(|endpoint| endpoint.tool_name() == Some(tool))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::EndpointRateLimit;

    fn endpoint(name: &str, url_path: &str, tool: Option<&str>) -> EndpointConfig {
        EndpointConfig {
            name: name.to_string(),
            url_path: url_path.to_string(),
            mcp_tool: tool.map(str::to_string),
            description: String::new(),
            template_source: None,
            rate_limit: EndpointRateLimit::default(),
        }
    }

    #[test]
    fn test_first_match_wins() {
        let directory = EndpointDirectory::from_config(&[
            endpoint("latest", "/orders/latest", None),
            endpoint("by_id", "/orders/:id", Some("get_order")),
        ])
        .unwrap();

        let hit = directory.resolve("/orders/latest").unwrap();
        assert_eq!(hit.endpoint.name(), "latest");
        assert!(hit.params.is_empty());

        let hit = directory.resolve("/orders/17").unwrap();
        assert_eq!(hit.endpoint.name(), "by_id");
        assert_eq!(hit.params.get("id"), Some("17"));

        assert!(directory.resolve("/customers").is_none());
    }

    #[test]
    fn test_by_tool_name() {
        let directory = EndpointDirectory::from_config(&[
            endpoint("by_id", "/orders/:id", Some("get_order")),
        ])
        .unwrap();

        assert_eq!(directory.by_tool_name("get_order").unwrap().name(), "by_id");
        assert!(directory.by_tool_name("missing").is_none());
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let result = EndpointDirectory::from_config(&[endpoint("bad", "orders", None)]);
        assert!(result.is_err());
    }
}
