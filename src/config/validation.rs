//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check endpoint patterns, names and rate limits
//! - Check auth scheme prerequisites
//! - Run configured storage paths through the path policy
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::auth::oidc::{apply_preset, validate_provider_config};
use crate::config::schema::{AuthScheme, GatewayConfig};
use crate::observability::metrics;
use crate::routing::RoutePattern;
use crate::security::path::PathSecurityValidator;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Validate `config`, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_listener(config, &mut errors);
    validate_auth(config, &mut errors);
    validate_endpoints(config, &mut errors);

    if config.paths.max_decode_iterations == 0 {
        errors.push(ValidationError::new(
            "paths.max_decode_iterations",
            "must be at least 1",
        ));
    }
    if config.discovery.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "discovery.request_timeout_secs",
            "must be greater than 0",
        ));
    }
    if config.rate_limit.sweep_every == 0 {
        errors.push(ValidationError::new(
            "rate_limit.sweep_every",
            "must be greater than 0",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_listener(config: &GatewayConfig, errors: &mut Vec<ValidationError>) {
    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("invalid socket address '{}'", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "listener.request_timeout_secs",
            "must be greater than 0",
        ));
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", observability.metrics_address),
        ));
    }

    if let Some(tls) = &config.listener.tls {
        let validator = PathSecurityValidator::from_config(&config.paths);
        for (field, path) in [
            ("listener.tls.cert_path", &tls.cert_path),
            ("listener.tls.key_path", &tls.key_path),
        ] {
            if let Err(rejection) = validator.validate(path, &config.paths.base_dir) {
                metrics::record_path_rejection();
                errors.push(ValidationError::new(field, rejection.to_string()));
            }
        }
    }
}

fn validate_auth(config: &GatewayConfig, errors: &mut Vec<ValidationError>) {
    let auth = &config.auth;
    if !auth.enabled {
        return;
    }

    match auth.scheme {
        AuthScheme::Basic => {
            if auth.users.is_empty() {
                errors.push(ValidationError::new(
                    "auth.users",
                    "basic authentication requires at least one user",
                ));
            }
        }
        AuthScheme::Bearer => {
            if auth.jwt_secret.is_empty() {
                errors.push(ValidationError::new(
                    "auth.jwt_secret",
                    "bearer authentication requires a secret",
                ));
            }
        }
        AuthScheme::Oidc => match &auth.oidc {
            None => errors.push(ValidationError::new(
                "auth.oidc",
                "oidc authentication requires an [auth.oidc] section",
            )),
            Some(oidc) => {
                let mut effective = oidc.clone();
                apply_preset(&mut effective);
                if let Err(e) = validate_provider_config(&effective) {
                    errors.push(ValidationError::new("auth.oidc", e.to_string()));
                }
            }
        },
    }
}

fn validate_endpoints(config: &GatewayConfig, errors: &mut Vec<ValidationError>) {
    let validator = PathSecurityValidator::from_config(&config.paths);
    let mut names = HashSet::new();
    let mut tools = HashSet::new();

    for (i, endpoint) in config.endpoints.iter().enumerate() {
        let field = |name: &str| format!("endpoints[{i}].{name}");

        if endpoint.name.is_empty() {
            errors.push(ValidationError::new(field("name"), "must not be empty"));
        } else if !names.insert(endpoint.name.as_str()) {
            errors.push(ValidationError::new(
                field("name"),
                format!("duplicate endpoint name '{}'", endpoint.name),
            ));
        }

        if let Some(tool) = &endpoint.mcp_tool {
            if !tools.insert(tool.as_str()) {
                errors.push(ValidationError::new(
                    field("mcp_tool"),
                    format!("duplicate tool name '{tool}'"),
                ));
            }
        }

        if let Err(e) = RoutePattern::compile(&endpoint.url_path) {
            errors.push(ValidationError::new(field("url_path"), e.to_string()));
        }

        let limit = &endpoint.rate_limit;
        if limit.enabled && limit.max == 0 {
            errors.push(ValidationError::new(field("rate_limit.max"), "must be greater than 0"));
        }
        if limit.enabled && limit.interval_secs == 0 {
            errors.push(ValidationError::new(
                field("rate_limit.interval_secs"),
                "must be greater than 0",
            ));
        }

        if let Some(source) = &endpoint.template_source {
            if let Err(rejection) = validator.validate(source, &config.paths.base_dir) {
                metrics::record_path_rejection();
                errors.push(ValidationError::new(field("template_source"), rejection.to_string()));
            }
        }
    }
}
