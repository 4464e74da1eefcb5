//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::{body::Body, extract::connect_info::MockConnectInfo, http::Response, Router};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

use endpoint_gateway::config::{EndpointConfig, EndpointRateLimit};
use endpoint_gateway::{GatewayConfig, GatewayServer};

pub const RSA_PEM: &[u8] = include_bytes!("../fixtures/oidc_rsa.pem");
pub const RSA_MODULUS: &str = include_str!("../fixtures/oidc_rsa.n");

pub fn client_addr() -> SocketAddr {
    "203.0.113.7:40000".parse().unwrap()
}

/// Fully layered router with a fixed peer address.
pub fn app(config: GatewayConfig) -> Router {
    app_from(config, client_addr())
}

pub fn app_from(config: GatewayConfig, addr: SocketAddr) -> Router {
    GatewayServer::new(config)
        .unwrap()
        .router()
        .layer(MockConnectInfo(addr))
}

pub fn endpoint(name: &str, url_path: &str, tool: Option<&str>) -> EndpointConfig {
    EndpointConfig {
        name: name.to_string(),
        url_path: url_path.to_string(),
        mcp_tool: tool.map(str::to_string),
        description: format!("{name} data"),
        template_source: None,
        rate_limit: EndpointRateLimit::default(),
    }
}

pub fn limited(mut endpoint: EndpointConfig, max: u32, interval_secs: u64) -> EndpointConfig {
    endpoint.rate_limit = EndpointRateLimit {
        enabled: true,
        max,
        interval_secs,
    };
    endpoint
}

pub fn basic_header(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

pub fn mint_hs256(secret: &str, claims: &Value) -> String {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

pub fn mint_rs256(kid: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    jsonwebtoken::encode(&header, claims, &EncodingKey::from_rsa_pem(RSA_PEM).unwrap()).unwrap()
}

pub fn jwks_json(kid: &str) -> Value {
    json!({
        "keys": [{
            "kty": "RSA",
            "kid": kid,
            "use": "sig",
            "alg": "RS256",
            "n": RSA_MODULUS.trim(),
            "e": "AQAB",
        }]
    })
}

pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
