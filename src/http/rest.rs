//! REST surface: one route per declared endpoint.
//!
//! Rate limiting runs earlier as route middleware; this handler resolves the
//! endpoint, authenticates, authorizes by endpoint name and acknowledges.

use std::time::Instant;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::observability::metrics;

pub async fn handle(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    let start = Instant::now();
    let path = uri.path();

    let Some(hit) = state.directory.resolve(path) else {
        tracing::debug!(request_id = %request_id(&headers), path = %path, "No endpoint matched");
        metrics::record_request("rest", 404, start);
        return (StatusCode::NOT_FOUND, "No matching endpoint").into_response();
    };
    let endpoint = hit.endpoint;

    let credential = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let ctx = state.auth.authenticate(credential).await;

    if !state.auth.authorize(endpoint.name(), ctx.as_ref()) {
        tracing::warn!(
            request_id = %request_id(&headers),
            endpoint = %endpoint.name(),
            "Unauthorized request"
        );
        metrics::record_request("rest", 401, start);
        return (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, state.auth.challenge().to_string())],
            "Authentication required",
        )
            .into_response();
    }

    tracing::debug!(
        request_id = %request_id(&headers),
        endpoint = %endpoint.name(),
        params = hit.params.len(),
        "Request admitted"
    );
    metrics::record_request("rest", 200, start);

    Json(json!({
        "endpoint": endpoint.name(),
        "params": hit.params,
        "principal": ctx.map(|c| c.principal),
    }))
    .into_response()
}
