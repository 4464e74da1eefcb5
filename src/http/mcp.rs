//! JSON-RPC 2.0 tool/resource surface.
//!
//! # Responsibilities
//! - Parse JSON-RPC envelopes from `POST /mcp`
//! - Authenticate and authorize by JSON-RPC method name
//! - Expose endpoints with an `mcp_tool` as callable tools
//! - Serve `resources/read` through the path policy
//!
//! # Design Decisions
//! - Stateless: no session negotiation or server-initiated messages
//! - Transport-level rejections keep their HTTP status (401, 429) and
//!   still carry a JSON-RPC error body
//! - `tools/call` is rate limited before authentication, matching the REST
//!   route middleware

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::auth::AuthContext;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::routing::Endpoint;
use crate::security::path::PathKind;
use crate::security::rate_limit::{RateDecision, RateLimiter, RATE_LIMIT_MESSAGE};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const RATE_LIMITED: i64 = -32000;
pub const AUTH_REQUIRED: i64 = -32001;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// `POST /mcp`
pub async fn handle(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();

    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "Malformed JSON-RPC body");
            metrics::record_request("mcp", 200, start);
            return Json(JsonRpcResponse::failure(Value::Null, PARSE_ERROR, "Parse error"))
                .into_response();
        }
    };

    if request.jsonrpc != "2.0" {
        tracing::debug!(version = %request.jsonrpc, "Non-2.0 JSON-RPC envelope");
    }

    // tools/call draws quota before credentials are checked
    let quota = if request.method == "tools/call" {
        tool_quota(&state, addr, request.params.as_ref())
    } else {
        None
    };
    if let Some(decision) = quota.as_ref().filter(|d| !d.admitted) {
        metrics::record_request("mcp", 429, start);
        return rate_limited(request.id.clone().unwrap_or(Value::Null), decision);
    }

    let credential = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let ctx = state.auth.authenticate(credential).await;

    if !state.auth.authorize(&request.method, ctx.as_ref()) {
        tracing::warn!(method = %request.method, "JSON-RPC call rejected: authentication required");
        metrics::record_request("mcp", 401, start);
        let body = JsonRpcResponse::failure(
            request.id.unwrap_or(Value::Null),
            AUTH_REQUIRED,
            format!("Authentication required for method: {}", request.method),
        );
        let mut response = (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, state.auth.challenge().to_string())],
            Json(body),
        )
            .into_response();
        if let Some(decision) = &quota {
            decision.apply_headers(response.headers_mut());
        }
        return response;
    }

    // notifications get no reply
    let Some(id) = request.id.clone() else {
        metrics::record_request("mcp", 202, start);
        return StatusCode::ACCEPTED.into_response();
    };

    let params = request.params.unwrap_or(Value::Null);
    let response = match request.method.as_str() {
        "initialize" => Json(JsonRpcResponse::success(id, initialize_result())).into_response(),
        "ping" => Json(JsonRpcResponse::success(id, json!({}))).into_response(),
        "tools/list" => Json(JsonRpcResponse::success(id, tools_list(&state))).into_response(),
        "tools/call" => tools_call(&state, id, &params, ctx.as_ref(), quota.as_ref()),
        "resources/read" => Json(resources_read(&state, id, &params)).into_response(),
        other => Json(JsonRpcResponse::failure(
            id,
            METHOD_NOT_FOUND,
            format!("Method not found: {other}"),
        ))
        .into_response(),
    };

    metrics::record_request("mcp", response.status().as_u16(), start);
    response
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "serverInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        },
        "capabilities": {
            "tools": {},
            "resources": {},
        },
    })
}

fn tools_list(state: &AppState) -> Value {
    let tools: Vec<Value> = state
        .directory
        .iter()
        .filter_map(|endpoint| endpoint.tool_name().map(|tool| tool_descriptor(endpoint, tool)))
        .collect();
    json!({ "tools": tools })
}

fn tool_descriptor(endpoint: &Endpoint, tool: &str) -> Value {
    let names = endpoint.pattern().param_names();
    let properties: Map<String, Value> = names
        .iter()
        .map(|name| (name.clone(), json!({ "type": "string" })))
        .collect();

    json!({
        "name": tool,
        "description": endpoint.description(),
        "inputSchema": {
            "type": "object",
            "properties": properties,
            "required": names,
        },
    })
}

/// Admit a `tools/call` against its endpoint's window, if it has one.
fn tool_quota(state: &AppState, addr: SocketAddr, params: Option<&Value>) -> Option<RateDecision> {
    let tool = params?.get("name").and_then(Value::as_str)?;
    let endpoint = state.directory.by_tool_name(tool)?;
    let (max, interval_secs) = endpoint.rate_limit()?;

    let key = RateLimiter::key(&addr, endpoint.pattern().as_str());
    let decision = state
        .limiter
        .admit(&key, max, Duration::from_secs(interval_secs));
    if !decision.admitted {
        tracing::warn!(client = %addr.ip(), tool = %tool, "Rate limit exceeded");
        metrics::record_rate_limited(endpoint.name());
    }
    Some(decision)
}

fn rate_limited(id: Value, decision: &RateDecision) -> Response {
    let mut body = JsonRpcResponse::failure(id, RATE_LIMITED, RATE_LIMIT_MESSAGE);
    if let Some(error) = body.error.as_mut() {
        error.data = Some(json!({ "retryAfter": decision.retry_after }));
    }
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    decision.apply_headers(response.headers_mut());
    response
}

fn tools_call(
    state: &AppState,
    id: Value,
    params: &Value,
    ctx: Option<&AuthContext>,
    quota: Option<&RateDecision>,
) -> Response {
    let Some(tool) = params.get("name").and_then(Value::as_str) else {
        return Json(JsonRpcResponse::failure(id, INVALID_PARAMS, "Missing tool name")).into_response();
    };
    let Some(endpoint) = state.directory.by_tool_name(tool) else {
        return Json(JsonRpcResponse::failure(
            id,
            INVALID_PARAMS,
            format!("Unknown tool: {tool}"),
        ))
        .into_response();
    };

    let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
    let payload = json!({
        "endpoint": endpoint.name(),
        "arguments": arguments,
        "principal": ctx.map(|c| c.principal.as_str()),
    });
    let result = json!({
        "content": [{ "type": "text", "text": payload.to_string() }],
        "isError": false,
    });

    let mut response = Json(JsonRpcResponse::success(id, result)).into_response();
    if let Some(decision) = quota {
        decision.apply_headers(response.headers_mut());
    }
    response
}

fn resources_read(state: &AppState, id: Value, params: &Value) -> JsonRpcResponse {
    let Some(candidate) = params.get("path").and_then(Value::as_str) else {
        return JsonRpcResponse::failure(id, INVALID_PARAMS, "Missing resource path");
    };

    match state.paths.validate(candidate, &state.base_dir) {
        Ok(validated) => {
            let kind = match validated.kind() {
                PathKind::Local => "local",
                PathKind::Remote => "remote",
            };
            JsonRpcResponse::success(
                id,
                json!({ "contents": [{ "uri": validated.as_str(), "kind": kind }] }),
            )
        }
        Err(rejection) => {
            tracing::debug!(path = %candidate, reason = %rejection, "Resource path rejected");
            metrics::record_path_rejection();
            JsonRpcResponse::failure(id, INVALID_PARAMS, rejection.to_string())
        }
    }
}
