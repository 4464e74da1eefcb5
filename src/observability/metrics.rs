//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, rejections, discovery fetches)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by surface, status
//! - `gateway_request_duration_seconds` (histogram): latency by surface
//! - `gateway_rate_limited_total` (counter): rejections by endpoint
//! - `gateway_auth_failures_total` (counter): failures by scheme
//! - `gateway_discovery_fetch_total` (counter): fetches by outcome
//! - `gateway_path_rejections_total` (counter): refused storage paths
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op (tests, `--validate-only`)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(surface: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "surface" => surface,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "surface" => surface)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(endpoint: &str) {
    metrics::counter!("gateway_rate_limited_total", "endpoint" => endpoint.to_string())
        .increment(1);
}

pub fn record_auth_failure(scheme: &'static str) {
    metrics::counter!("gateway_auth_failures_total", "scheme" => scheme).increment(1);
}

pub fn record_discovery_fetch(outcome: &'static str) {
    metrics::counter!("gateway_discovery_fetch_total", "outcome" => outcome).increment(1);
}

pub fn record_path_rejection() {
    metrics::counter!("gateway_path_rejections_total").increment(1);
}
