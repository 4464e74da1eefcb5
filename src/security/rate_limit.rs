//! Fixed-window rate limiting keyed by caller and route.
//!
//! # Responsibilities
//! - Track a window per `<ip>|<route>` key
//! - Admit or reject, always reporting quota metadata
//! - Emit `X-RateLimit-*` headers and 429 rejections
//!
//! # Design Decisions
//! - Every attempt decrements, even when already exhausted; debt is
//!   forgiven only when the window rolls over
//! - Expired windows are swept opportunistically every N-th call
//! - One mutex around the whole map; no background timers

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::observability::metrics;
use crate::routing::EndpointDirectory;

pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Try again later.";

const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

struct RateWindow {
    remaining: i64,
    reset_at: Instant,
}

/// Outcome of one admission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateDecision {
    pub admitted: bool,
    pub limit: u32,
    /// Raw counter after this attempt; negative once the window is in debt.
    pub remaining: i64,
    pub reset_at: Instant,
    /// Window reset as Unix seconds.
    pub reset_unix: u64,
    /// Seconds until reset, only on rejection.
    pub retry_after: Option<u64>,
}

impl RateDecision {
    /// Remaining quota as shown to callers.
    pub fn remaining_display(&self) -> u64 {
        self.remaining.max(0) as u64
    }

    /// Add the quota headers to `headers`.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(self.remaining_display()));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(self.reset_unix));
        if let Some(retry_after) = self.retry_after {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }
    }
}

/// Per-key fixed-window counters.
pub struct RateLimiter {
    windows: Mutex<HashMap<String, RateWindow>>,
    calls: AtomicU64,
    sweep_every: u64,
}

impl RateLimiter {
    pub fn new(sweep_every: u64) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            calls: AtomicU64::new(0),
            sweep_every: sweep_every.max(1),
        }
    }

    /// Composite key for a caller on a route.
    pub fn key(addr: &SocketAddr, route: &str) -> String {
        format!("{}|{}", addr.ip(), route)
    }

    pub fn admit(&self, key: &str, max: u32, interval: Duration) -> RateDecision {
        self.admit_at(key, max, interval, Instant::now())
    }

    /// Admission against an explicit clock reading.
    pub fn admit_at(&self, key: &str, max: u32, interval: Duration, now: Instant) -> RateDecision {
        let calls = self.calls.fetch_add(1, Ordering::Relaxed) + 1;

        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        if calls % self.sweep_every == 0 {
            let before = windows.len();
            windows.retain(|_, window| now < window.reset_at);
            tracing::trace!(purged = before - windows.len(), "Swept expired rate windows");
        }

        let window = windows.entry(key.to_string()).or_insert_with(|| RateWindow {
            remaining: i64::from(max),
            reset_at: now + interval,
        });

        if now >= window.reset_at {
            window.remaining = i64::from(max);
            window.reset_at = now + interval;
        }

        window.remaining -= 1;

        let remaining = window.remaining;
        let reset_at = window.reset_at;
        drop(windows);

        let until_reset = reset_at.saturating_duration_since(now);
        let admitted = remaining >= 0;

        RateDecision {
            admitted,
            limit: max,
            remaining,
            reset_at,
            reset_unix: unix_seconds_after(until_reset),
            retry_after: (!admitted).then(|| until_reset.as_secs().max(1)),
        }
    }

    /// Number of tracked windows.
    pub fn len(&self) -> usize {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn unix_seconds_after(offset: Duration) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (now + offset).as_secs()
}

/// 429 response carrying the quota headers.
pub fn rejection_response(decision: &RateDecision) -> Response {
    let mut response = Response::new(Body::from(RATE_LIMIT_MESSAGE));
    *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    decision.apply_headers(response.headers_mut());
    response
}

/// State for the REST rate limiting middleware.
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub directory: Arc<EndpointDirectory>,
}

/// Middleware applying per-endpoint limits to the REST surface.
pub async fn rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(hit) = state.directory.resolve(request.uri().path()) else {
        return next.run(request).await;
    };
    let Some((max, interval_secs)) = hit.endpoint.rate_limit() else {
        return next.run(request).await;
    };

    let route = hit.endpoint.pattern().as_str();
    let key = RateLimiter::key(&addr, route);
    let decision = state
        .limiter
        .admit(&key, max, Duration::from_secs(interval_secs));

    if !decision.admitted {
        tracing::warn!(
            client = %addr.ip(),
            route = %route,
            retry_after = ?decision.retry_after,
            "Rate limit exceeded"
        );
        metrics::record_rate_limited(hit.endpoint.name());
        return rejection_response(&decision);
    }

    let mut response = next.run(request).await;
    decision.apply_headers(response.headers_mut());
    response
}
