//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build shared admission state from configuration
//! - Create the Axum router (REST, JSON-RPC, health)
//! - Wire up middleware (rate limiting, timeout, tracing, request ID)
//! - Serve over plain TCP or rustls, with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{any, get, post},
    Json, Router,
};
use axum_server::Handle;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::timeout::TimeoutLayer;

use crate::auth::oidc::DiscoveryClient;
use crate::auth::AuthenticationGateway;
use crate::config::GatewayConfig;
use crate::http::request::with_request_tracing;
use crate::http::{mcp, rest};
use crate::lifecycle::shutdown::{self, Shutdown};
use crate::net::tls::load_tls_config;
use crate::routing::{EndpointDirectory, PatternError};
use crate::security::path::PathSecurityValidator;
use crate::security::rate_limit::{rate_limit_middleware, RateLimitState, RateLimiter};

/// Grace period for in-flight TLS connections on shutdown.
const TLS_DRAIN_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TLS setup failed: {0}")]
    Tls(std::io::Error),
    #[error("invalid endpoint pattern: {0}")]
    Routing(#[from] PatternError),
    #[error("invalid bind address '{0}'")]
    InvalidAddress(String),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<EndpointDirectory>,
    pub limiter: Arc<RateLimiter>,
    pub auth: Arc<AuthenticationGateway>,
    pub paths: Arc<PathSecurityValidator>,
    pub base_dir: Arc<str>,
}

impl AppState {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ServerError> {
        let discovery = Arc::new(DiscoveryClient::from_config(&config.discovery));

        Ok(Self {
            directory: Arc::new(EndpointDirectory::from_config(&config.endpoints)?),
            limiter: Arc::new(RateLimiter::new(config.rate_limit.sweep_every)),
            auth: Arc::new(AuthenticationGateway::new(&config.auth, discovery)),
            paths: Arc::new(PathSecurityValidator::from_config(&config.paths)),
            base_dir: Arc::from(config.paths.base_dir.as_str()),
        })
    }
}

/// HTTP server for the endpoint gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Create a new server with the given (validated) configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let state = AppState::from_config(&config)?;
        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let rate_limit_state = RateLimitState {
            limiter: Arc::clone(&state.limiter),
            directory: Arc::clone(&state.directory),
        };

        let rest_routes = Router::new()
            .route("/", any(rest::handle))
            .route("/{*path}", any(rest::handle))
            .route_layer(middleware::from_fn_with_state(
                rate_limit_state,
                rate_limit_middleware,
            ));

        let router = Router::new()
            .route("/health", get(health))
            .route("/mcp", post(mcp::handle))
            .merge(rest_routes)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )));

        with_request_tracing(router)
    }

    /// The fully layered router; handy for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Bind the configured address and serve until `shutdown` fires.
    pub async fn run(self, shutdown: &Shutdown) -> Result<(), ServerError> {
        match self.config.listener.tls.clone() {
            Some(tls) => {
                let addr: SocketAddr = self
                    .config
                    .listener
                    .bind_address
                    .parse()
                    .map_err(|_| ServerError::InvalidAddress(self.config.listener.bind_address.clone()))?;
                let rustls = load_tls_config(&tls).await.map_err(ServerError::Tls)?;

                let handle = Handle::new();
                let drain = handle.clone();
                let rx = shutdown.subscribe();
                tokio::spawn(async move {
                    shutdown::wait(rx).await;
                    drain.graceful_shutdown(Some(Duration::from_secs(TLS_DRAIN_SECS)));
                });

                tracing::info!(address = %addr, "HTTPS server starting");
                axum_server::bind_rustls(addr, rustls)
                    .handle(handle)
                    .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
                    .await?;
                tracing::info!("HTTPS server stopped");
                Ok(())
            }
            None => {
                let listener = TcpListener::bind(&self.config.listener.bind_address).await?;
                self.serve(listener, shutdown.subscribe()).await
            }
        }
    }

    /// Serve plain HTTP on an already-bound listener.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, endpoints = self.config.endpoints.len(), "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
