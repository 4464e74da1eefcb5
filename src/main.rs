//! Endpoint gateway
//!
//! Serves declared data endpoints over REST and JSON-RPC, admitting each call
//! through routing, rate limiting and authentication.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id / trace ─▶ timeout ─▶ router
//!                                                       │
//!                    ┌──────────────────────────────────┼──────────────────┐
//!                    ▼                                  ▼                  ▼
//!               /{*path}                              /mcp             /health
//!          rate_limit middleware                 auth by method
//!                    │                          tools/call → rate limit
//!                    ▼                          resources/read → path policy
//!          auth by endpoint name
//!                    │
//!                    ▼
//!            acknowledge (200)
//! ```

use std::path::PathBuf;

use clap::Parser;

use endpoint_gateway::config::{load_config, GatewayConfig};
use endpoint_gateway::observability::{logging, metrics};
use endpoint_gateway::{GatewayServer, Shutdown};

#[derive(Parser)]
#[command(name = "endpoint-gateway")]
#[command(about = "Admission gateway for declared data endpoints", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    validate_only: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability);

    if cli.validate_only {
        tracing::info!(endpoints = config.endpoints.len(), "Configuration is valid");
        return Ok(());
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        endpoints = config.endpoints.len(),
        auth_enabled = config.auth.enabled,
        tls = config.listener.tls.is_some(),
        "endpoint-gateway starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown.clone().trigger_on_ctrl_c());

    let server = GatewayServer::new(config)?;
    server.run(&shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
