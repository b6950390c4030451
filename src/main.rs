//! API gateway (v1)
//!
//! Terminates HTTP(S), raw TCP and gRPC traffic and proxies it to the
//! backends of the matched service.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────────────┐
//!                          │                     API GATEWAY                      │
//!                          │                                                      │
//!   HTTP(S) request        │  ┌──────────┐   ┌─────────────┐   ┌──────────────┐   │
//!   ───────────────────────┼─▶│  http    │──▶│ middleware  │──▶│ proxy        │───┼──▶ Backend
//!                          │  │ server   │   │ chain       │   │ (director)   │   │
//!                          │  └──────────┘   └─────────────┘   └──────┬───────┘   │
//!   gRPC stream            │  ┌──────────┐   ┌─────────────┐          │           │
//!   ───────────────────────┼─▶│  grpc    │──▶│ interceptors│──────────┤           │
//!                          │  └──────────┘   └─────────────┘          ▼           │
//!   TCP connection         │  ┌──────────┐   ┌─────────────┐   ┌──────────────┐   │
//!   ───────────────────────┼─▶│  tcp     │──▶│ slice chain │──▶│load_balancer │   │
//!                          │  └──────────┘   └─────────────┘   │ + pool source│   │
//!                          │                                   └──────────────┘   │
//!                          │  ┌────────────────────────────────────────────────┐  │
//!                          │  │              Cross-Cutting Concerns            │  │
//!                          │  │  config · routing · policy · flow · security   │  │
//!                          │  │  health · discovery · observability · admin    │  │
//!                          │  │  lifecycle (startup / signals / shutdown)      │  │
//!                          │  └────────────────────────────────────────────────┘  │
//!                          └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use api_gateway::config::loader::load_config;
use api_gateway::observability::logging::init_logging;
use api_gateway::Gateway;
use clap::Parser;

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "HTTP, TCP and gRPC API gateway", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {}", args.config.display(), e);
            std::process::exit(2);
        }
    };

    init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        "api-gateway starting"
    );

    if config.auth.jwt_secret == "CHANGE_ME_IN_PRODUCTION" {
        tracing::warn!("Using the placeholder JWT secret; set [auth] jwt_secret");
    }

    let gateway = Gateway::start(config).await?;
    gateway.run_until_signal().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
