//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the shared state and load the service and tenant catalogs
//! - Start the metrics exporter
//! - Bind every listener: shared HTTP(S), one per TCP/gRPC service, admin
//! - Supervise the servers until they stop
//!
//! # Design Decisions
//! - Fail fast: a catalog or bind error aborts startup
//! - All listeners are bound before any serves, so a bad port leaves no
//!   half-started gateway
//! - A server that fails at runtime triggers shutdown of the rest

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use super::shutdown::{drain_task, Shutdown};
use super::signals::spawn_signal_handler;
use crate::admin::setup_admin_router;
use crate::config::GatewayConfig;
use crate::grpc::GrpcServer;
use crate::http::{HttpServer, SharedState};
use crate::net::listener::Listener;
use crate::observability::metrics;
use crate::routing::catalog::CatalogError;
use crate::routing::DirectoryError;
use crate::state::{Dependencies, GatewayState};
use crate::tcp::TcpServer;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load services: {0}")]
    Services(#[from] DirectoryError),

    #[error("failed to load tenants: {0}")]
    Tenants(#[from] CatalogError),

    #[error("failed to bind {name} on {addr}: {source}")]
    Bind {
        name: String,
        addr: String,
        source: io::Error,
    },
}

/// Addresses the gateway actually listens on.
#[derive(Debug, Clone, Default)]
pub struct BoundAddresses {
    pub http: Option<SocketAddr>,
    pub admin: Option<SocketAddr>,
    /// Dedicated listeners of TCP and gRPC services, by service name.
    pub services: HashMap<String, SocketAddr>,
}

type ServerResult = (String, io::Result<()>);

/// A running gateway.
pub struct Gateway {
    state: SharedState,
    shutdown: Shutdown,
    addresses: BoundAddresses,
    servers: JoinSet<ServerResult>,
}

impl Gateway {
    /// Start with the collaborators the configuration implies.
    pub async fn start(config: GatewayConfig) -> Result<Self, StartupError> {
        let deps = Dependencies::from_config(&config);
        Self::start_with(config, deps).await
    }

    pub async fn start_with(config: GatewayConfig, deps: Dependencies) -> Result<Self, StartupError> {
        let shutdown = Shutdown::new();
        let state: SharedState = Arc::new(GatewayState::new(config, deps, shutdown.clone()));
        let config = state.config.clone();

        state.services.load_once()?;
        state.tenants.load_once()?;
        tracing::info!(
            services = state.services.services().len(),
            "Service catalog loaded"
        );

        if config.observability.metrics_enabled {
            match config.observability.metrics_address.parse::<SocketAddr>() {
                Ok(addr) => metrics::init_metrics(addr),
                Err(e) => tracing::warn!(
                    address = %config.observability.metrics_address,
                    error = %e,
                    "Invalid metrics address, exporter disabled"
                ),
            }
        }

        let mut addresses = BoundAddresses::default();

        let http_listener = bind_tokio("http", &config.http.bind_address).await?;
        addresses.http = http_listener.local_addr().ok();

        let mut tcp = Vec::new();
        for service in state.services.tcp_services() {
            let server = TcpServer::new(state.clone(), service.clone());
            let Some(addr) = server.bind_address() else {
                continue;
            };
            let listener = Listener::bind(&addr, config.tcp.max_connections)
                .await
                .map_err(|e| StartupError::Bind {
                    name: service.name.clone(),
                    addr: addr.clone(),
                    source: e.into(),
                })?;
            if let Ok(local) = listener.local_addr() {
                addresses.services.insert(service.name.clone(), local);
            }
            tcp.push((server, listener));
        }

        let mut grpc = Vec::new();
        for service in state.services.grpc_services() {
            let server = GrpcServer::new(state.clone(), service.clone());
            let Some(addr) = server.bind_address() else {
                continue;
            };
            let listener = bind_tokio(&service.name, &addr).await?;
            if let Ok(local) = listener.local_addr() {
                addresses.services.insert(service.name.clone(), local);
            }
            grpc.push((server, listener));
        }

        let admin_listener = if config.admin.enabled {
            let listener = bind_tokio("admin", &config.admin.bind_address).await?;
            addresses.admin = listener.local_addr().ok();
            Some(listener)
        } else {
            None
        };

        let mut servers = JoinSet::new();

        let http = HttpServer::new(state.clone());
        let signal = shutdown.clone();
        servers.spawn(async move { ("http".to_string(), http.run(http_listener, signal).await) });

        if let Some(tls) = config.https.clone() {
            let https = HttpServer::new(state.clone());
            let signal = shutdown.clone();
            servers.spawn(async move { ("https".to_string(), https.run_tls(tls, signal).await) });
        }

        for (server, listener) in tcp {
            let signal = shutdown.clone();
            servers.spawn(async move { ("tcp".to_string(), server.run(listener, signal).await) });
        }

        for (server, listener) in grpc {
            let signal = shutdown.clone();
            servers.spawn(async move { ("grpc".to_string(), server.run(listener, signal).await) });
        }

        if let Some(listener) = admin_listener {
            let router = setup_admin_router(state.clone());
            let signal = shutdown.clone();
            let drain = Duration::from_secs(config.shutdown.drain_timeout_secs);
            servers.spawn(async move {
                let wait = signal.clone();
                let server = axum::serve(listener, router).with_graceful_shutdown(async move { wait.wait().await });
                let task = tokio::spawn(async move { server.await });
                ("admin".to_string(), drain_task("admin", task, &signal, drain).await)
            });
        }

        tracing::info!(
            http = ?addresses.http,
            admin = ?addresses.admin,
            services = addresses.services.len(),
            "Gateway started"
        );

        Ok(Self {
            state,
            shutdown,
            addresses,
            servers,
        })
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    pub fn addresses(&self) -> &BoundAddresses {
        &self.addresses
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Serve until SIGINT/SIGTERM, then drain.
    pub async fn run_until_signal(self) {
        spawn_signal_handler(self.shutdown.clone());
        self.join().await;
    }

    /// Wait for every server to stop.
    pub async fn join(mut self) {
        while let Some(joined) = self.servers.join_next().await {
            match joined {
                Ok((name, Ok(()))) => tracing::debug!(server = %name, "Server exited"),
                Ok((name, Err(e))) => {
                    tracing::error!(server = %name, error = %e, "Server failed, shutting down");
                    self.shutdown.trigger();
                }
                Err(e) => {
                    tracing::error!(error = %e, "Server task panicked, shutting down");
                    self.shutdown.trigger();
                }
            }
        }
        tracing::info!("Gateway stopped");
    }
}

async fn bind_tokio(name: &str, addr: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(addr).await.map_err(|source| StartupError::Bind {
        name: name.to_string(),
        addr: addr.to_string(),
        source,
    })
}
