//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router: one catch-all proxy route behind the middleware chain
//! - Wire up outer layers (tracing, body limit, timeout, request ID)
//! - Serve plain HTTP and, when configured, HTTPS
//! - Drain in-flight requests on shutdown
//!
//! # Design Decisions
//! - Services are matched by the chain, not by axum routes, so the route
//!   table never changes with the catalog
//! - Connect info is attached so the chain sees the peer address

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::middleware::{
    access_control, access_mode, flow_count, flow_limit, header_transform, jwt_auth, strip_uri,
    tenant_flow_count, tenant_flow_limit, url_rewrite,
};
use super::proxy::proxy_handler;
use super::request::{propagate_request_id_layer, set_request_id_layer};
use crate::config::HttpsListenerConfig;
use crate::lifecycle::shutdown::{drain_task, Shutdown};
use crate::net::tls::load_tls_config;
use crate::state::GatewayState;

/// State injected into handlers and middleware.
pub type SharedState = Arc<GatewayState>;

/// HTTP server of the gateway.
pub struct HttpServer {
    router: Router,
    state: SharedState,
}

impl HttpServer {
    pub fn new(state: SharedState) -> Self {
        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(state: SharedState) -> Router {
        let http = &state.config.http;

        let chain = ServiceBuilder::new()
            .layer(from_fn_with_state(state.clone(), access_mode))
            .layer(from_fn_with_state(state.clone(), flow_count))
            .layer(from_fn_with_state(state.clone(), flow_limit))
            .layer(from_fn_with_state(state.clone(), jwt_auth))
            .layer(from_fn_with_state(state.clone(), tenant_flow_count))
            .layer(from_fn_with_state(state.clone(), tenant_flow_limit))
            .layer(from_fn(access_control))
            .layer(from_fn(header_transform))
            .layer(from_fn(strip_uri))
            .layer(from_fn(url_rewrite));

        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .layer(chain)
            .with_state(state.clone())
            .layer(RequestBodyLimitLayer::new(http.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(http.request_timeout_secs)))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(TraceLayer::new_for_http())
    }

    /// Serve plain HTTP on `listener` until shutdown, then drain.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let drain = self.drain_timeout();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let signal = shutdown.clone();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move { signal.wait().await });
        let task = tokio::spawn(async move { server.await });

        drain_task("http", task, &shutdown, drain).await?;
        tracing::info!(address = %addr, "HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS with the configured certificate until shutdown.
    pub async fn run_tls(self, tls: HttpsListenerConfig, shutdown: Shutdown) -> std::io::Result<()> {
        let addr: SocketAddr = tls
            .bind_address
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let rustls = load_tls_config(&tls)
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let handle = axum_server::Handle::new();
        let drain = self.drain_timeout();
        let watcher = handle.clone();
        let signal = shutdown.clone();
        tokio::spawn(async move {
            signal.wait().await;
            watcher.graceful_shutdown(Some(drain));
        });

        tracing::info!(address = %addr, "HTTPS server starting");
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(app)
            .await?;
        tracing::info!(address = %addr, "HTTPS server stopped");
        Ok(())
    }

    fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.state.config.shutdown.drain_timeout_secs)
    }
}
