//! Per-service gRPC listeners.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::middleware::from_fn_with_state;
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::middleware::{
    grpc_access_control, grpc_flow_count, grpc_flow_limit, grpc_header_transform, grpc_jwt_auth,
    grpc_tenant_flow_count, grpc_tenant_flow_limit, GrpcContext,
};
use super::proxy::grpc_proxy;
use crate::config::ServiceDetail;
use crate::http::SharedState;
use crate::lifecycle::shutdown::{drain_task, Shutdown};

/// gRPC server bound to one service's port.
pub struct GrpcServer {
    ctx: GrpcContext,
}

impl GrpcServer {
    pub fn new(state: SharedState, service: Arc<ServiceDetail>) -> Self {
        Self {
            ctx: GrpcContext { state, service },
        }
    }

    /// Every path is a method of the proxied service, so the proxy is the fallback.
    pub fn build_router(ctx: GrpcContext) -> Router {
        let chain = ServiceBuilder::new()
            .layer(from_fn_with_state(ctx.clone(), grpc_flow_count))
            .layer(from_fn_with_state(ctx.clone(), grpc_flow_limit))
            .layer(from_fn_with_state(ctx.clone(), grpc_jwt_auth))
            .layer(from_fn_with_state(ctx.clone(), grpc_tenant_flow_count))
            .layer(from_fn_with_state(ctx.clone(), grpc_tenant_flow_limit))
            .layer(from_fn_with_state(ctx.clone(), grpc_access_control))
            .layer(from_fn_with_state(ctx.clone(), grpc_header_transform));

        Router::new()
            .fallback(grpc_proxy)
            .layer(chain)
            .with_state(ctx)
            .layer(TraceLayer::new_for_grpc())
    }

    /// Address the listener should bind: the shared TCP bind host and the service port.
    pub fn bind_address(&self) -> Option<String> {
        let port = self.ctx.service.listen_port()?;
        Some(format!("{}:{}", self.ctx.state.config.tcp.bind_host, port))
    }

    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        let name = self.ctx.service.name.clone();
        let drain = Duration::from_secs(self.ctx.state.config.shutdown.drain_timeout_secs);
        tracing::info!(service = %name, address = %addr, "gRPC server starting");

        let app = Self::build_router(self.ctx).into_make_service_with_connect_info::<SocketAddr>();
        let signal = shutdown.clone();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move { signal.wait().await });
        let task = tokio::spawn(async move { server.await });

        drain_task(&name, task, &shutdown, drain).await?;
        tracing::info!(service = %name, address = %addr, "gRPC server stopped");
        Ok(())
    }
}
