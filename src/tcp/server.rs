//! Per-service TCP listeners.
//!
//! # Responsibilities
//! - Accept connections on the service port under the connection limit
//! - Run each connection through the service's chain on its own task
//! - On shutdown, stop accepting and wait (bounded) for live sessions

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;

use super::middleware::{TcpFlowCount, TcpFlowLimit, TcpIpLists};
use super::proxy::TcpReverseProxy;
use super::router::{TcpSliceContext, TcpSliceGroup, TcpSliceRouter};
use crate::config::ServiceDetail;
use crate::http::SharedState;
use crate::lifecycle::Shutdown;
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{Listener, ListenerError};
use crate::observability::metrics;

/// Pause after a failed accept so a persistent error does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// TCP server bound to one service's port.
pub struct TcpServer {
    state: SharedState,
    service: Arc<ServiceDetail>,
    router: TcpSliceRouter,
    tracker: ConnectionTracker,
}

impl TcpServer {
    /// Server with the standard chain: flow count, flow limit, IP lists, proxy.
    pub fn new(state: SharedState, service: Arc<ServiceDetail>) -> Self {
        let group = TcpSliceGroup::new()
            .with(TcpFlowCount)
            .with(TcpFlowLimit)
            .with(TcpIpLists)
            .with(TcpReverseProxy::new());
        Self::with_group(state, service, group)
    }

    pub fn with_group(state: SharedState, service: Arc<ServiceDetail>, group: TcpSliceGroup) -> Self {
        Self {
            state,
            service,
            router: TcpSliceRouter::new(group),
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn bind_address(&self) -> Option<String> {
        let port = self.service.listen_port()?;
        Some(format!("{}:{}", self.state.config.tcp.bind_host, port))
    }

    pub async fn run(self, listener: Listener, shutdown: Shutdown) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        let name = self.service.name.clone();
        tracing::info!(service = %name, address = %addr, "TCP server starting");

        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = shutdown.wait() => break,
            };

            match accepted {
                Ok((stream, peer, permit)) => {
                    let guard = self.tracker.track();
                    let ctx = TcpSliceContext::new(
                        stream,
                        peer,
                        self.service.clone(),
                        self.state.clone(),
                        shutdown.clone(),
                    );
                    let router = self.router.clone();
                    let service = name.clone();

                    metrics::tcp_connection_opened(&service);
                    tokio::spawn(async move {
                        let _permit = permit;
                        let connection_id = guard.id();
                        let served = AssertUnwindSafe(router.serve_tcp(ctx)).catch_unwind().await;
                        if served.is_err() {
                            tracing::error!(service = %service, connection_id = %connection_id, "TCP handler panicked");
                        }
                        metrics::tcp_connection_closed(&service);
                        drop(guard);
                    });
                }
                Err(ListenerError::Accept(e)) => {
                    tracing::warn!(service = %name, error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
                Err(e) => {
                    tracing::error!(service = %name, error = %e, "Listener stopped");
                    break;
                }
            }
        }

        drop(listener);
        let drain = Duration::from_secs(self.state.config.shutdown.drain_timeout_secs);
        if !self.tracker.drain(drain).await {
            tracing::warn!(
                service = %name,
                remaining = self.tracker.active_count(),
                "TCP drain timed out"
            );
        }
        tracing::info!(service = %name, address = %addr, "TCP server stopped");
        Ok(())
    }
}
