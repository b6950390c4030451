//! Minimal middleware chain for TCP connections.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::Extensions;
use futures_util::future::BoxFuture;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::config::ServiceDetail;
use crate::http::SharedState;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::policy::Rejection;

/// One stage of the TCP chain.
pub trait TcpHandler: Send + Sync {
    fn serve<'a>(&'a self, ctx: &'a mut TcpSliceContext) -> BoxFuture<'a, ()>;
}

/// Ordered list of handlers, built once per service.
#[derive(Clone, Default)]
pub struct TcpSliceGroup {
    handlers: Vec<Arc<dyn TcpHandler>>,
}

impl TcpSliceGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler to the chain.
    pub fn with(mut self, handler: impl TcpHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Per-connection state threaded through the chain.
pub struct TcpSliceContext {
    conn: Option<TcpStream>,
    pub peer: SocketAddr,
    pub service: Arc<ServiceDetail>,
    pub state: SharedState,
    pub shutdown: Shutdown,
    /// Values handlers pass to later handlers.
    pub extensions: Extensions,
    aborted: bool,
}

impl TcpSliceContext {
    pub fn new(
        conn: TcpStream,
        peer: SocketAddr,
        service: Arc<ServiceDetail>,
        state: SharedState,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            conn: Some(conn),
            peer,
            service,
            state,
            shutdown,
            extensions: Extensions::new(),
            aborted: false,
        }
    }

    pub fn client_ip(&self) -> String {
        self.peer.ip().to_string()
    }

    /// Stop the chain after the current handler.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Take the client connection; later handlers see none.
    pub fn take_conn(&mut self) -> Option<TcpStream> {
        self.conn.take()
    }

    /// Write the rejection as one line, close the connection and abort.
    pub async fn reject(&mut self, rejection: Rejection) {
        metrics::record_rejected("tcp", rejection.reason);
        tracing::info!(
            service = %self.service.name,
            peer = %self.peer,
            code = rejection.code(),
            message = %rejection.message,
            "TCP connection rejected"
        );
        if let Some(mut conn) = self.conn.take() {
            let line = format!("{}\n", rejection.message);
            if let Err(e) = conn.write_all(line.as_bytes()).await {
                tracing::debug!(peer = %self.peer, error = %e, "Failed to write rejection");
            }
            let _ = conn.shutdown().await;
        }
        self.abort();
    }

    /// Close the client connection without writing anything, and abort.
    pub async fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            let _ = conn.shutdown().await;
        }
        self.abort();
    }
}

/// Runs a group's handlers for each accepted connection.
#[derive(Clone)]
pub struct TcpSliceRouter {
    handlers: Arc<[Arc<dyn TcpHandler>]>,
}

impl TcpSliceRouter {
    pub fn new(group: TcpSliceGroup) -> Self {
        Self {
            handlers: group.handlers.into(),
        }
    }

    /// Drive the chain until a handler aborts or the chain is exhausted.
    pub async fn serve_tcp(&self, mut ctx: TcpSliceContext) {
        for handler in self.handlers.iter() {
            if ctx.is_aborted() {
                break;
            }
            handler.serve(&mut ctx).await;
        }
    }
}
