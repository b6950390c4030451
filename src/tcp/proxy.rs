//! TCP reverse proxy: dial a backend and pump bytes both ways.
//!
//! # Design Decisions
//! - The first direction to finish ends the session; the other side is
//!   closed rather than drained
//! - Shutdown ends every pump
//! - A failed dial goes to the `on_dial_error` callback, which closes the
//!   client connection without writing to it

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::net::{lookup_host, TcpSocket, TcpStream};

use super::router::{TcpHandler, TcpSliceContext};
use crate::lifecycle::Shutdown;
use crate::load_balancer::LoadBalanceError;
use crate::policy::{RejectReason, Rejection};

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("get backend failed: {0}")]
    Backend(#[from] LoadBalanceError),
    #[error("resolve {addr}: {source}")]
    Resolve { addr: String, source: io::Error },
    #[error("no address resolved for {0}")]
    NoAddress(String),
    #[error("dial {addr}: {source}")]
    Dial { addr: String, source: io::Error },
    #[error("dial {0}: timed out")]
    DialTimeout(String),
}

/// Called when the backend cannot be reached.
pub type DialErrorHandler = Arc<dyn Fn(&SocketAddr, &str, &ProxyError) + Send + Sync>;

/// Which side ended a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpEnd {
    /// Client to backend direction finished first.
    Client,
    /// Backend to client direction finished first.
    Backend,
    Shutdown,
}

/// Terminal stage of the TCP chain.
pub struct TcpReverseProxy {
    on_dial_error: DialErrorHandler,
}

impl TcpReverseProxy {
    pub fn new() -> Self {
        Self {
            on_dial_error: Arc::new(|peer, backend, err| {
                tracing::warn!(peer = %peer, backend = %backend, error = %err, "Backend dial failed");
            }),
        }
    }

    pub fn with_dial_error_handler(handler: DialErrorHandler) -> Self {
        Self { on_dial_error: handler }
    }
}

impl Default for TcpReverseProxy {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpHandler for TcpReverseProxy {
    fn serve<'a>(&'a self, ctx: &'a mut TcpSliceContext) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let balancer = ctx.state.balancers.get(&ctx.service);
            let target = match balancer.get(&ctx.client_ip()) {
                Ok(target) => target,
                Err(e) => {
                    let err = ProxyError::from(e);
                    ctx.reject(Rejection::new(RejectReason::BackendUnavailable, err.to_string()))
                        .await;
                    return;
                }
            };

            let connect_timeout = ctx.service.load_balance.connect_timeout();
            let backend = match dial(&target, connect_timeout).await {
                Ok(stream) => stream,
                Err(e) => {
                    (self.on_dial_error)(&ctx.peer, &target, &e);
                    ctx.close().await;
                    return;
                }
            };

            let Some(client) = ctx.take_conn() else {
                return;
            };
            tracing::debug!(service = %ctx.service.name, peer = %ctx.peer, backend = %target, "TCP session started");
            let end = pump(client, backend, &ctx.shutdown).await;
            tracing::debug!(service = %ctx.service.name, peer = %ctx.peer, ended_by = ?end, "TCP session closed");
            ctx.abort();
        })
    }
}

/// Resolve `addr` and connect with keep-alive, bounded by `connect_timeout`.
pub async fn dial(addr: &str, connect_timeout: Duration) -> Result<TcpStream, ProxyError> {
    let connect = async {
        let resolved = lookup_host(addr)
            .await
            .map_err(|source| ProxyError::Resolve {
                addr: addr.to_string(),
                source,
            })?
            .next()
            .ok_or_else(|| ProxyError::NoAddress(addr.to_string()))?;

        let dial_err = |source| ProxyError::Dial {
            addr: addr.to_string(),
            source,
        };
        let socket = if resolved.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(dial_err)?;
        socket.set_keepalive(true).map_err(dial_err)?;

        let stream = socket.connect(resolved).await.map_err(dial_err)?;
        stream.set_nodelay(true).map_err(dial_err)?;
        Ok(stream)
    };

    tokio::time::timeout(connect_timeout, connect)
        .await
        .map_err(|_| ProxyError::DialTimeout(addr.to_string()))?
}

/// Copy bytes both ways until either direction ends or shutdown fires.
pub async fn pump(client: TcpStream, backend: TcpStream, shutdown: &Shutdown) -> PumpEnd {
    let (mut client_read, mut client_write) = client.into_split();
    let (mut backend_read, mut backend_write) = backend.into_split();

    let upstream = tokio::io::copy(&mut client_read, &mut backend_write);
    let downstream = tokio::io::copy(&mut backend_read, &mut client_write);

    tokio::select! {
        result = upstream => {
            if let Err(e) = result {
                tracing::trace!(error = %e, "Client side copy ended");
            }
            PumpEnd::Client
        }
        result = downstream => {
            if let Err(e) = result {
                tracing::trace!(error = %e, "Backend side copy ended");
            }
            PumpEnd::Backend
        }
        _ = shutdown.wait() => PumpEnd::Shutdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GatewayConfig, LoadBalanceConfig, ServiceDetail, ServiceRule, TcpRule};
    use crate::state::GatewayState;
    use crate::tcp::router::{TcpSliceGroup, TcpSliceRouter};
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn connected_pair(listener: &TcpListener) -> (TcpStream, TcpStream) {
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn dial_refused_port_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = dial(&addr.to_string(), Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, ProxyError::Dial { .. }));
    }

    #[tokio::test]
    async fn dial_failure_calls_handler_and_closes_client() {
        let refused = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let state = Arc::new(GatewayState::from_config(GatewayConfig::default(), Shutdown::new()));
        let service = Arc::new(ServiceDetail {
            name: "down".into(),
            description: String::new(),
            rule: ServiceRule::Tcp(TcpRule { port: 0 }),
            access_control: Default::default(),
            load_balance: LoadBalanceConfig {
                ip_list: vec![refused.to_string()],
                ..Default::default()
            },
        });

        let failures = Arc::new(Mutex::new(Vec::new()));
        let seen = failures.clone();
        let on_dial_error: DialErrorHandler =
            Arc::new(move |_peer: &SocketAddr, backend: &str, err: &ProxyError| {
                let refused = matches!(err, ProxyError::Dial { .. });
                seen.lock().unwrap().push((backend.to_string(), refused));
            });
        let proxy = TcpReverseProxy::with_dial_error_handler(on_dial_error);
        let router = TcpSliceRouter::new(TcpSliceGroup::new().with(proxy));

        let front = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (mut user, gateway_client) = connected_pair(&front).await;
        let peer = user.local_addr().unwrap();
        router
            .serve_tcp(TcpSliceContext::new(
                gateway_client,
                peer,
                service,
                state.clone(),
                Shutdown::new(),
            ))
            .await;

        assert_eq!(*failures.lock().unwrap(), vec![(refused.to_string(), true)]);

        // Closed without a rejection line.
        let mut rest = Vec::new();
        user.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
        state.shutdown.trigger();
    }

    #[tokio::test]
    async fn pump_relays_and_ends_with_first_side() {
        let front = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let back = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (mut user, gateway_client) = connected_pair(&front).await;
        let (gateway_backend, mut backend) = connected_pair(&back).await;

        let shutdown = Shutdown::new();
        let pumping = tokio::spawn(async move { pump(gateway_client, gateway_backend, &shutdown).await });

        user.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        backend.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        backend.write_all(b"pong").await.unwrap();
        user.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");

        drop(backend);
        assert_eq!(pumping.await.unwrap(), PumpEnd::Backend);

        // The gateway closed the client side too.
        let mut rest = Vec::new();
        user.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn pump_stops_on_shutdown() {
        let front = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let back = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (_user, gateway_client) = connected_pair(&front).await;
        let (gateway_backend, _backend) = connected_pair(&back).await;

        let shutdown = Shutdown::new();
        let trigger = shutdown.clone();
        let pumping = tokio::spawn(async move { pump(gateway_client, gateway_backend, &shutdown).await });
        trigger.trigger();

        assert_eq!(pumping.await.unwrap(), PumpEnd::Shutdown);
    }
}
