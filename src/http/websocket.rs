//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Forward the upgrade handshake to the backend
//! - Once both sides switched protocols, relay raw bytes between them
//!
//! # Data Flow
//! ```text
//! Client ←──── upgraded connection ────→ Gateway ←──── upgraded connection ────→ Backend
//! ```
//!
//! # Design Decisions
//! - Byte-level relay: frames, pings and close frames pass through unparsed
//! - A backend that declines the upgrade has its response returned as-is

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use hyper_util::rt::TokioIo;

use super::proxy::director;
use crate::load_balancer::transport::HttpTransport;
use crate::policy::{RejectReason, Rejection};

/// Proxy an upgrade request to `target` and splice the two connections.
pub async fn relay(
    transport: &HttpTransport,
    target: &str,
    client_ip: &str,
    request_id: &str,
    mut req: Request<Body>,
) -> Result<Response, Rejection> {
    let client_upgrade = hyper::upgrade::on(&mut req);
    let upstream = director(req, target, client_ip, request_id, true)?;

    let mut response = transport.client.request(upstream).await.map_err(|e| {
        Rejection::new(RejectReason::UpstreamFailure, format!("websocket handshake failed: {}", e))
    })?;

    if response.status() != StatusCode::SWITCHING_PROTOCOLS {
        tracing::debug!(request_id = %request_id, status = %response.status(), "Backend declined upgrade");
        return Ok(response.map(Body::new));
    }

    let backend_upgrade = hyper::upgrade::on(&mut response);
    let request_id = request_id.to_string();
    tokio::spawn(async move {
        let (client, backend) = match tokio::try_join!(client_upgrade, backend_upgrade) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "WebSocket upgrade failed");
                return;
            }
        };

        let mut client = TokioIo::new(client);
        let mut backend = TokioIo::new(backend);
        match tokio::io::copy_bidirectional(&mut client, &mut backend).await {
            Ok((sent, received)) => {
                tracing::debug!(request_id = %request_id, sent, received, "WebSocket closed");
            }
            Err(e) => {
                tracing::debug!(request_id = %request_id, error = %e, "WebSocket relay ended");
            }
        }
    });

    let (parts, _) = response.into_parts();
    Ok(Response::from_parts(parts, Body::empty()))
}
