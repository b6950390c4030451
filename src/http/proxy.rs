//! HTTP reverse proxy.
//!
//! # Responsibilities
//! - Pick a backend for the matched service
//! - Rewrite the request onto the backend (the director)
//! - Forward over the service's pooled client and post-process the response
//!
//! # Data Flow
//! ```text
//! request (after middleware)
//!     → LoadBalancer::get(path+query)     9011 when the pool is empty
//!     → director: scheme, host, joined path, merged query, headers
//!     → client (gzip decompression, header timeout)   9999 on failure
//!     → modify_response
//! ```
//!
//! # Design Decisions
//! - The outgoing `Host` is the backend's, matching the rewritten URI
//! - Upgrade requests of WebSocket-enabled services go to the relay instead

use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, Request, Uri};
use axum::response::Response;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::decompression::DecompressionLayer;

use super::middleware::matched;
use super::request::{request_id, X_REQUEST_ID};
use super::response::{error_response, mark_compressed, modify_response};
use super::server::SharedState;
use super::websocket;
use crate::config::ServiceDetail;
use crate::load_balancer::transport::HttpTransport;
use crate::observability::metrics;
use crate::policy::{RejectReason, Rejection};
use crate::security::headers::{append_forwarded_for, is_upgrade, strip_hop_by_hop};

/// User-Agent sent when the client did not provide one.
const DEFAULT_USER_AGENT: &str = concat!("api-gateway/", env!("CARGO_PKG_VERSION"));

/// Final handler of the HTTP chain.
pub async fn proxy_handler(State(state): State<SharedState>, req: Request<Body>) -> Response {
    let started = Instant::now();
    let (service, client_ip) = match matched(&req) {
        Ok(m) => m,
        Err(response) => return response,
    };
    let request_id = request_id(req.headers()).to_string();

    let response = match forward(&state, &service, &client_ip, &request_id, req).await {
        Ok(response) => response,
        Err(rejection) => {
            tracing::warn!(
                request_id = %request_id,
                service = %service.name,
                error = %rejection,
                "Proxy error"
            );
            error_response(&rejection, &request_id)
        }
    };

    metrics::record_request("http", &service.name, response.status().as_u16(), started.elapsed());
    response
}

async fn forward(
    state: &SharedState,
    service: &ServiceDetail,
    client_ip: &str,
    request_id: &str,
    req: Request<Body>,
) -> Result<Response, Rejection> {
    let key = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .to_string();
    let target = state.balancers.get(service).get(&key).map_err(|e| {
        Rejection::new(RejectReason::BackendUnavailable, format!("get backend failed: {}", e))
    })?;
    let transport = state.transports.http(service);

    tracing::debug!(request_id = %request_id, service = %service.name, backend = %target, "Forwarding request");

    let websocket = service.http_rule().is_some_and(|rule| rule.need_websocket);
    if websocket && is_upgrade(req.headers()) {
        return websocket::relay(&transport, &target, client_ip, request_id, req).await;
    }

    let upstream = director(req, &target, client_ip, request_id, false)?;
    let response = send(&transport, upstream).await?;
    modify_response(response, state.config.http.max_body_bytes).await
}

async fn send(transport: &HttpTransport, req: Request<Body>) -> Result<Response, Rejection> {
    let client = ServiceBuilder::new()
        .layer(DecompressionLayer::new())
        .map_response(mark_compressed::<hyper::body::Incoming>)
        .service(transport.client.clone());
    let call = client.oneshot(req);

    let result = match transport.header_timeout {
        Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
            Rejection::new(RejectReason::UpstreamFailure, "upstream response header timeout")
        })?,
        None => call.await,
    };

    let response = result.map_err(|e| {
        Rejection::new(RejectReason::UpstreamFailure, format!("upstream request failed: {}", e))
    })?;
    Ok(response.map(Body::new))
}

/// Rewrite a client request onto `target` (`scheme://host[:port][/base][?query]`).
pub(crate) fn director(
    req: Request<Body>,
    target: &str,
    client_ip: &str,
    request_id: &str,
    keep_upgrade: bool,
) -> Result<Request<Body>, Rejection> {
    let target: Uri = target.parse().map_err(|e| {
        Rejection::new(
            RejectReason::UpstreamFailure,
            format!("invalid backend address {}: {}", target, e),
        )
    })?;

    let (mut parts, body) = req.into_parts();
    parts.uri = upstream_uri(&target, &parts.uri)?;

    let upgrade = keep_upgrade.then(|| {
        (
            parts.headers.get(header::CONNECTION).cloned(),
            parts.headers.get(header::UPGRADE).cloned(),
        )
    });
    strip_hop_by_hop(&mut parts.headers);
    if let Some((connection, protocol)) = upgrade {
        if let (Some(connection), Some(protocol)) = (connection, protocol) {
            parts.headers.insert(header::CONNECTION, connection);
            parts.headers.insert(header::UPGRADE, protocol);
        }
    }

    parts.headers.remove(header::HOST);
    if !parts.headers.contains_key(header::USER_AGENT) {
        parts
            .headers
            .insert(header::USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    }
    append_forwarded_for(&mut parts.headers, client_ip);
    if let Ok(value) = HeaderValue::from_str(request_id) {
        parts.headers.insert(X_REQUEST_ID, value);
    }
    // The client may have spoken HTTP/2; the pool negotiates its own version.
    parts.version = axum::http::Version::HTTP_11;

    Ok(Request::from_parts(parts, body))
}

/// Backend URI: target scheme and authority, joined path, merged query.
pub(crate) fn upstream_uri(target: &Uri, original: &Uri) -> Result<Uri, Rejection> {
    let path = single_joining_slash(target.path(), original.path());
    let query = match (target.query().unwrap_or(""), original.query().unwrap_or("")) {
        ("", q) | (q, "") => q.to_string(),
        (t, q) => format!("{}&{}", t, q),
    };
    let path_and_query = if query.is_empty() {
        path
    } else {
        format!("{}?{}", path, query)
    };

    let mut builder = Uri::builder().path_and_query(path_and_query);
    if let Some(scheme) = target.scheme() {
        builder = builder.scheme(scheme.clone());
    }
    if let Some(authority) = target.authority() {
        builder = builder.authority(authority.clone());
    }
    builder.build().map_err(|e| {
        Rejection::new(RejectReason::UpstreamFailure, format!("invalid upstream uri: {}", e))
    })
}

/// Join two paths with exactly one slash between them.
pub fn single_joining_slash(a: &str, b: &str) -> String {
    match (a.ends_with('/'), b.starts_with('/')) {
        (true, true) => format!("{}{}", a, &b[1..]),
        (false, false) => format!("{}/{}", a, b),
        _ => format!("{}{}", a, b),
    }
}
