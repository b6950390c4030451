//! Request identification.
//!
//! # Responsibilities
//! - Assign a UUID request ID as early as possible (tower-http request-id)
//! - Resolve the client IP and request host for the middleware chain
//!
//! # Design Decisions
//! - An inbound `x-request-id` is kept, so IDs survive chained gateways
//! - X-Forwarded-For is only trusted when configured

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, HeaderName, Request};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::security::headers::forwarded_client;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Placeholder when a request reached a handler without an ID.
const UNKNOWN: &str = "-";

pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(UNKNOWN)
}

/// Client IP of the request: the peer address, or the first
/// X-Forwarded-For entry when `trust_forwarded_for` is set.
pub fn client_ip(req: &Request<Body>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        if let Some(ip) = forwarded_client(req.headers()) {
            return ip.to_string();
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Host the client addressed: `Host` header, else the URI authority.
pub fn request_host(req: &Request<Body>) -> &str {
    req.headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| req.uri().authority().map(|a| a.as_str()))
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ip_prefers_connect_info() {
        let mut req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo("10.0.0.5:5555".parse::<SocketAddr>().unwrap()));

        assert_eq!(client_ip(&req, false), "10.0.0.5");
        assert_eq!(client_ip(&req, true), "203.0.113.7");
    }

    #[test]
    fn host_from_header_or_authority() {
        let req = Request::builder()
            .uri("http://api.example.com/x")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_host(&req), "api.example.com");

        let req = Request::builder()
            .uri("/x")
            .header("host", "www.example.com:8080")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_host(&req), "www.example.com:8080");
    }

    #[test]
    fn missing_request_id() {
        assert_eq!(request_id(&HeaderMap::new()), "-");
    }
}
