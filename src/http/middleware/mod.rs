//! HTTP middleware chain.
//!
//! Each stage is an axum `from_fn_with_state` function. Stages read what
//! earlier stages resolved from request extensions and either call the next
//! stage or answer with a rejection.
//!
//! # Data Flow
//! ```text
//! access_mode        (service match, client IP)
//!     → flow_count → flow_limit
//!     → jwt_auth → tenant_flow_count → tenant_flow_limit
//!     → access_control (IP lists, host)
//!     → header_transform → strip_uri → url_rewrite
//!     → proxy handler
//! ```

pub mod access_control;
pub mod access_mode;
pub mod auth;
pub mod flow;
pub mod transform;

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

use crate::config::{ServiceDetail, Tenant};
use crate::http::request::request_id;
use crate::http::response::error_response;
use crate::policy::{RejectReason, Rejection};

pub use access_control::access_control;
pub use access_mode::access_mode;
pub use auth::{jwt_auth, tenant_flow_count, tenant_flow_limit};
pub use flow::{flow_count, flow_limit};
pub use transform::{header_transform, strip_uri, url_rewrite};

/// Service resolved by `access_mode`.
#[derive(Debug, Clone)]
pub struct MatchedService(pub Arc<ServiceDetail>);

/// Client IP resolved by `access_mode`.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

/// Tenant resolved by `jwt_auth`.
#[derive(Debug, Clone)]
pub struct MatchedTenant(pub Arc<Tenant>);

/// Service and client IP for a request that passed `access_mode`.
pub(crate) fn matched(req: &Request<Body>) -> Result<(Arc<ServiceDetail>, String), Response> {
    let service = req.extensions().get::<MatchedService>().map(|s| s.0.clone());
    let client_ip = req.extensions().get::<ClientIp>().map(|ip| ip.0.clone());
    match (service, client_ip) {
        (Some(service), Some(ip)) => Ok((service, ip)),
        _ => Err(reject(
            req,
            Rejection::new(RejectReason::ServiceNotFound, "service not matched"),
        )),
    }
}

pub(crate) fn reject(req: &Request<Body>, rejection: Rejection) -> Response {
    error_response(&rejection, request_id(req.headers()))
}
