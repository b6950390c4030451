//! Service matching.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use super::{reject, ClientIp, MatchedService};
use crate::http::request::{client_ip, request_host};
use crate::http::server::SharedState;
use crate::policy::{RejectReason, Rejection};

/// Match the request against the service directory.
pub async fn access_mode(
    State(state): State<SharedState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let matched = state
        .services
        .http_access_mode(request_host(&req), req.uri().path());

    let service = match matched {
        Ok(service) => service,
        Err(e) => {
            return reject(&req, Rejection::new(RejectReason::ServiceNotFound, e.to_string()));
        }
    };

    let ip = client_ip(&req, state.config.http.trust_forwarded_for);
    tracing::debug!(service = %service.name, client_ip = %ip, path = %req.uri().path(), "Service matched");

    req.extensions_mut().insert(MatchedService(service));
    req.extensions_mut().insert(ClientIp(ip));
    next.run(req).await
}
