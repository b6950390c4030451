//! Service flow accounting and limits.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use super::{matched, reject};
use crate::http::server::SharedState;
use crate::policy::flow::{check_service_limits, count_service_flow};

pub async fn flow_count(State(state): State<SharedState>, req: Request<Body>, next: Next) -> Response {
    let (service, _) = match matched(&req) {
        Ok(m) => m,
        Err(response) => return response,
    };
    count_service_flow(&state, &service);
    next.run(req).await
}

/// Service-wide and per-client-IP rate limits.
pub async fn flow_limit(State(state): State<SharedState>, req: Request<Body>, next: Next) -> Response {
    let (service, client_ip) = match matched(&req) {
        Ok(m) => m,
        Err(response) => return response,
    };
    if let Err(rejection) = check_service_limits(&state, &service, &client_ip) {
        return reject(&req, rejection);
    }
    next.run(req).await
}
