//! Tenant authentication and tenant flow control.
//!
//! Tenants present a JWT in `Authorization: Bearer <token>`. The token's
//! issuer names the tenant.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::Response;

use super::{matched, reject, MatchedTenant};
use crate::http::server::SharedState;
use crate::policy::auth::authenticate;
use crate::policy::flow::{check_tenant_limit, count_tenant_flow};

pub async fn jwt_auth(State(state): State<SharedState>, mut req: Request<Body>, next: Next) -> Response {
    let (service, client_ip) = match matched(&req) {
        Ok(m) => m,
        Err(response) => return response,
    };
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match authenticate(&state, &service, authorization, &client_ip) {
        Ok(Some(tenant)) => {
            tracing::debug!(app_id = %tenant.app_id, service = %service.name, "Tenant authenticated");
            req.extensions_mut().insert(MatchedTenant(tenant));
        }
        Ok(None) => {}
        Err(rejection) => return reject(&req, rejection),
    }
    next.run(req).await
}

/// Count the tenant's call and enforce its daily quota.
pub async fn tenant_flow_count(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(MatchedTenant(tenant)) = req.extensions().get::<MatchedTenant>() {
        if let Err(rejection) = count_tenant_flow(&state, tenant) {
            return reject(&req, rejection);
        }
    }
    next.run(req).await
}

pub async fn tenant_flow_limit(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(MatchedTenant(tenant)) = req.extensions().get::<MatchedTenant>() {
        if let Err(rejection) = check_tenant_limit(&state, tenant) {
            return reject(&req, rejection);
        }
    }
    next.run(req).await
}
