//! gRPC interceptor chain.
//!
//! The stages mirror the HTTP chain, bound to one service instead of
//! matching per request. The client IP comes from the peer address.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::Response;

use super::status::rejection_response;
use crate::config::ServiceDetail;
use crate::http::middleware::MatchedTenant;
use crate::http::request::client_ip;
use crate::http::SharedState;
use crate::policy::auth::{authenticate, check_client_ip};
use crate::policy::flow::{
    check_service_limits, check_tenant_limit, count_service_flow, count_tenant_flow,
};
use crate::routing::transform::{apply_header_rules, parse_header_rules};

/// State of one gRPC listener.
#[derive(Clone)]
pub struct GrpcContext {
    pub state: SharedState,
    pub service: Arc<ServiceDetail>,
}

fn peer_ip(req: &Request<Body>) -> String {
    client_ip(req, false)
}

pub async fn grpc_flow_count(State(ctx): State<GrpcContext>, req: Request<Body>, next: Next) -> Response {
    count_service_flow(&ctx.state, &ctx.service);
    next.run(req).await
}

pub async fn grpc_flow_limit(State(ctx): State<GrpcContext>, req: Request<Body>, next: Next) -> Response {
    if let Err(rejection) = check_service_limits(&ctx.state, &ctx.service, &peer_ip(&req)) {
        return rejection_response(&rejection);
    }
    next.run(req).await
}

/// Verify the `authorization` metadata entry, if any.
pub async fn grpc_jwt_auth(State(ctx): State<GrpcContext>, mut req: Request<Body>, next: Next) -> Response {
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match authenticate(&ctx.state, &ctx.service, authorization, &peer_ip(&req)) {
        Ok(Some(tenant)) => {
            req.extensions_mut().insert(MatchedTenant(tenant));
        }
        Ok(None) => {}
        Err(rejection) => return rejection_response(&rejection),
    }
    next.run(req).await
}

pub async fn grpc_tenant_flow_count(
    State(ctx): State<GrpcContext>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(MatchedTenant(tenant)) = req.extensions().get::<MatchedTenant>() {
        if let Err(rejection) = count_tenant_flow(&ctx.state, tenant) {
            return rejection_response(&rejection);
        }
    }
    next.run(req).await
}

pub async fn grpc_tenant_flow_limit(
    State(ctx): State<GrpcContext>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(MatchedTenant(tenant)) = req.extensions().get::<MatchedTenant>() {
        if let Err(rejection) = check_tenant_limit(&ctx.state, tenant) {
            return rejection_response(&rejection);
        }
    }
    next.run(req).await
}

/// Allow and deny lists.
pub async fn grpc_access_control(State(ctx): State<GrpcContext>, req: Request<Body>, next: Next) -> Response {
    if let Err(rejection) = check_client_ip(&ctx.service, &peer_ip(&req)) {
        return rejection_response(&rejection);
    }
    next.run(req).await
}

/// Apply the service's header rules to the outgoing metadata.
pub async fn grpc_header_transform(
    State(ctx): State<GrpcContext>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let rules = parse_header_rules(ctx.service.header_transform());
    apply_header_rules(req.headers_mut(), &rules);
    next.run(req).await
}
