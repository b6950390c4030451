//! Transparent gRPC forwarding.

use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, Uri, Version};
use axum::response::Response;

use super::middleware::GrpcContext;
use super::status::rejection_response;
use crate::http::request::client_ip;
use crate::observability::metrics;
use crate::policy::{RejectReason, Rejection};

/// Terminal handler: forward the call and stream the backend's answer back.
pub async fn grpc_proxy(State(ctx): State<GrpcContext>, req: Request<Body>) -> Response {
    let started = Instant::now();
    let response = match forward(&ctx, req).await {
        Ok(response) => response,
        Err(rejection) => {
            tracing::warn!(service = %ctx.service.name, error = %rejection, "gRPC proxy error");
            rejection_response(&rejection)
        }
    };
    metrics::record_request("grpc", &ctx.service.name, response.status().as_u16(), started.elapsed());
    response
}

async fn forward(ctx: &GrpcContext, req: Request<Body>) -> Result<Response, Rejection> {
    let key = client_ip(&req, false);
    let target = ctx
        .state
        .balancers
        .get(&ctx.service)
        .get(&key)
        .map_err(|e| Rejection::new(RejectReason::BackendUnavailable, format!("get backend failed: {}", e)))?;

    let (mut parts, body) = req.into_parts();
    parts.uri = backend_uri(&target, &parts.uri)?;
    parts.version = Version::HTTP_2;
    parts.headers.remove(header::HOST);

    tracing::debug!(service = %ctx.service.name, backend = %target, method = %parts.uri.path(), "Forwarding gRPC call");

    let client = ctx.state.transports.grpc(&ctx.service);
    let response = client
        .request(Request::from_parts(parts, body))
        .await
        .map_err(|e| Rejection::new(RejectReason::UpstreamFailure, format!("upstream call failed: {}", e)))?;
    Ok(response.map(Body::new))
}

/// `http://<backend><method path>`.
pub(crate) fn backend_uri(target: &str, original: &Uri) -> Result<Uri, Rejection> {
    let path = original.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let authority = target
        .strip_prefix("http://")
        .unwrap_or(target)
        .trim_end_matches('/');
    format!("http://{}{}", authority, path).parse().map_err(|e| {
        Rejection::new(
            RejectReason::UpstreamFailure,
            format!("invalid backend address {}: {}", target, e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_uri_keeps_method_path() {
        let original: Uri = "/helloworld.Greeter/SayHello".parse().unwrap();
        let uri = backend_uri("127.0.0.1:50051", &original).unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:50051/helloworld.Greeter/SayHello");
    }

    #[test]
    fn backend_uri_rejects_garbage() {
        let original: Uri = "/a/b".parse().unwrap();
        let err = backend_uri("bad host", &original).unwrap_err();
        assert_eq!(err.reason, RejectReason::UpstreamFailure);
    }
}
