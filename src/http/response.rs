//! Response handling and transformation.
//!
//! # Responsibilities
//! - Render rejections as JSON error responses
//! - Post-process backend responses (decompressed bodies, hop-by-hop headers)
//!
//! # Design Decisions
//! - Upgrade responses pass through untouched
//! - A gzip body that the client transport decompressed is buffered (up to
//!   the body limit) so its new length can be declared
//! - Other bodies stream through

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::policy::{RejectReason, Rejection};
use crate::security::headers::strip_hop_by_hop;
use crate::observability::metrics;

/// JSON error body returned for refused or failed requests.
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub errno: u32,
    pub errmsg: &'a str,
    pub request_id: &'a str,
}

pub fn status_for(reason: RejectReason) -> StatusCode {
    match reason {
        RejectReason::ServiceNotFound => StatusCode::NOT_FOUND,
        RejectReason::IpNotAllowed | RejectReason::IpDenied | RejectReason::HostNotAllowed => {
            StatusCode::FORBIDDEN
        }
        RejectReason::InvalidCredential | RejectReason::AccessDenied => StatusCode::UNAUTHORIZED,
        RejectReason::ServiceFlowLimit
        | RejectReason::ClientFlowLimit
        | RejectReason::TenantFlowLimit
        | RejectReason::TenantQuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
        RejectReason::BackendUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        RejectReason::UpstreamFailure => StatusCode::BAD_GATEWAY,
    }
}

pub fn error_response(rejection: &Rejection, request_id: &str) -> Response {
    metrics::record_rejected("http", rejection.reason);
    tracing::info!(
        request_id = %request_id,
        code = rejection.code(),
        reason = rejection.reason.as_str(),
        message = %rejection.message,
        "Request rejected"
    );
    let body = ErrorBody {
        errno: rejection.code(),
        errmsg: &rejection.message,
        request_id,
    };
    (status_for(rejection.reason), Json(body)).into_response()
}

/// Marker set on responses whose body arrived gzip-encoded.
#[derive(Debug, Clone, Copy)]
pub struct WasCompressed;

/// Record the upstream content encoding before the transport decodes it.
pub fn mark_compressed<B>(mut response: axum::http::Response<B>) -> axum::http::Response<B> {
    let gzip = response
        .headers()
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("gzip"));
    if gzip {
        response.extensions_mut().insert(WasCompressed);
    }
    response
}

/// Turn a backend response into the client response.
pub async fn modify_response(response: Response, max_body_bytes: usize) -> Result<Response, Rejection> {
    if response.status() == StatusCode::SWITCHING_PROTOCOLS {
        return Ok(response);
    }

    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);

    if parts.extensions.get::<WasCompressed>().is_none() {
        return Ok(Response::from_parts(parts, body));
    }

    let bytes = axum::body::to_bytes(body, max_body_bytes).await.map_err(|e| {
        Rejection::new(
            RejectReason::UpstreamFailure,
            format!("failed to read upstream body: {}", e),
        )
    })?;
    parts.headers.remove(header::CONTENT_ENCODING);
    parts
        .headers
        .insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
    Ok(Response::from_parts(parts, Body::from(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejection_renders_json() {
        let rejection = Rejection::new(RejectReason::ServiceFlowLimit, "service flow limit exceeded: 2");
        let response = error_response(&rejection, "req-1");
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["errno"], 9007);
        assert_eq!(json["errmsg"], "service flow limit exceeded: 2");
        assert_eq!(json["request_id"], "req-1");
    }

    #[tokio::test]
    async fn compressed_body_gets_length() {
        let mut response = Response::new(Body::from("hello world"));
        response.extensions_mut().insert(WasCompressed);
        response
            .headers_mut()
            .insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));

        let response = modify_response(response, 1024).await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "11");
        assert!(response.headers().get(header::TRANSFER_ENCODING).is_none());
    }

    #[tokio::test]
    async fn upgrade_passes_through() {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
        response
            .headers_mut()
            .insert(header::UPGRADE, HeaderValue::from_static("websocket"));

        let response = modify_response(response, 1024).await.unwrap();
        assert_eq!(response.headers()[header::UPGRADE], "websocket");
    }

    #[test]
    fn gzip_marker() {
        let mut response = axum::http::Response::new(());
        response
            .headers_mut()
            .insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        let response = mark_compressed(response);
        assert!(response.extensions().get::<WasCompressed>().is_some());
    }
}
