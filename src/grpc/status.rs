//! gRPC status codes and trailers-only rejections.

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};

use crate::observability::metrics;
use crate::policy::{RejectReason, Rejection};

/// Status codes the gateway itself produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum GrpcCode {
    NotFound = 5,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    Unavailable = 14,
    Unauthenticated = 16,
}

impl GrpcCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

impl From<RejectReason> for GrpcCode {
    fn from(reason: RejectReason) -> Self {
        match reason {
            RejectReason::ServiceNotFound => GrpcCode::NotFound,
            RejectReason::IpNotAllowed | RejectReason::IpDenied | RejectReason::HostNotAllowed => {
                GrpcCode::PermissionDenied
            }
            RejectReason::InvalidCredential | RejectReason::AccessDenied => GrpcCode::Unauthenticated,
            RejectReason::ServiceFlowLimit
            | RejectReason::ClientFlowLimit
            | RejectReason::TenantFlowLimit
            | RejectReason::TenantQuotaExceeded => GrpcCode::ResourceExhausted,
            RejectReason::BackendUnavailable | RejectReason::UpstreamFailure => GrpcCode::Unavailable,
        }
    }
}

/// Trailers-only response carrying `rejection`.
///
/// The numeric gateway code leads the message, e.g. `9007 service flow limit exceeded: 2`.
pub fn rejection_response(rejection: &Rejection) -> Response<Body> {
    metrics::record_rejected("grpc", rejection.reason);
    tracing::info!(
        code = rejection.code(),
        reason = rejection.reason.as_str(),
        message = %rejection.message,
        "gRPC call rejected"
    );

    let code = GrpcCode::from(rejection.reason);
    let message = percent_encode(&format!("{} {}", rejection.code(), rejection.message));

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/grpc"));
    headers.insert("grpc-status", HeaderValue::from(code.as_u16()));
    if let Ok(value) = HeaderValue::from_str(&message) {
        headers.insert("grpc-message", value);
    }
    response
}

/// Percent-encode a grpc-message value: printable ASCII except `%` is kept.
pub fn percent_encode(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    for byte in message.bytes() {
        if (0x20..=0x7e).contains(&byte) && byte != b'%' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}
