//! Why a request or connection was refused.

use thiserror::Error;

/// Rejection category, shared by all protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    ServiceNotFound,
    IpNotAllowed,
    IpDenied,
    HostNotAllowed,
    InvalidCredential,
    AccessDenied,
    ServiceFlowLimit,
    ClientFlowLimit,
    TenantFlowLimit,
    TenantQuotaExceeded,
    BackendUnavailable,
    UpstreamFailure,
}

impl RejectReason {
    /// Numeric code surfaced to callers.
    pub fn code(self) -> u32 {
        match self {
            RejectReason::ServiceNotFound => 9001,
            RejectReason::IpNotAllowed => 9002,
            RejectReason::IpDenied => 9003,
            RejectReason::HostNotAllowed => 9004,
            RejectReason::InvalidCredential => 9005,
            RejectReason::AccessDenied => 9006,
            RejectReason::ServiceFlowLimit => 9007,
            RejectReason::ClientFlowLimit => 9008,
            RejectReason::TenantFlowLimit => 9009,
            RejectReason::TenantQuotaExceeded => 9010,
            RejectReason::BackendUnavailable => 9011,
            RejectReason::UpstreamFailure => 9999,
        }
    }

    /// Label used in metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::ServiceNotFound => "service_not_found",
            RejectReason::IpNotAllowed => "ip_not_allowed",
            RejectReason::IpDenied => "ip_denied",
            RejectReason::HostNotAllowed => "host_not_allowed",
            RejectReason::InvalidCredential => "invalid_credential",
            RejectReason::AccessDenied => "access_denied",
            RejectReason::ServiceFlowLimit => "service_flow_limit",
            RejectReason::ClientFlowLimit => "client_flow_limit",
            RejectReason::TenantFlowLimit => "tenant_flow_limit",
            RejectReason::TenantQuotaExceeded => "tenant_quota_exceeded",
            RejectReason::BackendUnavailable => "backend_unavailable",
            RejectReason::UpstreamFailure => "upstream_failure",
        }
    }
}

/// A refused request, with a message for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Rejection {
    pub reason: RejectReason,
    pub message: String,
}

impl Rejection {
    pub fn new(reason: RejectReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    pub fn code(&self) -> u32 {
        self.reason.code()
    }
}
