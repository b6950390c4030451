//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.
//! The service and tenant catalogs live in [`super::service`] and
//! [`super::tenant`].

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::service::ServiceDetail;
use crate::config::tenant::Tenant;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Shared HTTP listener used by every HTTP service.
    pub http: HttpListenerConfig,

    /// Optional HTTPS listener serving the same HTTP services.
    pub https: Option<HttpsListenerConfig>,

    /// Settings shared by the per-service TCP and gRPC listeners.
    pub tcp: TcpListenerConfig,

    /// Flow accounting settings.
    pub flow: FlowConfig,

    /// Default backend health probing settings.
    pub health_check: HealthCheckConfig,

    /// Credential verification settings.
    pub auth: AuthConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Read-only statistics API.
    pub admin: AdminConfig,

    /// Service catalog.
    pub services: Vec<ServiceDetail>,

    /// Tenant catalog.
    pub tenants: Vec<Tenant>,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Total time allowed for a proxied request, in seconds.
    pub request_timeout_secs: u64,

    /// Maximum response body buffered by the response modifier, in bytes.
    pub max_body_bytes: usize,

    /// Use the first `X-Forwarded-For` entry as the client IP.
    pub trust_forwarded_for: bool,
}

impl Default for HttpListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 16 * 1024 * 1024,
            trust_forwarded_for: false,
        }
    }
}

/// HTTPS listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpsListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8443").
    pub bind_address: String,

    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Settings for per-service TCP and gRPC listeners.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TcpListenerConfig {
    /// Host every per-service listener binds on; the port comes from the service rule.
    pub bind_host: String,

    /// Maximum concurrent connections per TCP listener (backpressure).
    pub max_connections: usize,
}

impl Default for TcpListenerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Flow accounting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Interval between flushes of local ticks into the store, in milliseconds.
    pub tick_interval_ms: u64,

    /// Expiry of the day/hour buckets in the store, in seconds.
    pub bucket_ttl_secs: u64,

    /// Offset from UTC, in hours, used to name day/hour buckets.
    pub utc_offset_hours: i32,
}

impl FlowConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn bucket_ttl(&self) -> Duration {
        Duration::from_secs(self.bucket_ttl_secs)
    }

    /// Bucket time zone; `None` when the offset is not within ±24 hours.
    pub fn utc_offset(&self) -> Option<FixedOffset> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            bucket_ttl_secs: 2 * 24 * 3600,
            utc_offset_hours: 0,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Probe interval in seconds.
    pub interval_secs: u64,

    /// Probe (TCP connect) timeout in seconds.
    pub timeout_secs: u64,

    /// Number of consecutive failures before an address leaves the active list.
    pub unhealthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            timeout_secs: 2,
            unhealthy_threshold: 2,
        }
    }
}

/// Credential verification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 secret tenant tokens are signed with.
    pub jwt_secret: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Change this in production.
            jwt_secret: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Time in-flight requests and connections get to finish, in seconds.
    pub drain_timeout_secs: u64,
}

impl ShutdownConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin statistics API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the statistics API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Statistics API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
