//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! [[services]] / [[tenants]]
//!     → routing::catalog::StaticCatalog
//!     → ServiceDirectory / TenantDirectory (loaded once)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod service;
pub mod tenant;
pub mod validation;

pub use schema::GatewayConfig;
pub use schema::{
    AdminConfig, AuthConfig, FlowConfig, HealthCheckConfig, HttpListenerConfig,
    HttpsListenerConfig, LogFormat, ObservabilityConfig, ShutdownConfig, TcpListenerConfig,
};
pub use service::{
    AccessControl, GrpcRule, HttpMatchType, HttpRule, LbType, LoadBalanceConfig, Protocol,
    ServiceDetail, ServiceRule, TcpRule,
};
pub use tenant::Tenant;
