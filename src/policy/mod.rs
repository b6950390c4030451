//! Admission policy shared by the HTTP, TCP and gRPC chains.
//!
//! # Data Flow
//! ```text
//! Matched service + client IP (+ credential)
//!     → flow.rs    count_service_flow, check_service_limits
//!     → auth.rs    authenticate → Option<Tenant>
//!     → flow.rs    count_tenant_flow, check_tenant_limit   (tenant only)
//!     → auth.rs    check_client_ip
//!     → Ok, or a Rejection each protocol renders its own way
//! ```
//!
//! # Design Decisions
//! - Stages are plain functions over `GatewayState`; each protocol wires them
//!   into its own middleware shape
//! - One rejection taxonomy, so codes match across protocols

pub mod auth;
pub mod flow;
pub mod rejection;

pub use rejection::{RejectReason, Rejection};
