//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → jwt.rs (verify tenant credential)
//!     → access_control.rs (IP allow/deny lists, host allow-list)
//!     → rate_limit.rs (per-service, per-client and per-tenant limiters)
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-For)
//!     → Pass to proxy
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input; X-Forwarded-For is only honoured when configured

pub mod access_control;
pub mod headers;
pub mod jwt;
pub mod rate_limit;
