//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection (per TCP service port)
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (id, lifecycle tracking for drain)
//!     → Hand off to the TCP middleware chain
//!
//! HTTPS listener
//!     → tls.rs (certificate loading for axum-server)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - TLS is optional and terminates only on the shared HTTP port

pub mod connection;
pub mod listener;
pub mod tls;
