//! Flow accounting subsystem.
//!
//! # Data Flow
//! ```text
//! Request admitted
//!     → registry.rs (counter for key, created on first use)
//!     → counter.rs increase() (one atomic add)
//!
//! Every tick (per counter):
//!     swap local ticks to 0
//!     → store.rs incr_by(day bucket, hour bucket) + expiry refresh
//!     → store.rs get(day bucket) (aggregate across instances)
//!     → recompute total and QPS
//! ```
//!
//! # Design Decisions
//! - Accounting never blocks or fails a request
//! - Store failures are logged in the flush loop and retried next tick
//! - Keys: `flow_total`, `flow_service_<name>`, `flow_app_<id>`

pub mod counter;
pub mod registry;
pub mod store;

pub use counter::{CounterSettings, FlowCounter};
pub use registry::FlowCounterRegistry;
pub use store::{FlowStore, FlowStoreError, MemoryFlowStore};

/// Key of the gateway-wide counter.
pub const FLOW_TOTAL: &str = "flow_total";

/// Counter and limiter key of a service.
pub fn service_key(service: &str) -> String {
    format!("flow_service_{}", service)
}

/// Limiter key of one client of a service.
pub fn client_key(service: &str, client_ip: &str) -> String {
    format!("flow_service_{}_{}", service, client_ip)
}

/// Counter and limiter key of a tenant.
pub fn app_key(app_id: &str) -> String {
    format!("flow_app_{}", app_id)
}
