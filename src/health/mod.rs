//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer (per pool)
//!     → TCP connect probe to each configured backend
//!     → state.rs failure tracking
//!     → new active list compared with the old one as sets
//!     → on change: PoolSubject::notify_and_update → balancers rebuild
//! ```
//!
//! # Design Decisions
//! - The probe is a trait so tests can script backend availability
//! - Probes in one round run concurrently
//! - Health state is per-backend, owned by the probe loop of its pool

pub mod active;
pub mod state;

pub use active::{HealthCheckedSource, ProbeSettings, Prober, TcpProber};
pub use state::FailureTracker;
