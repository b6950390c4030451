//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Build state → Load catalogs → Bind listeners → Spawn servers
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain (bounded) → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     Second signal  → Immediate exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: catalogs first, then listeners
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: servers still busy after the drain window are aborted

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{BoundAddresses, Gateway, StartupError};
