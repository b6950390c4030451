//! Raw TCP proxying.
//!
//! Raw byte streams have no request/response pipeline to hang middleware on,
//! so this module carries a small handler chain of its own.
//!
//! # Data Flow
//! ```text
//! server.rs (one listener per TCP service, connection limit, drain)
//!     → router.rs (TcpSliceContext, driver loop, abort)
//!         → middleware.rs (flow count, flow limit, IP lists)
//!         → proxy.rs (pick backend by client IP, dial, byte pump)
//! ```
//!
//! # Design Decisions
//! - Handlers run in order from a driver loop; a handler stops the chain with
//!   `abort()` instead of calling into the next one
//! - Rejections are one text line on the socket, then close
//! - The pump ends both sides when either direction finishes, or on shutdown

pub mod middleware;
pub mod proxy;
pub mod router;
pub mod server;

pub use proxy::{ProxyError, TcpReverseProxy};
pub use router::{TcpHandler, TcpSliceContext, TcpSliceGroup, TcpSliceRouter};
pub use server::TcpServer;
