//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, outer layers, request ID)
//!     → middleware/ (service match, flow control, auth, rewrites)
//!     → proxy.rs (pick backend, director, forward)
//!         → websocket.rs for upgrade requests
//!     → response.rs (decompressed bodies, error rendering)
//!     → Send to client
//! ```

pub mod middleware;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::X_REQUEST_ID;
pub use server::{HttpServer, SharedState};
