//! gRPC transparent proxy.
//!
//! Every gRPC service owns a dedicated port. Calls are accepted over
//! HTTP/2 (prior knowledge), run through the service's interceptor chain and
//! forwarded frame-for-frame to a backend; payloads are never decoded.
//!
//! # Data Flow
//! ```text
//! h2c stream on the service port
//!     → middleware.rs (flow count/limit, JWT, tenant flow, IP lists, metadata transform)
//!     → proxy.rs (pick backend by client IP, forward over the pooled h2 client)
//!     → response frames and trailers streamed back
//! ```
//!
//! # Design Decisions
//! - One pooled HTTP/2 client per service instead of a dial per stream
//! - Rejections are trailers-only responses (status.rs)

pub mod middleware;
pub mod proxy;
pub mod server;
pub mod status;

pub use middleware::GrpcContext;
pub use server::GrpcServer;
pub use status::GrpcCode;
