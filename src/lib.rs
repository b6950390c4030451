//! API gateway library: HTTP(S), TCP and gRPC proxying with per-service
//! load balancing, access control, rate limiting and flow accounting.

pub mod admin;
pub mod config;
pub mod discovery;
pub mod flow;
pub mod grpc;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod policy;
pub mod routing;
pub mod security;
pub mod state;
pub mod tcp;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::{Gateway, Shutdown};
pub use state::GatewayState;
