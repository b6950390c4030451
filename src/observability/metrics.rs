//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, rejections, backends, flow)
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by protocol, service, status
//! - `gateway_request_duration_seconds` (histogram): proxy latency
//! - `gateway_rejections_total` (counter): refused requests by protocol, reason
//! - `gateway_backend_health` (gauge): 1=active, 0=removed
//! - `gateway_flow_qps` (gauge): last computed QPS per accounting key
//! - `gateway_tcp_connections_active` (gauge): open TCP proxy connections
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - Labels carry service names, never client IPs

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::policy::RejectReason;

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// One proxied request or stream.
pub fn record_request(protocol: &'static str, service: &str, status: u16, elapsed: Duration) {
    counter!(
        "gateway_requests_total",
        "protocol" => protocol,
        "service" => service.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "gateway_request_duration_seconds",
        "protocol" => protocol,
        "service" => service.to_string()
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_rejected(protocol: &'static str, reason: RejectReason) {
    counter!(
        "gateway_rejections_total",
        "protocol" => protocol,
        "reason" => reason.as_str()
    )
    .increment(1);
}

pub fn record_backend_health(service: &str, addr: &str, healthy: bool) {
    gauge!(
        "gateway_backend_health",
        "service" => service.to_string(),
        "backend" => addr.to_string()
    )
    .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_flow_qps(key: &str, qps: i64) {
    gauge!("gateway_flow_qps", "key" => key.to_string()).set(qps as f64);
}

pub fn tcp_connection_opened(service: &str) {
    gauge!("gateway_tcp_connections_active", "service" => service.to_string()).increment(1.0);
}

pub fn tcp_connection_closed(service: &str) {
    gauge!("gateway_tcp_connections_active", "service" => service.to_string()).decrement(1.0);
}
