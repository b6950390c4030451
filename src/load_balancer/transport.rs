//! Per-service upstream clients.
//!
//! Each service gets its own connection pool, sized and timed by its
//! `load_balance` settings. HTTP services get an HTTP/1.1 client that can
//! also speak TLS; gRPC services get a prior-knowledge HTTP/2 client.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use dashmap::DashMap;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::config::{LoadBalanceConfig, ServiceDetail};

pub type HttpClient = Client<HttpsConnector<HttpConnector>, Body>;
pub type GrpcClient = Client<HttpConnector, Body>;

const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

/// Pooled HTTP client plus the response-header deadline of its service.
#[derive(Clone)]
pub struct HttpTransport {
    pub client: HttpClient,
    pub header_timeout: Option<Duration>,
}

/// Lazily populated map of upstream clients.
#[derive(Default)]
pub struct TransportRegistry {
    http: DashMap<String, Arc<HttpTransport>>,
    grpc: DashMap<String, GrpcClient>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// HTTP transport of `service`, created on first use.
    pub fn http(&self, service: &ServiceDetail) -> Arc<HttpTransport> {
        if let Some(transport) = self.http.get(&service.name) {
            return transport.clone();
        }
        self.http
            .entry(service.name.clone())
            .or_insert_with(|| {
                let lb = &service.load_balance;
                Arc::new(HttpTransport {
                    client: build_http_client(lb),
                    header_timeout: lb.header_timeout(),
                })
            })
            .clone()
    }

    /// gRPC client of `service`, created on first use.
    pub fn grpc(&self, service: &ServiceDetail) -> GrpcClient {
        if let Some(client) = self.grpc.get(&service.name) {
            return client.clone();
        }
        self.grpc
            .entry(service.name.clone())
            .or_insert_with(|| build_grpc_client(&service.load_balance))
            .clone()
    }
}

fn connector(lb: &LoadBalanceConfig) -> HttpConnector {
    let mut http = HttpConnector::new();
    http.set_connect_timeout(Some(lb.connect_timeout()));
    http.set_keepalive(Some(TCP_KEEPALIVE));
    http.set_nodelay(true);
    http
}

fn build_http_client(lb: &LoadBalanceConfig) -> HttpClient {
    let mut http = connector(lb);
    http.enforce_http(false);

    let https = HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .wrap_connector(http);

    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(lb.idle_timeout())
        .pool_max_idle_per_host(lb.upstream_max_idle)
        .build(https)
}

fn build_grpc_client(lb: &LoadBalanceConfig) -> GrpcClient {
    Client::builder(TokioExecutor::new())
        .http2_only(true)
        .pool_idle_timeout(lb.idle_timeout())
        .pool_max_idle_per_host(lb.upstream_max_idle)
        .build(connector(lb))
}
