//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use api_gateway::config::loader::parse_config;
use api_gateway::Gateway;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::routing::any;
use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub const ADMIN_KEY: &str = "test-admin-key";
pub const JWT_SECRET: &str = "test-jwt-secret";

/// A port that was free a moment ago.
pub async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Start a simple mock backend that returns a fixed response.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            response.len(),
                            response
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// Every value of `name` in `req`, joined with ", ".
fn seen(req: &Request<Body>, name: &str) -> String {
    req.headers()
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join(", ")
}

/// HTTP backend answering `"<name> <path?query>"`; abort the handle to take it down.
///
/// Request headers it received come back as `x-seen-*` response headers.
pub async fn start_named_backend(name: &'static str) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(any(move |req: Request<Body>| async move {
        let target = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_default();
        Response::builder()
            .header("x-backend", name)
            .header("x-seen-forwarded-for", seen(&req, "x-forwarded-for"))
            .header("x-seen-gateway", seen(&req, "x-gateway"))
            .header("x-seen-upgrade", seen(&req, "upgrade"))
            .body(Body::from(format!("{} {}", name, target)))
            .unwrap()
    }));
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, handle)
}

/// TCP backend echoing everything it reads.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

/// gRPC-shaped backend over h2c: echoes the request body with `grpc-status: 0`.
pub async fn start_grpc_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(any(|req: Request<Body>| async move {
        let method = req.uri().path().to_string();
        let gateway = seen(&req, "x-gateway");
        let body = axum::body::to_bytes(req.into_body(), 1 << 20).await.unwrap_or_default();
        Response::builder()
            .header("content-type", "application/grpc")
            .header("grpc-status", "0")
            .header("x-method", method)
            .header("x-seen-gateway", gateway)
            .body(Body::from(body))
            .unwrap()
    }));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Read an HTTP/1.1 head up to and including the blank line.
pub async fn read_head(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte).await {
            Ok(1) => head.push(byte[0]),
            _ => break,
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

/// WebSocket-style backend: answers an upgrade with 101, then echoes raw bytes.
pub async fn start_upgrade_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let head = read_head(&mut socket).await.to_ascii_lowercase();
                if !head.contains("upgrade: websocket") {
                    let _ = socket
                        .write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                        .await;
                    return;
                }
                let _ = socket
                    .write_all(b"HTTP/1.1 101 Switching Protocols\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\r\n")
                    .await;
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Gateway config on ephemeral ports with `services` appended.
pub fn gateway_toml(services: &str) -> String {
    format!(
        r#"
[http]
bind_address = "127.0.0.1:0"
request_timeout_secs = 5

[tcp]
bind_host = "127.0.0.1"

[flow]
tick_interval_ms = 200

[auth]
jwt_secret = "{JWT_SECRET}"

[shutdown]
drain_timeout_secs = 1

[observability]
metrics_enabled = false

[admin]
enabled = true
api_key = "{ADMIN_KEY}"
bind_address = "127.0.0.1:0"

{services}
"#
    )
}

pub async fn start_gateway(services: &str) -> Gateway {
    let config = parse_config(&gateway_toml(services)).unwrap();
    let gateway = Gateway::start(config).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    gateway
}

pub fn http_url(gateway: &Gateway, path: &str) -> String {
    format!("http://{}{}", gateway.addresses().http.unwrap(), path)
}

pub fn admin_url(gateway: &Gateway, path: &str) -> String {
    format!("http://{}{}", gateway.addresses().admin.unwrap(), path)
}

pub fn service_addr(gateway: &Gateway, name: &str) -> SocketAddr {
    gateway.addresses().services[name]
}
