//! End-to-end tests: real listeners, real backends, one gateway per test.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

mod common;
use common::*;

#[tokio::test]
async fn http_round_robin_alternates_backends() {
    let (a, _ha) = start_named_backend("A").await;
    let (b, _hb) = start_named_backend("B").await;
    let gateway = start_gateway(&format!(
        r#"
[[services]]
name = "web"
[services.rule]
protocol = "http"
rule = "/web"
[services.load_balance]
round_type = "round_robin"
ip_list = ["{a}", "{b}"]
"#
    ))
    .await;

    let client = reqwest::Client::new();
    let mut order = Vec::new();
    for _ in 0..6 {
        let res = client.get(http_url(&gateway, "/web/ping")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        order.push(res.headers()["x-backend"].to_str().unwrap().to_string());
    }
    let first = order[0].clone();
    let second = if first == "A" { "B" } else { "A" };
    let expected: Vec<&str> = [first.as_str(), second].repeat(3);
    assert_eq!(order, expected);

    gateway.shutdown_handle().trigger();
    tokio::time::timeout(Duration::from_secs(5), gateway.join()).await.unwrap();
}

#[tokio::test]
async fn http_strip_uri_header_transform_and_forwarded_for() {
    let (a, _ha) = start_named_backend("A").await;
    let gateway = start_gateway(&format!(
        r#"
[[services]]
name = "api"
[services.rule]
protocol = "http"
rule = "/api"
need_strip_uri = true
header_transform = "add x-gateway yes"
[services.load_balance]
ip_list = ["{a}"]
"#
    ))
    .await;

    let res = reqwest::Client::new()
        .get(http_url(&gateway, "/api/users?page=2"))
        .header("x-gateway", "client")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-seen-forwarded-for"], "127.0.0.1");
    assert_eq!(res.headers()["x-seen-gateway"], "client, yes");
    assert_eq!(res.text().await.unwrap(), "A /users?page=2");

    gateway.shutdown_handle().trigger();
}

#[tokio::test]
async fn http_url_rewrite_changes_backend_path() {
    let (a, _ha) = start_named_backend("A").await;
    let gateway = start_gateway(&format!(
        r#"
[[services]]
name = "legacy"
[services.rule]
protocol = "http"
rule = "/v1"
url_rewrite = "^/v1/(.*) /v2/$1"
[services.load_balance]
ip_list = ["{a}"]
"#
    ))
    .await;

    let res = reqwest::get(http_url(&gateway, "/v1/orders/7?expand=items")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "A /v2/orders/7?expand=items");

    gateway.shutdown_handle().trigger();
}

#[tokio::test]
async fn http_websocket_upgrade_is_relayed() {
    let backend = start_upgrade_backend().await;
    let gateway = start_gateway(&format!(
        r#"
[[services]]
name = "chat"
[services.rule]
protocol = "http"
rule = "/ws"
need_websocket = true
[services.load_balance]
ip_list = ["{backend}"]
"#
    ))
    .await;

    let mut conn = TcpStream::connect(gateway.addresses().http.unwrap()).await.unwrap();
    conn.write_all(
        b"GET /ws/chat HTTP/1.1\r\nHost: gateway\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\
Sec-WebSocket-Version: 13\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n",
    )
    .await
    .unwrap();

    let head = tokio::time::timeout(Duration::from_secs(5), read_head(&mut conn))
        .await
        .unwrap();
    assert!(head.starts_with("HTTP/1.1 101"), "unexpected head {:?}", head);

    for message in [&b"ping"[..], &b"second frame"[..]] {
        conn.write_all(message).await.unwrap();
        let mut echoed = vec![0u8; message.len()];
        tokio::time::timeout(Duration::from_secs(5), conn.read_exact(&mut echoed))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(echoed, message);
    }

    gateway.shutdown_handle().trigger();
}

#[tokio::test]
async fn http_upgrade_without_websocket_is_plain_request() {
    let (a, _ha) = start_named_backend("A").await;
    let gateway = start_gateway(&format!(
        r#"
[[services]]
name = "plain"
[services.rule]
protocol = "http"
rule = "/ws"
[services.load_balance]
ip_list = ["{a}"]
"#
    ))
    .await;

    let res = reqwest::Client::new()
        .get(http_url(&gateway, "/ws/chat"))
        .header("connection", "Upgrade")
        .header("upgrade", "websocket")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-seen-upgrade"], "");
    assert_eq!(res.text().await.unwrap(), "A /ws/chat");

    gateway.shutdown_handle().trigger();
}

#[tokio::test]
async fn http_unmatched_path_is_9001() {
    let (a, _ha) = start_named_backend("A").await;
    let gateway = start_gateway(&format!(
        r#"
[[services]]
name = "api"
[services.rule]
protocol = "http"
rule = "/api"
[services.load_balance]
ip_list = ["{a}"]
"#
    ))
    .await;

    let res = reqwest::get(http_url(&gateway, "/other")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let json: Value = res.json().await.unwrap();
    assert_eq!(json["errno"], 9001);
    assert!(json["request_id"].as_str().is_some_and(|id| !id.is_empty()));

    gateway.shutdown_handle().trigger();
}

#[tokio::test]
async fn http_service_flow_limit_rejects_after_burst() {
    let (a, _ha) = start_named_backend("A").await;
    let gateway = start_gateway(&format!(
        r#"
[[services]]
name = "limited"
[services.rule]
protocol = "http"
rule = "/limited"
[services.access_control]
service_flow_limit = 1
[services.load_balance]
ip_list = ["{a}"]
"#
    ))
    .await;

    let client = reqwest::Client::new();
    let mut first_rejected = None;
    for i in 0..10 {
        let res = client.get(http_url(&gateway, "/limited")).send().await.unwrap();
        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            let json: Value = res.json().await.unwrap();
            assert_eq!(json["errno"], 9007);
            assert_eq!(json["errmsg"], "service flow limit exceeded: 1");
            first_rejected = Some(i);
            break;
        }
        assert_eq!(res.status(), StatusCode::OK);
    }
    // Burst is three times the rate.
    let index = first_rejected.expect("limit never applied");
    assert!(index >= 3, "rejected too early at request {}", index);

    gateway.shutdown_handle().trigger();
}

#[tokio::test]
async fn http_open_auth_requires_tenant_token() {
    let (a, _ha) = start_named_backend("A").await;
    let gateway = start_gateway(&format!(
        r#"
[[services]]
name = "private"
[services.rule]
protocol = "http"
rule = "/private"
[services.access_control]
open_auth = true
[services.load_balance]
ip_list = ["{a}"]

[[tenants]]
app_id = "app_a"
name = "Tenant A"
"#
    ))
    .await;

    let client = reqwest::Client::new();
    let res = client.get(http_url(&gateway, "/private")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let json: Value = res.json().await.unwrap();
    assert_eq!(json["errno"], 9006);

    let res = client
        .get(http_url(&gateway, "/private"))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    let json: Value = res.json().await.unwrap();
    assert_eq!(json["errno"], 9005);

    let token = gateway.state().jwt.issue("app_a", None).unwrap();
    let res = client
        .get(http_url(&gateway, "/private"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    gateway.shutdown_handle().trigger();
}

#[tokio::test]
async fn http_failed_backend_leaves_rotation() {
    let (a, _ha) = start_named_backend("A").await;
    let (b, hb) = start_named_backend("B").await;
    let gateway = start_gateway(&format!(
        r#"
[[services]]
name = "web"
[services.rule]
protocol = "http"
rule = "/"
[services.load_balance]
ip_list = ["{a}", "{b}"]
check_interval_secs = 1
check_timeout_secs = 1
"#
    ))
    .await;

    hb.abort();
    let client = reqwest::Client::new();
    let mut only_a = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let mut backends = Vec::new();
        for _ in 0..2 {
            if let Ok(res) = client.get(http_url(&gateway, "/")).send().await {
                if let Some(name) = res.headers().get("x-backend") {
                    backends.push(name.to_str().unwrap().to_string());
                }
            }
        }
        if backends == ["A", "A"] {
            only_a = true;
            break;
        }
    }
    assert!(only_a, "failed backend stayed in rotation");

    gateway.shutdown_handle().trigger();
}

#[tokio::test]
async fn tcp_proxy_echoes_and_rejects_over_limit() {
    let echo = start_echo_backend().await;
    let port = free_port().await;
    let gateway = start_gateway(&format!(
        r#"
[[services]]
name = "echo"
[services.rule]
protocol = "tcp"
port = {port}
[services.access_control]
service_flow_limit = 1
[services.load_balance]
ip_list = ["{echo}"]
"#
    ))
    .await;
    let addr = service_addr(&gateway, "echo");

    let mut rejection = None;
    for i in 0..10 {
        let mut conn = TcpStream::connect(addr).await.unwrap();
        conn.write_all(b"hello\n").await.unwrap();
        let mut buf = vec![0u8; 64];
        let n = tokio::time::timeout(Duration::from_secs(2), conn.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let text = String::from_utf8_lossy(&buf[..n]).to_string();
        if text == "hello\n" {
            continue;
        }
        rejection = Some((i, text));
        break;
    }

    let (index, line) = rejection.expect("limit never applied");
    assert!(index >= 3, "rejected too early at connection {}", index);
    assert_eq!(line, "service flow limit exceeded: 1\n");

    gateway.shutdown_handle().trigger();
    tokio::time::timeout(Duration::from_secs(5), gateway.join()).await.unwrap();
}

#[tokio::test]
async fn tcp_unreachable_backend_closes_client() {
    let refused = refused_addr().await;
    let port = free_port().await;
    let gateway = start_gateway(&format!(
        r#"
[[services]]
name = "down"
[services.rule]
protocol = "tcp"
port = {port}
[services.load_balance]
ip_list = ["{refused}"]
"#
    ))
    .await;

    let mut conn = TcpStream::connect(service_addr(&gateway, "down")).await.unwrap();
    let _ = conn.write_all(b"hello\n").await;
    let mut rest = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), conn.read_to_end(&mut rest))
        .await
        .unwrap();
    // Either a clean EOF or a reset; never a rejection line.
    if read.is_ok() {
        assert!(rest.is_empty(), "unexpected reply {:?}", rest);
    }

    gateway.shutdown_handle().trigger();
}

#[tokio::test]
async fn grpc_passthrough_and_trailers_only_rejection() {
    let backend = start_grpc_backend().await;
    let port = free_port().await;
    let gateway = start_gateway(&format!(
        r#"
[[services]]
name = "greeter"
[services.rule]
protocol = "grpc"
port = {port}
header_transform = "add x-gateway grpc"
[services.access_control]
service_flow_limit = 1
[services.load_balance]
ip_list = ["{backend}"]
"#
    ))
    .await;
    let addr = service_addr(&gateway, "greeter");

    let client = Client::builder(TokioExecutor::new())
        .http2_only(true)
        .build_http::<Body>();
    let call = || {
        Request::builder()
            .method(Method::POST)
            .uri(format!("http://{}/helloworld.Greeter/SayHello", addr))
            .header("content-type", "application/grpc")
            .header("te", "trailers")
            .body(Body::from(&b"\x00\x00\x00\x00\x02hi"[..]))
            .unwrap()
    };

    let res = client.request(call()).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["grpc-status"], "0");
    assert_eq!(res.headers()["x-method"], "/helloworld.Greeter/SayHello");
    assert_eq!(res.headers()["x-seen-gateway"], "grpc");
    let body = axum::body::to_bytes(Body::new(res.into_body()), 1024).await.unwrap();
    assert_eq!(&body[..], b"\x00\x00\x00\x00\x02hi");

    let mut rejected = None;
    for _ in 0..10 {
        let res = client.request(call()).await.unwrap();
        if res.headers()["grpc-status"] != "0" {
            rejected = Some(res);
            break;
        }
    }
    let res = rejected.expect("limit never applied");
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["grpc-status"], "8");
    let message = res.headers()["grpc-message"].to_str().unwrap();
    assert!(message.starts_with("9007"), "unexpected grpc-message {}", message);

    gateway.shutdown_handle().trigger();
}

#[tokio::test]
async fn admin_api_requires_key_and_reports() {
    let (a, _ha) = start_named_backend("A").await;
    let gateway = start_gateway(&format!(
        r#"
[[services]]
name = "web"
[services.rule]
protocol = "http"
rule = "/web"
[services.load_balance]
ip_list = ["{a}"]
"#
    ))
    .await;

    let client = reqwest::Client::new();
    let res = client.get(admin_url(&gateway, "/admin/status")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(admin_url(&gateway, "/admin/status"))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    client.get(http_url(&gateway, "/web")).send().await.unwrap();

    let status: Value = client
        .get(admin_url(&gateway, "/admin/status"))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "operational");
    assert_eq!(status["services"], 1);

    let backends = client
        .get(admin_url(&gateway, "/admin/services/web/backends"))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(backends.status(), StatusCode::OK);

    let missing = client
        .get(admin_url(&gateway, "/admin/services/nope/backends"))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let flow = client
        .get(admin_url(&gateway, "/admin/flow/flow_total"))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(flow.status(), StatusCode::OK);

    gateway.shutdown_handle().trigger();
}
