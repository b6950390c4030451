//! Service catalog records.
//!
//! A [`ServiceDetail`] aggregates everything the gateway knows about one
//! backend service: the protocol rule that routes traffic to it, the access
//! policy applied to that traffic and the load-balance policy used to pick a
//! backend.
//!
//! # Design Decisions
//! - The protocol rule is an enum, so exactly one rule exists per service
//! - List-valued policy fields are TOML arrays; the transform mini-languages
//!   stay strings and are parsed by [`crate::routing::transform`]
//! - Compiled URL-rewrite rules are cached on the record after first use

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use crate::routing::transform::{parse_rewrite_rules, RewriteRule};

/// Weight applied to an address with no configured weight.
pub const DEFAULT_WEIGHT: u32 = 50;

/// Protocol a service is exposed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Tcp,
    Grpc,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Grpc => write!(f, "grpc"),
        }
    }
}

/// Full configuration of one service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceDetail {
    /// Unique service name.
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Protocol-specific routing rule.
    pub rule: ServiceRule,

    #[serde(default)]
    pub access_control: AccessControl,

    #[serde(default)]
    pub load_balance: LoadBalanceConfig,
}

impl ServiceDetail {
    pub fn protocol(&self) -> Protocol {
        match self.rule {
            ServiceRule::Http(_) => Protocol::Http,
            ServiceRule::Tcp(_) => Protocol::Tcp,
            ServiceRule::Grpc(_) => Protocol::Grpc,
        }
    }

    pub fn http_rule(&self) -> Option<&HttpRule> {
        match &self.rule {
            ServiceRule::Http(rule) => Some(rule),
            _ => None,
        }
    }

    /// Dedicated listen port of a TCP or gRPC service.
    pub fn listen_port(&self) -> Option<u16> {
        match &self.rule {
            ServiceRule::Tcp(rule) => Some(rule.port),
            ServiceRule::Grpc(rule) => Some(rule.port),
            ServiceRule::Http(_) => None,
        }
    }

    /// Header transform rules for HTTP and gRPC services.
    pub fn header_transform(&self) -> &str {
        match &self.rule {
            ServiceRule::Http(rule) => &rule.header_transform,
            ServiceRule::Grpc(rule) => &rule.header_transform,
            ServiceRule::Tcp(_) => "",
        }
    }

    /// Scheme prepended to backend addresses when building the pool.
    pub fn backend_scheme(&self) -> &'static str {
        match &self.rule {
            ServiceRule::Http(rule) if rule.need_https => "https://",
            ServiceRule::Http(_) => "http://",
            _ => "",
        }
    }
}

/// Protocol-specific rule, tagged by `protocol`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum ServiceRule {
    Http(HttpRule),
    Tcp(TcpRule),
    Grpc(GrpcRule),
}

/// How an HTTP rule matches requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMatchType {
    /// `rule` is a path prefix.
    #[default]
    Prefix,
    /// `rule` is an exact host name.
    Domain,
}

/// Routing rule of an HTTP service.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpRule {
    pub rule_type: HttpMatchType,

    /// Path prefix or host name, depending on `rule_type`.
    pub rule: String,

    /// Backends speak HTTPS.
    pub need_https: bool,

    /// Remove the matched prefix before forwarding.
    pub need_strip_uri: bool,

    /// Relay WebSocket upgrades.
    pub need_websocket: bool,

    /// Comma-separated `<regex> <replacement>` pairs.
    pub url_rewrite: String,

    /// Comma-separated `<op> <name> <value>` triples.
    pub header_transform: String,

    #[serde(skip)]
    pub(crate) compiled_rewrites: OnceLock<Vec<RewriteRule>>,
}

impl HttpRule {
    /// URL rewrite rules, compiled once per service.
    pub fn rewrite_rules(&self) -> &[RewriteRule] {
        self.compiled_rewrites
            .get_or_init(|| parse_rewrite_rules(&self.url_rewrite))
    }
}

/// Routing rule of a TCP service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TcpRule {
    pub port: u16,
}

/// Routing rule of a gRPC service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GrpcRule {
    pub port: u16,

    #[serde(default)]
    pub header_transform: String,
}

/// Access policy of a service.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessControl {
    /// Require a verified tenant and enforce the IP and host lists.
    pub open_auth: bool,

    /// Client IPs allowed when auth is required.
    pub white_list: Vec<String>,

    /// Client IPs rejected when auth is required and `white_list` is empty.
    pub black_list: Vec<String>,

    /// Host names allowed when auth is required (HTTP only).
    pub white_host_name: Vec<String>,

    /// Per-client-IP requests per second; 0 disables.
    pub clientip_flow_limit: u32,

    /// Service-wide requests per second; 0 disables.
    pub service_flow_limit: u32,
}

/// Backend selection algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", try_from = "RoundTypeValue")]
pub enum LbType {
    Random = 0,
    #[default]
    RoundRobin = 1,
    WeightRoundRobin = 2,
    ConsistentHash = 3,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RoundTypeValue {
    Index(u8),
    Name(String),
}

impl TryFrom<RoundTypeValue> for LbType {
    type Error = String;

    fn try_from(value: RoundTypeValue) -> Result<Self, Self::Error> {
        match value {
            RoundTypeValue::Index(0) => Ok(LbType::Random),
            RoundTypeValue::Index(1) => Ok(LbType::RoundRobin),
            RoundTypeValue::Index(2) => Ok(LbType::WeightRoundRobin),
            RoundTypeValue::Index(3) => Ok(LbType::ConsistentHash),
            RoundTypeValue::Index(n) => Err(format!("unknown round_type {}", n)),
            RoundTypeValue::Name(name) => match name.as_str() {
                "random" => Ok(LbType::Random),
                "round_robin" => Ok(LbType::RoundRobin),
                "weight_round_robin" => Ok(LbType::WeightRoundRobin),
                "consistent_hash" => Ok(LbType::ConsistentHash),
                other => Err(format!("unknown round_type {:?}", other)),
            },
        }
    }
}

/// Load-balance policy of a service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadBalanceConfig {
    pub round_type: LbType,

    /// Backend addresses (`host:port`, optionally with a path for HTTP).
    pub ip_list: Vec<String>,

    /// Weights, parallel to `ip_list`; missing entries use the default weight.
    pub weight_list: Vec<u32>,

    /// Addresses excluded from the pool.
    pub forbid_list: Vec<String>,

    /// Probe interval override, in seconds.
    pub check_interval_secs: Option<u64>,

    /// Probe timeout override, in seconds.
    pub check_timeout_secs: Option<u64>,

    /// Take the active list from this external registry path instead of probing.
    pub registry_path: Option<String>,

    pub upstream_connect_timeout_secs: u64,

    /// Time allowed for response headers; 0 disables.
    pub upstream_header_timeout_secs: u64,

    pub upstream_idle_timeout_secs: u64,

    pub upstream_max_idle: usize,
}

impl LoadBalanceConfig {
    /// Configured `(address, weight)` pairs with forbidden addresses removed.
    pub fn weighted_addresses(&self) -> Vec<(String, u32)> {
        self.ip_list
            .iter()
            .enumerate()
            .filter(|(_, addr)| !self.forbid_list.contains(addr))
            .map(|(i, addr)| {
                let weight = self.weight_list.get(i).copied().unwrap_or(DEFAULT_WEIGHT);
                (addr.clone(), weight)
            })
            .collect()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_connect_timeout_secs)
    }

    pub fn header_timeout(&self) -> Option<Duration> {
        (self.upstream_header_timeout_secs > 0)
            .then(|| Duration::from_secs(self.upstream_header_timeout_secs))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_idle_timeout_secs)
    }
}

impl Default for LoadBalanceConfig {
    fn default() -> Self {
        Self {
            round_type: LbType::RoundRobin,
            ip_list: Vec::new(),
            weight_list: Vec::new(),
            forbid_list: Vec::new(),
            check_interval_secs: None,
            check_timeout_secs: None,
            registry_path: None,
            upstream_connect_timeout_secs: 30,
            upstream_header_timeout_secs: 0,
            upstream_idle_timeout_secs: 90,
            upstream_max_idle: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_http_service() {
        let svc: ServiceDetail = toml::from_str(
            r#"
            name = "svc1"
            [rule]
            protocol = "http"
            rule_type = "prefix"
            rule = "/svc1"
            need_strip_uri = true
            [load_balance]
            round_type = "round_robin"
            ip_list = ["10.0.0.1:80", "10.0.0.2:80"]
            weight_list = [1, 1]
            "#,
        )
        .unwrap();

        assert_eq!(svc.protocol(), Protocol::Http);
        let rule = svc.http_rule().unwrap();
        assert_eq!(rule.rule, "/svc1");
        assert!(rule.need_strip_uri);
        assert_eq!(svc.backend_scheme(), "http://");
        assert_eq!(svc.listen_port(), None);
    }

    #[test]
    fn parses_round_type_by_number() {
        let svc: ServiceDetail = toml::from_str(
            r#"
            name = "tcp1"
            [rule]
            protocol = "tcp"
            port = 8001
            [load_balance]
            round_type = 3
            ip_list = ["127.0.0.1:9000"]
            "#,
        )
        .unwrap();

        assert_eq!(svc.load_balance.round_type, LbType::ConsistentHash);
        assert_eq!(svc.listen_port(), Some(8001));
        assert_eq!(svc.backend_scheme(), "");
    }

    #[test]
    fn rejects_unknown_round_type() {
        let result: Result<LoadBalanceConfig, _> = toml::from_str(r#"round_type = 9"#);
        assert!(result.is_err());
    }

    #[test]
    fn weights_default_and_forbidden_addresses_are_dropped() {
        let lb = LoadBalanceConfig {
            ip_list: vec!["a:1".into(), "b:1".into(), "c:1".into()],
            weight_list: vec![3],
            forbid_list: vec!["b:1".into()],
            ..Default::default()
        };

        assert_eq!(
            lb.weighted_addresses(),
            vec![("a:1".to_string(), 3), ("c:1".to_string(), DEFAULT_WEIGHT)]
        );
    }
}
