//! HTTP rule matching.
//!
//! # Responsibilities
//! - Match host (exact match, case-insensitive, port ignored)
//! - Match path prefix (case-sensitive)
//!
//! # Design Decisions
//! - Host matching is case-insensitive (per HTTP spec)
//! - Path matching is case-sensitive
//! - No regex to guarantee O(n) matching

use crate::config::service::{HttpMatchType, HttpRule};

/// Trait for matching a request's host and path against a rule.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, host: &str, path: &str) -> bool;
}

/// Matches the Host header.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    expected_host: String,
}

impl HostMatcher {
    /// Create a new host matcher.
    /// The host is normalized to lowercase for case-insensitive matching.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            expected_host: host.into().to_lowercase(),
        }
    }
}

impl Matcher for HostMatcher {
    fn matches(&self, host: &str, _path: &str) -> bool {
        strip_port(host).eq_ignore_ascii_case(&self.expected_host)
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, _host: &str, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }
}

/// Build the matcher for an HTTP rule.
pub fn matcher_for(rule: &HttpRule) -> Box<dyn Matcher> {
    match rule.rule_type {
        HttpMatchType::Prefix => Box::new(PathPrefixMatcher::new(rule.rule.clone())),
        HttpMatchType::Domain => Box::new(HostMatcher::new(rule.rule.clone())),
    }
}

/// Remove a trailing `:port` from a host, leaving IPv6 literals intact.
pub fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rfind(':') {
        Some(idx) => &host[..idx],
        None => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_matcher() {
        let matcher = HostMatcher::new("example.com");

        assert!(matcher.matches("example.com", "/"));
        assert!(matcher.matches("EXAMPLE.COM:8080", "/")); // Case insensitive, port ignored
        assert!(!matcher.matches("other.com", "/"));
    }

    #[test]
    fn test_path_matcher() {
        let matcher = PathPrefixMatcher::new("/abc");

        assert!(matcher.matches("example.com", "/abc/x"));
        assert!(!matcher.matches("example.com", "/xabc"));
        assert!(!matcher.matches("example.com", "/ABC/x"));
    }

    #[test]
    fn strip_port_handles_ipv6() {
        assert_eq!(strip_port("example.com:80"), "example.com");
        assert_eq!(strip_port("example.com"), "example.com");
        assert_eq!(strip_port("[::1]:8080"), "[::1]");
    }
}
