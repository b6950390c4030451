//! Header and URL transform rules.
//!
//! Services carry two small rule languages as plain strings:
//!
//! ```text
//! header_transform = "add X-Tenant gw,edit User-Agent gw/1,del Cookie x"
//! url_rewrite      = "^/svc1/v1/(.*) /v2/$1,^/old /new"
//! ```
//!
//! Entries are comma-separated and tokens are separated by a single space. A
//! header entry needs exactly three tokens and a rewrite entry exactly two;
//! anything else is skipped without error.

use axum::http::header::{HeaderMap, HeaderName, HeaderValue};
use regex::Regex;

/// Header operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderOp {
    Add,
    Edit,
    Del,
}

/// A single parsed header rule.
#[derive(Debug, Clone)]
pub struct HeaderRule {
    pub op: HeaderOp,
    pub name: HeaderName,
    pub value: HeaderValue,
}

/// Parse a header transform string.
pub fn parse_header_rules(spec: &str) -> Vec<HeaderRule> {
    spec.split(',')
        .filter_map(|entry| {
            let tokens: Vec<&str> = entry.split(' ').collect();
            if tokens.len() != 3 {
                return None;
            }
            let op = match tokens[0] {
                "add" => HeaderOp::Add,
                "edit" => HeaderOp::Edit,
                "del" => HeaderOp::Del,
                _ => return None,
            };
            let name = HeaderName::from_bytes(tokens[1].as_bytes()).ok()?;
            let value = HeaderValue::from_str(tokens[2]).ok()?;
            Some(HeaderRule { op, name, value })
        })
        .collect()
}

/// Apply header rules in order. `add` appends a value, `edit` replaces
/// every existing value.
pub fn apply_header_rules(headers: &mut HeaderMap, rules: &[HeaderRule]) {
    for rule in rules {
        match rule.op {
            HeaderOp::Add => {
                headers.append(rule.name.clone(), rule.value.clone());
            }
            HeaderOp::Edit => {
                headers.insert(rule.name.clone(), rule.value.clone());
            }
            HeaderOp::Del => {
                headers.remove(&rule.name);
            }
        }
    }
}

/// A compiled URL rewrite rule.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    pattern: Regex,
    replacement: String,
}

impl RewriteRule {
    pub fn apply(&self, path: &str) -> String {
        self.pattern
            .replace_all(path, self.replacement.as_str())
            .into_owned()
    }
}

/// Parse a URL rewrite string; entries whose pattern fails to compile are skipped.
pub fn parse_rewrite_rules(spec: &str) -> Vec<RewriteRule> {
    spec.split(',')
        .filter_map(|entry| {
            let tokens: Vec<&str> = entry.split(' ').collect();
            if tokens.len() != 2 {
                return None;
            }
            let pattern = Regex::new(tokens[0]).ok()?;
            Some(RewriteRule {
                pattern,
                replacement: tokens[1].to_string(),
            })
        })
        .collect()
}

/// Run every rewrite rule over `path`, each on the previous result.
pub fn rewrite_path(path: &str, rules: &[RewriteRule]) -> String {
    rules
        .iter()
        .fold(path.to_string(), |current, rule| rule.apply(&current))
}

/// Remove a matched prefix from the path, keeping it absolute.
pub fn strip_path_prefix(path: &str, prefix: &str) -> String {
    let stripped = path.strip_prefix(prefix).unwrap_or(path);
    if stripped.is_empty() {
        "/".to_string()
    } else if stripped.starts_with('/') {
        stripped.to_string()
    } else {
        format!("/{}", stripped)
    }
}
