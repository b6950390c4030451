//! Request rewriting before the request is proxied.

use axum::body::Body;
use axum::http::uri::PathAndQuery;
use axum::http::{Request, Uri};
use axum::middleware::Next;
use axum::response::Response;

use super::{matched, MatchedService};
use crate::config::HttpMatchType;
use crate::routing::transform::{apply_header_rules, parse_header_rules, rewrite_path, strip_path_prefix};

/// Apply the service's `add`/`edit`/`del` header rules.
pub async fn header_transform(mut req: Request<Body>, next: Next) -> Response {
    let (service, _) = match matched(&req) {
        Ok(m) => m,
        Err(response) => return response,
    };
    let rules = parse_header_rules(service.header_transform());
    apply_header_rules(req.headers_mut(), &rules);
    next.run(req).await
}

/// Remove the matched path prefix when the service asks for it.
pub async fn strip_uri(mut req: Request<Body>, next: Next) -> Response {
    let prefix = req
        .extensions()
        .get::<MatchedService>()
        .and_then(|MatchedService(service)| service.http_rule())
        .filter(|rule| rule.need_strip_uri && rule.rule_type == HttpMatchType::Prefix)
        .map(|rule| rule.rule.clone());

    if let Some(prefix) = prefix {
        let path = strip_path_prefix(req.uri().path(), &prefix);
        set_path(&mut req, &path);
    }
    next.run(req).await
}

/// Apply the service's regex rewrite rules in order.
pub async fn url_rewrite(mut req: Request<Body>, next: Next) -> Response {
    let rewritten = req
        .extensions()
        .get::<MatchedService>()
        .and_then(|MatchedService(service)| service.http_rule())
        .filter(|rule| !rule.rewrite_rules().is_empty())
        .map(|rule| rewrite_path(req.uri().path(), rule.rewrite_rules()));

    if let Some(path) = rewritten {
        set_path(&mut req, &path);
    }
    next.run(req).await
}

/// Replace the request path, keeping the query string.
pub(crate) fn set_path(req: &mut Request<Body>, path: &str) {
    let path_and_query = match req.uri().query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };
    let Ok(path_and_query) = path_and_query.parse::<PathAndQuery>() else {
        tracing::warn!(path = %path, "Rewritten path is not a valid URI, keeping original");
        return;
    };

    let mut parts = req.uri().clone().into_parts();
    parts.path_and_query = Some(path_and_query);
    match Uri::from_parts(parts) {
        Ok(uri) => *req.uri_mut() = uri,
        Err(e) => tracing::warn!(error = %e, "Failed to rebuild request URI"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_path_keeps_query() {
        let mut req = Request::builder()
            .uri("/api/users?page=2")
            .body(Body::empty())
            .unwrap();
        set_path(&mut req, "/users");
        assert_eq!(req.uri().path(), "/users");
        assert_eq!(req.uri().query(), Some("page=2"));
    }

    #[test]
    fn set_path_with_authority() {
        let mut req = Request::builder()
            .uri("http://example.com/a/b")
            .body(Body::empty())
            .unwrap();
        set_path(&mut req, "/b");
        assert_eq!(req.uri().to_string(), "http://example.com/b");
    }
}
