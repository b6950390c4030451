//! Service IP lists and host allow-list.

use axum::body::Body;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use super::{matched, reject};
use crate::http::request::request_host;
use crate::policy::auth::check_client_ip;
use crate::security::access_control::check_host;

pub async fn access_control(req: Request<Body>, next: Next) -> Response {
    let (service, client_ip) = match matched(&req) {
        Ok(m) => m,
        Err(response) => return response,
    };

    let checked = check_client_ip(&service, &client_ip)
        .and_then(|()| check_host(&service.access_control, request_host(&req)));
    if let Err(rejection) = checked {
        return reject(&req, rejection);
    }
    next.run(req).await
}
