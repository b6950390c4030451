//! Read-only statistics API.
//!
//! ```text
//! GET /admin/status                      version, uptime, gateway totals
//! GET /admin/services                    catalog with live pool sizes
//! GET /admin/services/{name}/backends    configured vs. active backends
//! GET /admin/flow/{key}                  QPS, day and hour totals of a counter
//! ```
//!
//! Every route requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::SharedState;

pub fn setup_admin_router(state: SharedState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/services", get(list_services))
        .route("/admin/services/{name}/backends", get(get_backends))
        .route("/admin/flow/{key}", get(get_flow))
        .layer(from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
