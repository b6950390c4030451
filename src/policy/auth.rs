//! Credential and IP-list stages.

use std::sync::Arc;

use crate::config::{ServiceDetail, Tenant};
use crate::policy::{RejectReason, Rejection};
use crate::security::access_control::check_ip_lists;
use crate::security::jwt::bearer_token;
use crate::state::GatewayState;

/// Resolve the calling tenant from an `Authorization` value.
///
/// A credential is optional. When one is present it must verify; its issuer
/// is then looked up in the tenant directory, and the tenant is only accepted
/// from an IP on its own allow-list. Services that require auth reject
/// requests that end up with no tenant.
pub fn authenticate(
    state: &GatewayState,
    service: &ServiceDetail,
    authorization: Option<&str>,
    client_ip: &str,
) -> Result<Option<Arc<Tenant>>, Rejection> {
    let mut tenant = None;

    if let Some(token) = authorization.and_then(bearer_token) {
        let claims = state.jwt.verify(token).map_err(|e| {
            Rejection::new(RejectReason::InvalidCredential, format!("invalid credential: {}", e))
        })?;

        tenant = state.tenants.get(&claims.iss).filter(|t| {
            let allowed = t.allows_ip(client_ip);
            if !allowed {
                tracing::debug!(app_id = %t.app_id, client_ip = %client_ip, "Tenant not allowed from this IP");
            }
            allowed
        });
    }

    if service.access_control.open_auth && tenant.is_none() {
        return Err(Rejection::new(RejectReason::AccessDenied, "access denied"));
    }
    Ok(tenant)
}

/// Service IP allow and deny lists.
pub fn check_client_ip(service: &ServiceDetail, client_ip: &str) -> Result<(), Rejection> {
    check_ip_lists(&service.access_control, client_ip)
}
