//! IP and host allow/deny lists.
//!
//! Lists only apply to services that require auth. A non-empty allow-list
//! decides on its own; the deny-list is consulted only when the allow-list is
//! empty.

use crate::config::AccessControl;
use crate::policy::{RejectReason, Rejection};
use crate::routing::matcher::strip_port;

/// Check the client IP against the service's allow and deny lists.
pub fn check_ip_lists(policy: &AccessControl, client_ip: &str) -> Result<(), Rejection> {
    if !policy.open_auth {
        return Ok(());
    }

    if !policy.white_list.is_empty() {
        if policy.white_list.iter().any(|ip| ip == client_ip) {
            return Ok(());
        }
        return Err(Rejection::new(
            RejectReason::IpNotAllowed,
            format!("{} not in white ip list", client_ip),
        ));
    }

    if policy.black_list.iter().any(|ip| ip == client_ip) {
        return Err(Rejection::new(
            RejectReason::IpDenied,
            format!("{} in black ip list", client_ip),
        ));
    }

    Ok(())
}

/// Check the request host against the service's host allow-list.
pub fn check_host(policy: &AccessControl, host: &str) -> Result<(), Rejection> {
    if !policy.open_auth || policy.white_host_name.is_empty() {
        return Ok(());
    }

    let host = strip_port(host);
    if policy
        .white_host_name
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(host))
    {
        Ok(())
    } else {
        Err(Rejection::new(
            RejectReason::HostNotAllowed,
            format!("{} not in white host list", host),
        ))
    }
}
