//! Accounting and rate-limit stages.

use crate::config::{ServiceDetail, Tenant};
use crate::flow::{app_key, client_key, service_key, FLOW_TOTAL};
use crate::policy::{RejectReason, Rejection};
use crate::state::GatewayState;

/// Count one admitted request against the gateway and its service.
pub fn count_service_flow(state: &GatewayState, service: &ServiceDetail) {
    state.flow_counters.get(FLOW_TOTAL).increase();
    state.flow_counters.get(&service_key(&service.name)).increase();
}

/// Enforce the service-wide and then the per-client limit.
pub fn check_service_limits(
    state: &GatewayState,
    service: &ServiceDetail,
    client_ip: &str,
) -> Result<(), Rejection> {
    let policy = &service.access_control;

    if policy.service_flow_limit > 0 {
        let limiter = state
            .flow_limiters
            .get(&service_key(&service.name), policy.service_flow_limit);
        if !limiter.allow() {
            return Err(Rejection::new(
                RejectReason::ServiceFlowLimit,
                format!("service flow limit exceeded: {}", policy.service_flow_limit),
            ));
        }
    }

    if policy.clientip_flow_limit > 0 {
        let limiter = state
            .flow_limiters
            .get(&client_key(&service.name, client_ip), policy.clientip_flow_limit);
        if !limiter.allow() {
            return Err(Rejection::new(
                RejectReason::ClientFlowLimit,
                format!(
                    "{} client flow limit exceeded: {}",
                    client_ip, policy.clientip_flow_limit
                ),
            ));
        }
    }

    Ok(())
}

/// Count one request against the tenant and enforce its day quota.
///
/// The quota is checked against the aggregated total of the last flush, so
/// a burst may overshoot `qpd` by up to one tick of traffic.
pub fn count_tenant_flow(state: &GatewayState, tenant: &Tenant) -> Result<(), Rejection> {
    let counter = state.flow_counters.get(&app_key(&tenant.app_id));
    counter.increase();

    let total = counter.total_count();
    if tenant.qpd > 0 && total >= 0 && total as u64 >= tenant.qpd {
        return Err(Rejection::new(
            RejectReason::TenantQuotaExceeded,
            format!("app qpd limit: {} current: {}", tenant.qpd, total),
        ));
    }
    Ok(())
}

/// Enforce the tenant's per-second limit.
pub fn check_tenant_limit(state: &GatewayState, tenant: &Tenant) -> Result<(), Rejection> {
    if tenant.qps == 0 {
        return Ok(());
    }
    let limiter = state.flow_limiters.get(&app_key(&tenant.app_id), tenant.qps);
    if limiter.allow() {
        Ok(())
    } else {
        Err(Rejection::new(
            RejectReason::TenantFlowLimit,
            format!("app flow limit exceeded: {}", tenant.qps),
        ))
    }
}
