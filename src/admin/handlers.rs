use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::{LbType, Protocol};
use crate::flow::{service_key, FLOW_TOTAL};
use crate::http::SharedState;
use crate::load_balancer::backend::{parse_entries, BackendEntry};

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub uptime_secs: u64,
    pub services: usize,
    pub total_qps: i64,
    pub total_requests: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceSummary {
    pub name: String,
    pub description: String,
    pub protocol: Protocol,
    pub load_balance: LbType,
    pub configured_backends: usize,
    /// `None` until the service's pool is first used.
    pub active_backends: Option<usize>,
    pub qps: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackendReport {
    pub service: String,
    pub configured: Vec<BackendEntry>,
    pub active: Vec<BackendEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FlowStat {
    pub key: String,
    pub qps: i64,
    pub total: i64,
    pub day_count: i64,
    pub hour_count: i64,
}

pub async fn get_status(State(state): State<SharedState>) -> Json<SystemStatus> {
    let total = state.flow_counters.peek(FLOW_TOTAL);
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        services: state.services.services().len(),
        total_qps: total.as_ref().map_or(0, |c| c.qps()),
        total_requests: total.as_ref().map_or(0, |c| c.total_count()),
    })
}

pub async fn list_services(State(state): State<SharedState>) -> Json<Vec<ServiceSummary>> {
    let summaries = state
        .services
        .services()
        .iter()
        .map(|service| ServiceSummary {
            name: service.name.clone(),
            description: service.description.clone(),
            protocol: service.protocol(),
            load_balance: service.load_balance.round_type,
            configured_backends: service.load_balance.weighted_addresses().len(),
            active_backends: state.balancers.pool(&service.name).map(|pool| pool.len()),
            qps: state
                .flow_counters
                .peek(&service_key(&service.name))
                .map_or(0, |c| c.qps()),
        })
        .collect();
    Json(summaries)
}

/// Configured and currently active backends. Looking a service up here
/// builds its pool if no traffic has done so yet.
pub async fn get_backends(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Json<BackendReport>, (StatusCode, String)> {
    let service = state
        .services
        .get(&name)
        .map_err(|e| (StatusCode::NOT_FOUND, e.to_string()))?;

    state.balancers.get(&service);
    let scheme = service.backend_scheme();
    let configured = service
        .load_balance
        .weighted_addresses()
        .into_iter()
        .map(|(addr, weight)| BackendEntry {
            addr: format!("{}{}", scheme, addr),
            weight,
        })
        .collect();
    let active = state
        .balancers
        .pool(&name)
        .map(|pool| parse_entries(&pool))
        .unwrap_or_default();

    Ok(Json(BackendReport {
        service: name,
        configured,
        active,
    }))
}

pub async fn get_flow(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<Json<FlowStat>, (StatusCode, String)> {
    let counter = state
        .flow_counters
        .peek(&key)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("no flow counter {:?}", key)))?;

    let now = Utc::now();
    let unavailable = |e: crate::flow::FlowStoreError| (StatusCode::SERVICE_UNAVAILABLE, e.to_string());
    let day_count = counter.day_data(now).await.map_err(unavailable)?;
    let hour_count = counter.hour_data(now).await.map_err(unavailable)?;

    Ok(Json(FlowStat {
        key,
        qps: counter.qps(),
        total: counter.total_count(),
        day_count,
        hour_count,
    }))
}
