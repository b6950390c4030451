//! Shared gateway state.
//!
//! One `GatewayState` is built at startup and shared (via `Arc`) by every
//! listener, middleware stage and the admin API. All registries inside it
//! are populated lazily and never shrink.

use std::sync::Arc;
use std::time::Instant;

use crate::config::GatewayConfig;
use crate::discovery::RegistryClient;
use crate::flow::registry::FlowCounterRegistry;
use crate::flow::store::{FlowStore, MemoryFlowStore};
use crate::health::{Prober, TcpProber};
use crate::lifecycle::Shutdown;
use crate::load_balancer::{LoadBalancerRegistry, TransportRegistry};
use crate::routing::catalog::{ServiceCatalog, StaticCatalog};
use crate::routing::{ServiceDirectory, TenantDirectory};
use crate::security::jwt::JwtVerifier;
use crate::security::rate_limit::FlowLimiterRegistry;

/// Pluggable collaborators. Defaults come from the configuration.
pub struct Dependencies {
    pub catalog: Arc<dyn ServiceCatalog>,
    pub flow_store: Arc<dyn FlowStore>,
    pub prober: Arc<dyn Prober>,
    pub registry: Option<Arc<dyn RegistryClient>>,
}

impl Dependencies {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            catalog: Arc::new(StaticCatalog::from_config(config)),
            flow_store: Arc::new(MemoryFlowStore::new()),
            prober: Arc::new(TcpProber),
            registry: None,
        }
    }
}

pub struct GatewayState {
    pub config: Arc<GatewayConfig>,
    pub services: ServiceDirectory,
    pub tenants: TenantDirectory,
    pub flow_counters: FlowCounterRegistry,
    pub flow_limiters: FlowLimiterRegistry,
    pub balancers: LoadBalancerRegistry,
    pub transports: TransportRegistry,
    pub jwt: JwtVerifier,
    pub shutdown: Shutdown,
    pub started_at: Instant,
}

impl GatewayState {
    pub fn new(config: GatewayConfig, deps: Dependencies, shutdown: Shutdown) -> Self {
        let flow_counters = FlowCounterRegistry::new(deps.flow_store, &config.flow, shutdown.clone());
        let balancers = LoadBalancerRegistry::new(
            config.health_check.clone(),
            deps.prober,
            deps.registry,
            shutdown.clone(),
        );
        let jwt = JwtVerifier::new(&config.auth.jwt_secret);

        Self {
            services: ServiceDirectory::new(deps.catalog.clone()),
            tenants: TenantDirectory::new(deps.catalog),
            flow_counters,
            flow_limiters: FlowLimiterRegistry::new(),
            balancers,
            transports: TransportRegistry::new(),
            jwt,
            shutdown,
            started_at: Instant::now(),
            config: Arc::new(config),
        }
    }

    /// State with default collaborators for `config`.
    pub fn from_config(config: GatewayConfig, shutdown: Shutdown) -> Self {
        let deps = Dependencies::from_config(&config);
        Self::new(config, deps, shutdown)
    }
}
