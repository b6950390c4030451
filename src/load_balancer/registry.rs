//! Per-service balancer registry.
//!
//! # Responsibilities
//! - Build each service's pool source and balancer on first use
//! - Start the source's background loop exactly once
//! - Expose active pools for the admin API
//!
//! # Design Decisions
//! - Keyed by service name; the entry lives for the life of the process
//! - Services with a `registry_path` follow the registry; all others are
//!   health-checked
//! - Creation happens inside `DashMap::entry`, so racing first callers share
//!   one source and one probe loop

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::{HealthCheckConfig, ServiceDetail};
use crate::discovery::{RegistryClient, RegistryWatchSource};
use crate::health::{HealthCheckedSource, ProbeSettings, Prober};
use crate::lifecycle::Shutdown;
use crate::load_balancer::pool::{PoolSource, PoolSubject};
use crate::load_balancer::{build, LoadBalancer};

#[derive(Clone)]
struct BalancerEntry {
    balancer: Arc<dyn LoadBalancer>,
    source: Arc<dyn PoolSource>,
}

/// Lazily populated map of service balancers.
pub struct LoadBalancerRegistry {
    entries: DashMap<String, BalancerEntry>,
    health: HealthCheckConfig,
    prober: Arc<dyn Prober>,
    registry: Option<Arc<dyn RegistryClient>>,
    shutdown: Shutdown,
}

impl LoadBalancerRegistry {
    pub fn new(
        health: HealthCheckConfig,
        prober: Arc<dyn Prober>,
        registry: Option<Arc<dyn RegistryClient>>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            entries: DashMap::new(),
            health,
            prober,
            registry,
            shutdown,
        }
    }

    /// Balancer of `service`, built and started on first use.
    pub fn get(&self, service: &ServiceDetail) -> Arc<dyn LoadBalancer> {
        if let Some(entry) = self.entries.get(&service.name) {
            return entry.balancer.clone();
        }

        self.entries
            .entry(service.name.clone())
            .or_insert_with(|| {
                let source = self.build_source(service);
                let balancer = build(service.load_balance.round_type, source.clone());
                source.watch();
                tracing::debug!(
                    service = %service.name,
                    round_type = ?service.load_balance.round_type,
                    "Load balancer created"
                );
                BalancerEntry { balancer, source }
            })
            .balancer
            .clone()
    }

    /// Published pool of `service`, if its balancer exists.
    pub fn pool(&self, service: &str) -> Option<Vec<String>> {
        self.entries.get(service).map(|entry| entry.source.addresses())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn build_source(&self, service: &ServiceDetail) -> Arc<dyn PoolSource> {
        let lb = &service.load_balance;
        let subject = PoolSubject::new(
            service.name.clone(),
            service.backend_scheme(),
            lb.weighted_addresses(),
        );

        match (&lb.registry_path, &self.registry) {
            (Some(path), Some(client)) => Arc::new(RegistryWatchSource::new(
                subject,
                client.clone(),
                path.clone(),
                self.shutdown.clone(),
            )),
            (path, _) => {
                if let Some(path) = path {
                    tracing::warn!(
                        service = %service.name,
                        registry_path = %path,
                        "No registry client configured, falling back to health checks"
                    );
                }
                let settings = ProbeSettings::resolve(
                    &self.health,
                    lb.check_interval_secs,
                    lb.check_timeout_secs,
                );
                Arc::new(HealthCheckedSource::new(
                    subject,
                    self.prober.clone(),
                    settings,
                    self.shutdown.clone(),
                ))
            }
        }
    }
}
