//! Service lookup.
//!
//! # Responsibilities
//! - Load the service catalog exactly once
//! - Match HTTP requests to a service by path prefix or host
//! - List TCP and gRPC services for listener startup
//!
//! # Design Decisions
//! - Immutable after load; readers still take the read lock so requests that
//!   race the first load see either nothing or the full snapshot
//! - O(n) rule scan in catalog order (first match wins)
//! - Explicit NotFound rather than silent default

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use thiserror::Error;

use crate::config::{Protocol, ServiceDetail};
use crate::routing::catalog::{CatalogError, ServiceCatalog};
use crate::routing::matcher::{matcher_for, Matcher};

/// Error type for directory lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("no service matches host {host:?} path {path:?}")]
    NotMatched { host: String, path: String },

    #[error("unknown service {0:?}")]
    UnknownService(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[derive(Default)]
struct Snapshot {
    services: Vec<Arc<ServiceDetail>>,
    by_name: HashMap<String, Arc<ServiceDetail>>,
    http: Vec<(Box<dyn Matcher>, Arc<ServiceDetail>)>,
}

/// In-memory snapshot of every configured service.
pub struct ServiceDirectory {
    catalog: Arc<dyn ServiceCatalog>,
    loaded: OnceLock<Result<(), DirectoryError>>,
    snapshot: RwLock<Snapshot>,
}

impl ServiceDirectory {
    pub fn new(catalog: Arc<dyn ServiceCatalog>) -> Self {
        Self {
            catalog,
            loaded: OnceLock::new(),
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    /// Populate the snapshot from the catalog.
    ///
    /// Runs the load at most once. Concurrent callers block until the first
    /// one finishes and all of them get the same result, error included.
    pub fn load_once(&self) -> Result<(), DirectoryError> {
        self.loaded.get_or_init(|| self.populate()).clone()
    }

    fn populate(&self) -> Result<(), DirectoryError> {
        let services = self.catalog.load_services()?;

        let mut snapshot = Snapshot::default();
        for service in services {
            let service = Arc::new(service);
            if let Some(rule) = service.http_rule() {
                snapshot.http.push((matcher_for(rule), service.clone()));
            }
            snapshot.by_name.insert(service.name.clone(), service.clone());
            snapshot.services.push(service);
        }

        tracing::info!(
            services = snapshot.services.len(),
            http = snapshot.http.len(),
            "Service directory loaded"
        );

        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
        Ok(())
    }

    /// Find the HTTP service for a request.
    pub fn http_access_mode(
        &self,
        host: &str,
        path: &str,
    ) -> Result<Arc<ServiceDetail>, DirectoryError> {
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        snapshot
            .http
            .iter()
            .find(|(matcher, _)| matcher.matches(host, path))
            .map(|(_, service)| service.clone())
            .ok_or_else(|| DirectoryError::NotMatched {
                host: host.to_string(),
                path: path.to_string(),
            })
    }

    pub fn get(&self, name: &str) -> Result<Arc<ServiceDetail>, DirectoryError> {
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        snapshot
            .by_name
            .get(name)
            .cloned()
            .ok_or_else(|| DirectoryError::UnknownService(name.to_string()))
    }

    /// All services in catalog order.
    pub fn services(&self) -> Vec<Arc<ServiceDetail>> {
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        snapshot.services.clone()
    }

    pub fn tcp_services(&self) -> Vec<Arc<ServiceDetail>> {
        self.by_protocol(Protocol::Tcp)
    }

    pub fn grpc_services(&self) -> Vec<Arc<ServiceDetail>> {
        self.by_protocol(Protocol::Grpc)
    }

    fn by_protocol(&self, protocol: Protocol) -> Vec<Arc<ServiceDetail>> {
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        snapshot
            .services
            .iter()
            .filter(|service| service.protocol() == protocol)
            .cloned()
            .collect()
    }
}
