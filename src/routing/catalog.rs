//! Source of service and tenant records.
//!
//! The catalog is read once at startup. `StaticCatalog` serves the records
//! declared in the configuration file; other stores plug in by implementing
//! [`ServiceCatalog`].

use thiserror::Error;

use crate::config::{GatewayConfig, ServiceDetail, Tenant};

/// The catalog could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("catalog unavailable: {0}")]
pub struct CatalogError(pub String);

/// Read access to the configured services and tenants.
pub trait ServiceCatalog: Send + Sync {
    fn load_services(&self) -> Result<Vec<ServiceDetail>, CatalogError>;

    fn load_tenants(&self) -> Result<Vec<Tenant>, CatalogError>;
}

/// Catalog backed by records held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    services: Vec<ServiceDetail>,
    tenants: Vec<Tenant>,
}

impl StaticCatalog {
    pub fn new(services: Vec<ServiceDetail>, tenants: Vec<Tenant>) -> Self {
        Self { services, tenants }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.services.clone(), config.tenants.clone())
    }
}

impl ServiceCatalog for StaticCatalog {
    fn load_services(&self) -> Result<Vec<ServiceDetail>, CatalogError> {
        Ok(self.services.clone())
    }

    fn load_tenants(&self) -> Result<Vec<Tenant>, CatalogError> {
        Ok(self.tenants.clone())
    }
}
