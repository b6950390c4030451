//! Tenant lookup by id.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::config::Tenant;
use crate::routing::catalog::{CatalogError, ServiceCatalog};

/// In-memory directory of tenants keyed by app id.
pub struct TenantDirectory {
    catalog: Arc<dyn ServiceCatalog>,
    loaded: OnceLock<Result<(), CatalogError>>,
    tenants: RwLock<HashMap<String, Arc<Tenant>>>,
}

impl TenantDirectory {
    pub fn new(catalog: Arc<dyn ServiceCatalog>) -> Self {
        Self {
            catalog,
            loaded: OnceLock::new(),
            tenants: RwLock::new(HashMap::new()),
        }
    }

    /// Populate the directory once; later calls return the first outcome.
    pub fn load_once(&self) -> Result<(), CatalogError> {
        self.loaded
            .get_or_init(|| {
                let tenants = self.catalog.load_tenants()?;
                let map: HashMap<_, _> = tenants
                    .into_iter()
                    .map(|tenant| (tenant.app_id.clone(), Arc::new(tenant)))
                    .collect();
                tracing::info!(tenants = map.len(), "Tenant directory loaded");
                *self.tenants.write().unwrap_or_else(PoisonError::into_inner) = map;
                Ok(())
            })
            .clone()
    }

    pub fn get(&self, app_id: &str) -> Option<Arc<Tenant>> {
        self.tenants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(app_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.tenants.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::catalog::StaticCatalog;

    #[test]
    fn looks_up_tenants_by_id() {
        let catalog = StaticCatalog::new(
            Vec::new(),
            vec![Tenant {
                app_id: "app_a".into(),
                qps: 3,
                ..Default::default()
            }],
        );
        let tenants = TenantDirectory::new(Arc::new(catalog));
        assert!(tenants.get("app_a").is_none());

        tenants.load_once().unwrap();
        assert_eq!(tenants.get("app_a").unwrap().qps, 3);
        assert!(tenants.get("app_b").is_none());
        assert_eq!(tenants.len(), 1);
    }
}
