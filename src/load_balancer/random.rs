//! Uniform random selection.

use std::sync::Arc;

use arc_swap::ArcSwap;
use rand::Rng;

use crate::load_balancer::pool::PoolSource;
use crate::load_balancer::{LoadBalanceError, LoadBalancer, Observer, SourceSlot};

/// Picks any backend with equal probability; weights are ignored.
pub struct RandomBalance {
    addrs: ArcSwap<Vec<String>>,
    source: SourceSlot,
}

impl RandomBalance {
    pub fn new() -> Self {
        Self {
            addrs: ArcSwap::from_pointee(Vec::new()),
            source: SourceSlot::default(),
        }
    }
}

impl Default for RandomBalance {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer for RandomBalance {
    fn add(&self, addr: &str, _weight: u32) -> Result<(), LoadBalanceError> {
        if addr.is_empty() {
            return Err(LoadBalanceError::InvalidEntry(addr.to_string()));
        }
        self.addrs.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(addr.to_string());
            next
        });
        Ok(())
    }

    fn get(&self, _key: &str) -> Result<String, LoadBalanceError> {
        let addrs = self.addrs.load();
        if addrs.is_empty() {
            return Err(LoadBalanceError::Empty);
        }
        let index = rand::thread_rng().gen_range(0..addrs.len());
        Ok(addrs[index].clone())
    }

    fn set_conf(&self, source: Arc<dyn PoolSource>) {
        self.source.set(source);
    }

    fn addresses(&self) -> Vec<String> {
        Vec::clone(&self.addrs.load())
    }
}

impl Observer for RandomBalance {
    fn update(&self) {
        if let Some(entries) = self.source.entries() {
            let addrs = entries.into_iter().map(|e| e.addr).collect();
            self.addrs.store(Arc::new(addrs));
        }
    }
}
