//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::load_balancer::pool::PoolSource;
use crate::load_balancer::{LoadBalanceError, LoadBalancer, Observer, SourceSlot};

/// Round-robin selector.
/// Stores an internal counter to rotate through backends in pool order.
pub struct RoundRobinBalance {
    addrs: ArcSwap<Vec<String>>,
    counter: AtomicUsize,
    source: SourceSlot,
}

impl RoundRobinBalance {
    pub fn new() -> Self {
        Self {
            addrs: ArcSwap::from_pointee(Vec::new()),
            counter: AtomicUsize::new(0),
            source: SourceSlot::default(),
        }
    }
}

impl Default for RoundRobinBalance {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer for RoundRobinBalance {
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
        // The counter survives pool changes; modulo keeps it in range.
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % addrs.len();
        Ok(addrs[index].clone())
    }

    fn set_conf(&self, source: Arc<dyn PoolSource>) {
        self.source.set(source);
    }

    fn addresses(&self) -> Vec<String> {
        Vec::clone(&self.addrs.load())
    }
}

impl Observer for RoundRobinBalance {
    fn update(&self) {
        if let Some(entries) = self.source.entries() {
            let addrs = entries.into_iter().map(|e| e.addr).collect();
            self.addrs.store(Arc::new(addrs));
        }
    }
}
