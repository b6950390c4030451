//! Consistent-hash ring.
//!
//! Every backend is placed on a crc32 ring at `replicas` virtual points,
//! keyed `"{i}{addr}"`. A request key maps to the first point clockwise from
//! its own hash. Adding a backend only moves keys onto the new backend;
//! removing one only moves the keys it owned.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::load_balancer::pool::PoolSource;
use crate::load_balancer::{LoadBalanceError, LoadBalancer, Observer, SourceSlot};

/// Hash function placing keys and virtual nodes on the ring.
pub type HashFn = fn(&[u8]) -> u32;

/// Virtual nodes per backend.
pub const DEFAULT_REPLICAS: usize = 10;

#[derive(Debug, Default, Clone)]
struct Ring {
    points: Vec<u32>,
    owners: HashMap<u32, String>,
}

impl Ring {
    fn insert(&mut self, addr: &str, replicas: usize, hash: HashFn) {
        for i in 0..replicas {
            let point = hash(format!("{}{}", i, addr).as_bytes());
            self.points.push(point);
            self.owners.insert(point, addr.to_string());
        }
        self.points.sort_unstable();
        self.points.dedup();
    }

    fn lookup(&self, key: &str, hash: HashFn) -> Option<&String> {
        if self.points.is_empty() {
            return None;
        }
        let h = hash(key.as_bytes());
        let index = self.points.partition_point(|&p| p < h);
        let point = self.points.get(index).unwrap_or(&self.points[0]);
        self.owners.get(point)
    }
}

/// Consistent-hash selector.
pub struct ConsistentHashBalance {
    replicas: usize,
    hash: HashFn,
    ring: ArcSwap<Ring>,
    source: SourceSlot,
}

impl ConsistentHashBalance {
    pub fn new(replicas: usize, hash: HashFn) -> Self {
        Self {
            replicas: replicas.max(1),
            hash,
            ring: ArcSwap::from_pointee(Ring::default()),
            source: SourceSlot::default(),
        }
    }

    fn rebuild<'a>(&self, addrs: impl IntoIterator<Item = &'a str>) -> Ring {
        let mut ring = Ring::default();
        for addr in addrs {
            ring.insert(addr, self.replicas, self.hash);
        }
        ring
    }
}

impl Default for ConsistentHashBalance {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS, crc32fast::hash)
    }
}

impl LoadBalancer for ConsistentHashBalance {
    fn add(&self, addr: &str, _weight: u32) -> Result<(), LoadBalanceError> {
        if addr.is_empty() {
            return Err(LoadBalanceError::InvalidEntry(addr.to_string()));
        }
        self.ring.rcu(|current| {
            let mut next = Ring::clone(current);
            next.insert(addr, self.replicas, self.hash);
            next
        });
        Ok(())
    }

    fn get(&self, key: &str) -> Result<String, LoadBalanceError> {
        self.ring
            .load()
            .lookup(key, self.hash)
            .cloned()
            .ok_or(LoadBalanceError::Empty)
    }

    fn set_conf(&self, source: Arc<dyn PoolSource>) {
        self.source.set(source);
    }

    fn addresses(&self) -> Vec<String> {
        let ring = self.ring.load();
        let mut addrs: Vec<String> = ring.owners.values().cloned().collect();
        addrs.sort();
        addrs.dedup();
        addrs
    }
}

impl Observer for ConsistentHashBalance {
    fn update(&self) {
        if let Some(entries) = self.source.entries() {
            let ring = self.rebuild(entries.iter().map(|e| e.addr.as_str()));
            self.ring.store(Arc::new(ring));
        }
    }
}
