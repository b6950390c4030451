//! Smooth weighted round-robin.
//!
//! Each pick adds every node's effective weight to its running weight, takes
//! the node with the highest running weight, and subtracts the total from
//! the winner. Over any window of `sum(weights)` picks each node is chosen
//! in proportion to its weight, and heavy nodes are interleaved rather than
//! picked in bursts.

use std::sync::{Arc, Mutex, PoisonError};

use crate::load_balancer::pool::PoolSource;
use crate::load_balancer::{LoadBalanceError, LoadBalancer, Observer, SourceSlot};

#[derive(Debug, Clone)]
struct WeightNode {
    addr: String,
    weight: i64,
    current_weight: i64,
    effective_weight: i64,
}

impl WeightNode {
    fn new(addr: &str, weight: u32) -> Self {
        let weight = i64::from(weight);
        Self {
            addr: addr.to_string(),
            weight,
            current_weight: 0,
            effective_weight: weight,
        }
    }
}

/// Weighted round-robin selector. Running weights are mutated on every pick,
/// so the node list lives behind a mutex.
pub struct WeightRoundRobinBalance {
    nodes: Mutex<Vec<WeightNode>>,
    source: SourceSlot,
}

impl WeightRoundRobinBalance {
    pub fn new() -> Self {
        Self {
            nodes: Mutex::new(Vec::new()),
            source: SourceSlot::default(),
        }
    }
}

impl Default for WeightRoundRobinBalance {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer for WeightRoundRobinBalance {
    fn add(&self, addr: &str, weight: u32) -> Result<(), LoadBalanceError> {
        if addr.is_empty() || weight == 0 {
            return Err(LoadBalanceError::InvalidEntry(format!("{},{}", addr, weight)));
        }
        self.nodes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(WeightNode::new(addr, weight));
        Ok(())
    }

    fn get(&self, _key: &str) -> Result<String, LoadBalanceError> {
        let mut nodes = self.nodes.lock().unwrap_or_else(PoisonError::into_inner);

        let mut total = 0;
        let mut best: Option<(usize, i64)> = None;
        for (i, node) in nodes.iter_mut().enumerate() {
            total += node.effective_weight;
            node.current_weight += node.effective_weight;
            if node.effective_weight < node.weight {
                node.effective_weight += 1;
            }
            // Ties go to the earliest node.
            if best.map_or(true, |(_, cw)| node.current_weight > cw) {
                best = Some((i, node.current_weight));
            }
        }

        let (index, _) = best.ok_or(LoadBalanceError::Empty)?;
        let node = &mut nodes[index];
        node.current_weight -= total;
        Ok(node.addr.clone())
    }

    fn set_conf(&self, source: Arc<dyn PoolSource>) {
        self.source.set(source);
    }

    fn addresses(&self) -> Vec<String> {
        self.nodes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|n| n.addr.clone())
            .collect()
    }
}

impl Observer for WeightRoundRobinBalance {
    fn update(&self) {
        if let Some(entries) = self.source.entries() {
            let nodes = entries
                .iter()
                .filter(|e| e.weight > 0)
                .map(|e| WeightNode::new(&e.addr, e.weight))
                .collect();
            *self.nodes.lock().unwrap_or_else(PoisonError::into_inner) = nodes;
        }
    }
}
