//! Backend health state machine.
//!
//! # State Transitions
//! ```text
//! Active → Removed: consecutive failures >= unhealthy_threshold
//! Removed → Active: any successful probe (failure count resets)
//! ```
//!
//! # Design Decisions
//! - Only failures need hysteresis; one good probe is enough to return
//! - Counters are keyed by configured address and live with the probe loop

use std::collections::HashMap;

/// Consecutive probe failures per address.
#[derive(Debug, Clone)]
pub struct FailureTracker {
    threshold: u32,
    failures: HashMap<String, u32>,
}

impl FailureTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            failures: HashMap::new(),
        }
    }

    /// Record one probe result and return whether `addr` stays active.
    pub fn record(&mut self, addr: &str, ok: bool) -> bool {
        if ok {
            self.failures.remove(addr);
            return true;
        }
        let count = self.failures.entry(addr.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count < self.threshold
    }

    pub fn failures(&self, addr: &str) -> u32 {
        self.failures.get(addr).copied().unwrap_or(0)
    }
}
