//! Registry of flow counters.
//!
//! # Responsibilities
//! - Hand out one counter per accounting key, created on first use
//! - Start the periodic flush loop of each new counter
//!
//! # Design Decisions
//! - Counters are cached for the life of the process
//! - Creation goes through `DashMap::entry`, so concurrent first callers get
//!   the same counter and exactly one flush loop starts
//! - A panicking flush is caught and logged; it ends that counter's loop only

use chrono::{Offset, Utc};
use dashmap::DashMap;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};

use crate::config::FlowConfig;
use crate::flow::counter::{CounterSettings, FlowCounter};
use crate::flow::store::FlowStore;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

/// Lazily populated map of flow counters.
pub struct FlowCounterRegistry {
    counters: DashMap<String, Arc<FlowCounter>>,
    store: Arc<dyn FlowStore>,
    settings: CounterSettings,
    interval: Duration,
    shutdown: Shutdown,
}

impl FlowCounterRegistry {
    pub fn new(store: Arc<dyn FlowStore>, config: &FlowConfig, shutdown: Shutdown) -> Self {
        let offset = config.utc_offset().unwrap_or_else(|| {
            tracing::warn!(
                utc_offset_hours = config.utc_offset_hours,
                "Invalid UTC offset, using UTC"
            );
            Utc.fix()
        });

        Self {
            counters: DashMap::new(),
            store,
            settings: CounterSettings {
                bucket_ttl: config.bucket_ttl(),
                offset,
            },
            interval: config.tick_interval(),
            shutdown,
        }
    }

    /// Counter for `key`, created and started on first use.
    pub fn get(&self, key: &str) -> Arc<FlowCounter> {
        if let Some(counter) = self.counters.get(key) {
            return counter.clone();
        }

        self.counters
            .entry(key.to_string())
            .or_insert_with(|| {
                let counter = Arc::new(FlowCounter::new(key, self.store.clone(), self.settings));
                self.spawn_ticker(counter.clone());
                counter
            })
            .clone()
    }

    /// Counter for `key` if it has been created.
    pub fn peek(&self, key: &str) -> Option<Arc<FlowCounter>> {
        self.counters.get(key).map(|counter| counter.clone())
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    fn spawn_ticker(&self, counter: Arc<FlowCounter>) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(key = %counter.key(), "No runtime, flow counter will not flush");
                return;
            }
        };

        let interval = self.interval;
        let mut shutdown = self.shutdown.subscribe();
        if self.shutdown.is_triggered() {
            return;
        }

        tracing::debug!(key = %counter.key(), "Flow counter created");

        handle.spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let flush = AssertUnwindSafe(counter.flush(Utc::now())).catch_unwind().await;
                        match flush {
                            Ok(Ok(())) => metrics::record_flow_qps(counter.key(), counter.qps()),
                            Ok(Err(e)) => {
                                tracing::warn!(key = %counter.key(), error = %e, "Flow counter flush failed");
                            }
                            Err(_) => {
                                tracing::error!(key = %counter.key(), "Flow counter flush panicked, stopping");
                                break;
                            }
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!(key = %counter.key(), "Flow counter stopping");
                        break;
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::store::MemoryFlowStore;

    fn registry(tick_ms: u64) -> (FlowCounterRegistry, Arc<MemoryFlowStore>, Shutdown) {
        let store = Arc::new(MemoryFlowStore::new());
        let shutdown = Shutdown::new();
        let config = FlowConfig {
            tick_interval_ms: tick_ms,
            ..Default::default()
        };
        (
            FlowCounterRegistry::new(store.clone(), &config, shutdown.clone()),
            store,
            shutdown,
        )
    }

    #[tokio::test]
    async fn same_key_returns_same_counter() {
        let (registry, _, _) = registry(1_000);

        let a = registry.get("flow_total");
        let b = registry.get("flow_total");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_use_creates_one_counter() {
        let (registry, store, _) = registry(20);
        let registry = Arc::new(registry);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    let counter = registry.get("x");
                    counter.increase();
                    counter
                })
            })
            .collect();

        let mut counters = Vec::new();
        for handle in handles {
            counters.push(handle.await.unwrap());
        }
        assert!(counters.iter().all(|c| Arc::ptr_eq(c, &counters[0])));

        // A second flush loop would not change the total, but a lost counter would.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let counter = &counters[0];
        assert_eq!(counter.total_count(), 16);
        assert_eq!(store.get(&counter.day_key(Utc::now())).await.unwrap(), 16);
    }

    #[tokio::test]
    async fn loop_flushes_until_shutdown() {
        let (registry, _, shutdown) = registry(10);
        let counter = registry.get("flow_service_a");

        counter.increase();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(counter.total_count(), 1);

        shutdown.trigger();
        tokio::time::sleep(Duration::from_millis(30)).await;
        counter.increase();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(counter.pending(), 1);
    }

    #[test]
    fn out_of_range_offset_falls_back_to_utc() {
        let config = FlowConfig {
            utc_offset_hours: i32::MAX,
            ..Default::default()
        };
        let registry = FlowCounterRegistry::new(Arc::new(MemoryFlowStore::new()), &config, Shutdown::new());
        assert_eq!(registry.settings.offset, Utc.fix());

        let config = FlowConfig {
            utc_offset_hours: -5,
            ..Default::default()
        };
        let registry = FlowCounterRegistry::new(Arc::new(MemoryFlowStore::new()), &config, Shutdown::new());
        assert_eq!(registry.settings.offset.local_minus_utc(), -5 * 3600);
    }
}
