//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Service matched → LoadBalancerRegistry::get(service)
//!     → pool source built once (health-checked or registry-watch)
//!     → algorithm chosen by round_type:
//!         - random.rs (uniform pick)
//!         - round_robin.rs (rotate through backends)
//!         - weighted.rs (smooth weighted round-robin)
//!         - consistent_hash.rs (crc32 ring keyed by request)
//!     → get(key) → backend address
//!
//! Pool change → source.notify_and_update(active)
//!     → every attached balancer's update()
//!     → balancer rebuilds its selection set from source.addresses()
//! ```
//!
//! # Design Decisions
//! - Balancers observe their source; the source never holds them strongly
//! - Selection sets are swapped whole, so readers never see a partial list
//! - One balancer and one transport per service, created on first use

pub mod backend;
pub mod consistent_hash;
pub mod pool;
pub mod random;
pub mod registry;
pub mod round_robin;
pub mod transport;
pub mod weighted;

use std::sync::{Arc, PoisonError, RwLock, Weak};

use thiserror::Error;

use crate::config::LbType;
use backend::{parse_entries, BackendEntry};
use pool::PoolSource;

pub use consistent_hash::ConsistentHashBalance;
pub use random::RandomBalance;
pub use registry::LoadBalancerRegistry;
pub use round_robin::RoundRobinBalance;
pub use transport::TransportRegistry;
pub use weighted::WeightRoundRobinBalance;

/// Errors from backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadBalanceError {
    #[error("no available backend")]
    Empty,

    #[error("invalid backend entry {0:?}")]
    InvalidEntry(String),
}

/// Receiver of pool change notifications.
pub trait Observer: Send + Sync {
    fn update(&self);
}

/// Backend selection strategy.
pub trait LoadBalancer: Observer {
    /// Add one backend to the selection set.
    fn add(&self, addr: &str, weight: u32) -> Result<(), LoadBalanceError>;

    /// Pick a backend. `key` is only consulted by hashing strategies.
    fn get(&self, key: &str) -> Result<String, LoadBalanceError>;

    /// Bind the balancer to the pool source it rebuilds from.
    fn set_conf(&self, source: Arc<dyn PoolSource>);

    /// Current selection set.
    fn addresses(&self) -> Vec<String>;
}

/// Pool source binding shared by every strategy.
#[derive(Default)]
pub(crate) struct SourceSlot {
    source: RwLock<Option<Arc<dyn PoolSource>>>,
}

impl SourceSlot {
    pub(crate) fn set(&self, source: Arc<dyn PoolSource>) {
        *self.source.write().unwrap_or_else(PoisonError::into_inner) = Some(source);
    }

    /// Parsed entries of the bound source, if one is bound.
    pub(crate) fn entries(&self) -> Option<Vec<BackendEntry>> {
        let source = self
            .source
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()?;
        Some(parse_entries(&source.addresses()))
    }
}

/// Build a balancer of `lb_type` bound to `source`.
pub fn build(lb_type: LbType, source: Arc<dyn PoolSource>) -> Arc<dyn LoadBalancer> {
    match lb_type {
        LbType::Random => attach(Arc::new(RandomBalance::new()), source),
        LbType::RoundRobin => attach(Arc::new(RoundRobinBalance::new()), source),
        LbType::WeightRoundRobin => attach(Arc::new(WeightRoundRobinBalance::new()), source),
        LbType::ConsistentHash => attach(Arc::new(ConsistentHashBalance::default()), source),
    }
}

fn attach<T: LoadBalancer + 'static>(lb: Arc<T>, source: Arc<dyn PoolSource>) -> Arc<dyn LoadBalancer> {
    lb.set_conf(Arc::clone(&source));
    let observer: Weak<dyn Observer> = Arc::downgrade(&lb) as Weak<dyn Observer>;
    source.attach(observer);
    lb.update();
    lb
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use pool::PoolSubject;

    /// Pool source with no background loop.
    pub struct StaticSource {
        pub subject: PoolSubject,
    }

    impl StaticSource {
        pub fn new(entries: &[(&str, u32)]) -> Arc<Self> {
            let configured = entries.iter().map(|(a, w)| (a.to_string(), *w)).collect();
            Arc::new(Self {
                subject: PoolSubject::new("test", "", configured),
            })
        }
    }

    impl PoolSource for StaticSource {
        fn addresses(&self) -> Vec<String> {
            self.subject.addresses()
        }

        fn attach(&self, observer: Weak<dyn Observer>) {
            self.subject.attach(observer);
        }

        fn notify_and_update(&self, active: Vec<String>) {
            self.subject.notify_and_update(active);
        }

        fn watch(&self) {}
    }
}
