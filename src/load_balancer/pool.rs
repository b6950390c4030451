//! Backend pool sources.
//!
//! # Responsibilities
//! - Hold the active backend list of one service
//! - Publish it as `addr,weight` entries
//! - Notify attached load balancers when it changes
//!
//! # Design Decisions
//! - Observers are held weakly; a dropped balancer is pruned on next notify
//! - Notification is synchronous and in attachment order
//! - No lock is held while observers run, so `update` may read the pool back

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock, Weak};

use crate::config::service::DEFAULT_WEIGHT;
use crate::load_balancer::Observer;

/// Producer of a live backend list.
pub trait PoolSource: Send + Sync {
    /// Active backends as `addr,weight` strings.
    fn addresses(&self) -> Vec<String>;

    /// Register an observer to be updated on every change.
    fn attach(&self, observer: Weak<dyn Observer>);

    /// Replace the active list and update every observer.
    fn notify_and_update(&self, active: Vec<String>);

    /// Start the background loop that keeps the active list current.
    fn watch(&self);
}

/// Shared state of a pool source: configured weights, active list, observers.
pub struct PoolSubject {
    service: String,
    scheme: String,
    configured: Vec<(String, u32)>,
    weights: HashMap<String, u32>,
    active: RwLock<Vec<String>>,
    observers: Mutex<Vec<Weak<dyn Observer>>>,
}

impl PoolSubject {
    /// Create a subject whose active list starts as every configured address.
    pub fn new(service: impl Into<String>, scheme: impl Into<String>, configured: Vec<(String, u32)>) -> Self {
        let weights = configured.iter().cloned().collect();
        let active = configured.iter().map(|(addr, _)| addr.clone()).collect();
        Self {
            service: service.into(),
            scheme: scheme.into(),
            configured,
            weights,
            active: RwLock::new(active),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Configured `(address, weight)` pairs in configuration order.
    pub fn configured(&self) -> &[(String, u32)] {
        &self.configured
    }

    /// Active addresses without scheme or weight.
    pub fn active(&self) -> Vec<String> {
        self.active.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|addr| {
                let weight = self.weights.get(addr).copied().unwrap_or(DEFAULT_WEIGHT);
                format!("{}{},{}", self.scheme, addr, weight)
            })
            .collect()
    }

    pub fn attach(&self, observer: Weak<dyn Observer>) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    pub fn notify_and_update(&self, active: Vec<String>) {
        tracing::info!(service = %self.service, active = ?active, "Backend pool changed");
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = active;

        let observers: Vec<_> = {
            let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
            observers.retain(|o| o.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in observers {
            observer.update();
        }
    }

    /// Observers still alive.
    pub fn observer_count(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|o| o.strong_count() > 0)
            .count()
    }
}

/// Whether two address lists hold the same set, ignoring order.
pub fn same_members(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort();
    b.sort();
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorder {
        updates: AtomicUsize,
    }

    impl Observer for Recorder {
        fn update(&self) {
            self.updates.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn subject() -> PoolSubject {
        PoolSubject::new(
            "svc",
            "http://",
            vec![("10.0.0.1:80".into(), 1), ("10.0.0.2:80".into(), 4)],
        )
    }

    #[test]
    fn publishes_scheme_and_weights() {
        let subject = subject();
        assert_eq!(
            subject.addresses(),
            vec!["http://10.0.0.1:80,1", "http://10.0.0.2:80,4"]
        );
    }

    #[test]
    fn notify_updates_every_observer_once() {
        let subject = subject();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        subject.attach(Arc::downgrade(&a) as Weak<dyn Observer>);
        subject.attach(Arc::downgrade(&b) as Weak<dyn Observer>);

        subject.notify_and_update(vec!["10.0.0.2:80".into(), "10.0.0.9:80".into()]);

        assert_eq!(a.updates.load(Ordering::SeqCst), 1);
        assert_eq!(b.updates.load(Ordering::SeqCst), 1);
        assert_eq!(
            subject.addresses(),
            vec!["http://10.0.0.2:80,4".to_string(), format!("http://10.0.0.9:80,{}", DEFAULT_WEIGHT)]
        );
    }

    #[test]
    fn dropped_observers_are_pruned() {
        let subject = subject();
        let kept = Arc::new(Recorder::default());
        {
            let dropped = Arc::new(Recorder::default());
            subject.attach(Arc::downgrade(&dropped) as Weak<dyn Observer>);
        }
        subject.attach(Arc::downgrade(&kept) as Weak<dyn Observer>);

        subject.notify_and_update(Vec::new());
        assert_eq!(subject.observer_count(), 1);
        assert_eq!(kept.updates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn set_comparison_ignores_order() {
        let a = vec!["x".to_string(), "y".to_string()];
        let b = vec!["y".to_string(), "x".to_string()];
        let c = vec!["x".to_string()];
        assert!(same_members(&a, &b));
        assert!(!same_members(&a, &c));
    }
}
