//! Counter store used for day/hour traffic buckets.
//!
//! # Responsibilities
//! - Atomically add a delta to a batch of keys and refresh their expiry
//! - Read a key's current value
//!
//! # Design Decisions
//! - Object-safe trait with boxed futures so stores can be swapped at runtime
//! - The in-process store expires lazily on access; nothing sweeps it

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Error type for store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowStoreError {
    #[error("flow store unavailable: {0}")]
    Unavailable(String),
}

/// Key-value store with increment-by, expiry and get.
///
/// Every gateway instance sharing one store increments the same keys, so the
/// value read back is the aggregate across instances.
pub trait FlowStore: Send + Sync {
    /// Add `delta` to every key and reset each key's expiry to `ttl`.
    fn incr_by<'a>(
        &'a self,
        keys: &'a [String],
        delta: i64,
        ttl: Duration,
    ) -> BoxFuture<'a, Result<(), FlowStoreError>>;

    /// Current value of `key`; missing or expired keys read as zero.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<i64, FlowStoreError>>;
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: i64,
    expires_at: Instant,
}

/// Store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryFlowStore {
    entries: DashMap<String, Entry>,
}

impl MemoryFlowStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn incr_now(&self, keys: &[String], delta: i64, ttl: Duration, now: Instant) {
        for key in keys {
            let mut entry = self.entries.entry(key.clone()).or_insert(Entry {
                value: 0,
                expires_at: now + ttl,
            });
            if entry.expires_at <= now {
                entry.value = 0;
            }
            entry.value += delta;
            entry.expires_at = now + ttl;
        }
    }

    fn get_now(&self, key: &str, now: Instant) -> i64 {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return entry.value,
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        }
        0
    }
}

impl FlowStore for MemoryFlowStore {
    fn incr_by<'a>(
        &'a self,
        keys: &'a [String],
        delta: i64,
        ttl: Duration,
    ) -> BoxFuture<'a, Result<(), FlowStoreError>> {
        Box::pin(async move {
            self.incr_now(keys, delta, ttl, Instant::now());
            Ok(())
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<i64, FlowStoreError>> {
        Box::pin(async move { Ok(self.get_now(key, Instant::now())) })
    }
}
