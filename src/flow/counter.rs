//! Per-key request counter.
//!
//! # Responsibilities
//! - Count requests locally with a single atomic
//! - Flush local ticks into the day and hour buckets of the store
//! - Read back the aggregated day total and derive QPS from it
//!
//! # Design Decisions
//! - `increase` is one relaxed atomic add and can never fail a request
//! - The store total is authoritative: every gateway instance flushes into the
//!   same buckets, so QPS is computed from the read-back value, not local ticks
//! - A failed flush puts its ticks back so they are retried on the next tick

use chrono::{DateTime, FixedOffset, Offset, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::flow::store::{FlowStore, FlowStoreError};

const DAY_PREFIX: &str = "flow_day_count";
const HOUR_PREFIX: &str = "flow_hour_count";

/// Settings shared by every counter of a registry.
#[derive(Debug, Clone, Copy)]
pub struct CounterSettings {
    /// Expiry applied to the day and hour buckets.
    pub bucket_ttl: Duration,
    /// Time zone used to name buckets.
    pub offset: FixedOffset,
}

impl Default for CounterSettings {
    fn default() -> Self {
        Self {
            bucket_ttl: Duration::from_secs(2 * 24 * 3600),
            offset: Utc.fix(),
        }
    }
}

/// Request counter for one accounting key.
pub struct FlowCounter {
    key: String,
    ticks: AtomicI64,
    total: AtomicI64,
    qps: AtomicI64,
    last_unix: AtomicI64,
    store: Arc<dyn FlowStore>,
    settings: CounterSettings,
}

impl FlowCounter {
    pub fn new(key: impl Into<String>, store: Arc<dyn FlowStore>, settings: CounterSettings) -> Self {
        Self {
            key: key.into(),
            ticks: AtomicI64::new(0),
            total: AtomicI64::new(0),
            qps: AtomicI64::new(0),
            last_unix: AtomicI64::new(0),
            store,
            settings,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Count one request.
    pub fn increase(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Requests per second computed at the last flush.
    pub fn qps(&self) -> i64 {
        self.qps.load(Ordering::Relaxed)
    }

    /// Today's aggregated total as of the last flush.
    pub fn total_count(&self) -> i64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Ticks counted since the last flush.
    pub fn pending(&self) -> i64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn day_key(&self, at: DateTime<Utc>) -> String {
        let local = at.with_timezone(&self.settings.offset);
        format!("{}_{}_{}", DAY_PREFIX, local.format("%Y%m%d"), self.key)
    }

    pub fn hour_key(&self, at: DateTime<Utc>) -> String {
        let local = at.with_timezone(&self.settings.offset);
        format!("{}_{}_{}", HOUR_PREFIX, local.format("%Y%m%d%H"), self.key)
    }

    /// Flush local ticks and refresh the total and QPS.
    pub async fn flush(&self, now: DateTime<Utc>) -> Result<(), FlowStoreError> {
        let delta = self.ticks.swap(0, Ordering::AcqRel);
        let day_key = self.day_key(now);

        if delta > 0 {
            let keys = [day_key.clone(), self.hour_key(now)];
            if let Err(e) = self
                .store
                .incr_by(&keys, delta, self.settings.bucket_ttl)
                .await
            {
                self.ticks.fetch_add(delta, Ordering::AcqRel);
                return Err(e);
            }
        }

        let total = self.store.get(&day_key).await?;
        let unix = now.timestamp();
        let prev_unix = self.last_unix.swap(unix, Ordering::AcqRel);
        let prev_total = self.total.swap(total, Ordering::AcqRel);

        if let Some(qps) = compute_qps(prev_total, total, prev_unix, unix) {
            self.qps.store(qps, Ordering::Relaxed);
        }

        tracing::trace!(
            key = %self.key,
            delta,
            total,
            qps = self.qps(),
            "Flow counter flushed"
        );
        Ok(())
    }

    /// Stored total for the day containing `at`.
    pub async fn day_data(&self, at: DateTime<Utc>) -> Result<i64, FlowStoreError> {
        self.store.get(&self.day_key(at)).await
    }

    /// Stored total for the hour containing `at`.
    pub async fn hour_data(&self, at: DateTime<Utc>) -> Result<i64, FlowStoreError> {
        self.store.get(&self.hour_key(at)).await
    }
}

/// QPS between two samples of the day total.
///
/// The first sample yields zero. Returns `None` when no time has passed.
/// A total lower than before (new day bucket) yields zero.
pub fn compute_qps(prev_total: i64, total: i64, prev_unix: i64, unix: i64) -> Option<i64> {
    if prev_unix == 0 {
        return Some(0);
    }
    if unix <= prev_unix {
        return None;
    }
    Some((total - prev_total).max(0) / (unix - prev_unix))
}
