//! Token-bucket flow limiters.
//!
//! One limiter per key (service, service + client IP, tenant), created on
//! first use and kept for the life of the process. A limiter for `qps`
//! holds at most `3 × qps` tokens and refills `qps` tokens per second.

use dashmap::DashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Burst capacity as a multiple of the per-second rate.
pub const BURST_MULTIPLIER: f64 = 3.0;

/// A simple token bucket rate limiter.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    rate: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(rate: f64, now: Instant) -> Self {
        Self {
            tokens: rate * BURST_MULTIPLIER,
            rate,
            last_update: now,
        }
    }

    fn capacity(&self) -> f64 {
        self.rate * BURST_MULTIPLIER
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity());
        self.last_update = now;
    }

    fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn set_rate(&mut self, rate: f64, now: Instant) {
        self.refill(now);
        self.rate = rate;
        self.tokens = self.tokens.min(self.capacity());
    }
}

/// Limiter for one key.
#[derive(Debug)]
pub struct FlowLimiter {
    bucket: Mutex<TokenBucket>,
}

impl FlowLimiter {
    pub fn new(qps: u32) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(qps as f64, Instant::now())),
        }
    }

    /// Take a token if one is available. Never waits.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    fn allow_at(&self, now: Instant) -> bool {
        self.bucket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_acquire(now)
    }

    /// Current per-second rate.
    pub fn rate(&self) -> u32 {
        self.bucket.lock().unwrap_or_else(PoisonError::into_inner).rate as u32
    }

    /// Change the rate in place, keeping accumulated tokens up to the new burst.
    pub fn set_rate(&self, qps: u32) {
        self.bucket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_rate(qps as f64, Instant::now());
    }
}

/// Lazily populated map of flow limiters.
#[derive(Debug, Default)]
pub struct FlowLimiterRegistry {
    limiters: DashMap<String, Arc<FlowLimiter>>,
}

impl FlowLimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limiter for `key`, created on first use.
    ///
    /// Asking again with a different `qps` updates the existing limiter's rate.
    pub fn get(&self, key: &str, qps: u32) -> Arc<FlowLimiter> {
        let limiter = match self.limiters.get(key) {
            Some(limiter) => limiter.clone(),
            None => self
                .limiters
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(FlowLimiter::new(qps)))
                .clone(),
        };

        if limiter.rate() != qps {
            tracing::info!(key = %key, from = limiter.rate(), to = qps, "Flow limit changed");
            limiter.set_rate(qps);
        }
        limiter
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}
