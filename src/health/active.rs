//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every configured backend with a TCP connect
//! - Keep the pool's active list to the backends that pass
//! - Notify attached balancers only when the active set changes
//! - Survive a panicking round: it is logged and the next tick runs

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use tokio::net::TcpStream;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::health::state::FailureTracker;
use crate::lifecycle::Shutdown;
use crate::load_balancer::pool::{same_members, PoolSource, PoolSubject};
use crate::load_balancer::Observer;
use crate::observability::metrics;

/// Reachability check for one backend.
pub trait Prober: Send + Sync {
    fn probe<'a>(&'a self, addr: &'a str, timeout: Duration) -> BoxFuture<'a, bool>;
}

/// Probes by opening (and dropping) a TCP connection.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpProber;

impl Prober for TcpProber {
    fn probe<'a>(&'a self, addr: &'a str, timeout: Duration) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            match time::timeout(timeout, TcpStream::connect(probe_target(addr))).await {
                Ok(Ok(_)) => true,
                Ok(Err(e)) => {
                    tracing::debug!(addr = %addr, error = %e, "Health probe failed: connection error");
                    false
                }
                Err(_) => {
                    tracing::debug!(addr = %addr, "Health probe failed: timeout");
                    false
                }
            }
        })
    }
}

/// `host:port` part of a configured address.
pub fn probe_target(addr: &str) -> &str {
    addr.split('/').next().unwrap_or(addr)
}

/// Probe timing for one pool.
#[derive(Debug, Clone, Copy)]
pub struct ProbeSettings {
    pub interval: Duration,
    pub timeout: Duration,
    pub unhealthy_threshold: u32,
}

impl ProbeSettings {
    /// Gateway defaults, overridden by per-service values when set.
    pub fn resolve(
        defaults: &HealthCheckConfig,
        interval_secs: Option<u64>,
        timeout_secs: Option<u64>,
    ) -> Self {
        Self {
            interval: Duration::from_secs(interval_secs.unwrap_or(defaults.interval_secs).max(1)),
            timeout: Duration::from_secs(timeout_secs.unwrap_or(defaults.timeout_secs).max(1)),
            unhealthy_threshold: defaults.unhealthy_threshold,
        }
    }
}

/// Pool source whose active list is the configured backends that pass probes.
pub struct HealthCheckedSource {
    subject: Arc<PoolSubject>,
    prober: Arc<dyn Prober>,
    settings: ProbeSettings,
    shutdown: Shutdown,
    started: AtomicBool,
}

impl HealthCheckedSource {
    pub fn new(
        subject: PoolSubject,
        prober: Arc<dyn Prober>,
        settings: ProbeSettings,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            subject: Arc::new(subject),
            prober,
            settings,
            shutdown,
            started: AtomicBool::new(false),
        }
    }

    pub fn subject(&self) -> &PoolSubject {
        &self.subject
    }

    /// Run one probe round. Returns whether the active set changed.
    pub async fn check_once(&self, tracker: &mut FailureTracker) -> bool {
        check_pool(&self.subject, self.prober.as_ref(), &self.settings, tracker).await
    }
}

async fn check_pool(
    subject: &PoolSubject,
    prober: &dyn Prober,
    settings: &ProbeSettings,
    tracker: &mut FailureTracker,
) -> bool {
    let configured = subject.configured();
    let results = join_all(
        configured
            .iter()
            .map(|(addr, _)| prober.probe(addr, settings.timeout)),
    )
    .await;

    let mut active = Vec::with_capacity(configured.len());
    for ((addr, _), ok) in configured.iter().zip(results) {
        let keep = tracker.record(addr, ok);
        metrics::record_backend_health(subject.service(), addr, keep);
        if keep {
            active.push(addr.clone());
        } else {
            tracing::warn!(
                service = %subject.service(),
                addr = %addr,
                failures = tracker.failures(addr),
                "Backend marked unhealthy"
            );
        }
    }

    if same_members(&subject.active(), &active) {
        return false;
    }
    subject.notify_and_update(active);
    true
}

impl PoolSource for HealthCheckedSource {
    fn addresses(&self) -> Vec<String> {
        self.subject.addresses()
    }

    fn attach(&self, observer: Weak<dyn Observer>) {
        self.subject.attach(observer);
    }

    fn notify_and_update(&self, active: Vec<String>) {
        self.subject.notify_and_update(active);
    }

    fn watch(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(service = %self.subject.service(), "No runtime; health checks not started");
            return;
        };

        let subject = Arc::clone(&self.subject);
        let prober = Arc::clone(&self.prober);
        let settings = self.settings;
        let mut shutdown = self.shutdown.subscribe();

        handle.spawn(async move {
            tracing::info!(
                service = %subject.service(),
                interval_secs = settings.interval.as_secs(),
                "Health monitor starting"
            );
            let mut tracker = FailureTracker::new(settings.unhealthy_threshold);
            let mut ticker = time::interval(settings.interval);
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let round = check_pool(&subject, prober.as_ref(), &settings, &mut tracker);
                        if AssertUnwindSafe(round).catch_unwind().await.is_err() {
                            tracing::error!(service = %subject.service(), "Health check round panicked");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!(service = %subject.service(), "Health monitor stopping");
                        break;
                    }
                }
            }
        });
    }
}
