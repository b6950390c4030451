//! Registry-driven backend discovery.
//!
//! # Data Flow
//! ```text
//! RegistryWatchSource::watch()
//!     → children(path)            initial snapshot
//!     → loop:
//!         watch_children(path)    resolves on the next change
//!         → notify_and_update(children)
//!         → on error: warn, wait, retry
//! ```
//!
//! # Design Decisions
//! - The registry is a trait; `MemoryRegistry` backs tests and static setups
//! - Until the first snapshot arrives the configured addresses stay active
//! - Registry errors never clear the active list

pub mod memory;

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::lifecycle::Shutdown;
use crate::load_balancer::pool::{PoolSource, PoolSubject};
use crate::load_balancer::Observer;

pub use memory::MemoryRegistry;

/// Delay before retrying after a registry error.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("registry path not found: {0}")]
    NoNode(String),

    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// Hierarchical service registry (children of a path are backend addresses).
pub trait RegistryClient: Send + Sync {
    /// Current children of `path`.
    fn children<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<String>, RegistryError>>;

    /// Wait for the next change under `path` and return the new children.
    fn watch_children<'a>(
        &'a self,
        path: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, RegistryError>>;
}

/// Pool source whose active list mirrors a registry path.
pub struct RegistryWatchSource {
    subject: Arc<PoolSubject>,
    client: Arc<dyn RegistryClient>,
    path: String,
    shutdown: Shutdown,
    started: AtomicBool,
}

impl RegistryWatchSource {
    pub fn new(
        subject: PoolSubject,
        client: Arc<dyn RegistryClient>,
        path: impl Into<String>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            subject: Arc::new(subject),
            client,
            path: path.into(),
            shutdown,
            started: AtomicBool::new(false),
        }
    }
}

impl PoolSource for RegistryWatchSource {
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
            tracing::warn!(path = %self.path, "No runtime; registry watch not started");
            return;
        };

        let subject = Arc::clone(&self.subject);
        let client = Arc::clone(&self.client);
        let path = self.path.clone();
        let mut shutdown = self.shutdown.subscribe();

        handle.spawn(async move {
            match client.children(&path).await {
                Ok(children) => apply(&subject, &path, children),
                Err(e) => tracing::warn!(path = %path, error = %e, "Registry snapshot failed"),
            }

            loop {
                tokio::select! {
                    result = client.watch_children(&path) => match result {
                        Ok(children) => apply(&subject, &path, children),
                        Err(e) => {
                            tracing::warn!(path = %path, error = %e, "Registry watch failed, retrying");
                            tokio::time::sleep(RETRY_DELAY).await;
                        }
                    },
                    _ = shutdown.recv() => {
                        tracing::debug!(path = %path, "Registry watch stopping");
                        break;
                    }
                }
            }
        });
    }
}

/// Publish a registry snapshot; a panicking observer does not end the watch.
fn apply(subject: &PoolSubject, path: &str, children: Vec<String>) {
    let update = std::panic::catch_unwind(AssertUnwindSafe(|| subject.notify_and_update(children)));
    if update.is_err() {
        tracing::error!(path = %path, "Registry update panicked");
    }
}
