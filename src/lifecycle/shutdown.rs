//! Shutdown coordination for the gateway.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
/// Clones share the same channel, so registries can hold a handle and
/// subscribe the background loops they create later.
#[derive(Clone)]
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
    /// Set once `trigger` has been called.
    triggered: Arc<AtomicBool>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        let _ = self.tx.send(());
    }

    /// Whether shutdown has been triggered.
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown is triggered, including when it already was.
    pub async fn wait(&self) {
        let mut rx = self.subscribe();
        if self.is_triggered() {
            return;
        }
        let _ = rx.recv().await;
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Wait for a spawned server, giving it `drain` to finish once shutdown fires.
///
/// A server that outlives the drain window is aborted.
pub async fn drain_task(
    name: &str,
    mut task: JoinHandle<io::Result<()>>,
    shutdown: &Shutdown,
    drain: Duration,
) -> io::Result<()> {
    tokio::select! {
        result = &mut task => return flatten(result),
        _ = shutdown.wait() => {}
    }

    match tokio::time::timeout(drain, &mut task).await {
        Ok(result) => flatten(result),
        Err(_) => {
            tracing::warn!(server = %name, drain_secs = drain.as_secs(), "Drain timeout, aborting server");
            task.abort();
            Ok(())
        }
    }
}

fn flatten(result: Result<io::Result<()>, tokio::task::JoinError>) -> io::Result<()> {
    result.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn subscribers_observe_trigger() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        let clone = shutdown.clone();

        clone.trigger();
        assert!(rx.recv().await.is_ok());
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn wait_returns_after_late_subscription() {
        let shutdown = Shutdown::new();
        shutdown.trigger();

        tokio::time::timeout(Duration::from_millis(100), shutdown.wait())
            .await
            .expect("wait should resolve for an already-triggered shutdown");
    }

    #[tokio::test]
    async fn drain_task_aborts_stuck_server() {
        let shutdown = Shutdown::new();
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });
        shutdown.trigger();

        let started = std::time::Instant::now();
        drain_task("stuck", task, &shutdown, Duration::from_millis(100))
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn drain_task_surfaces_server_error() {
        let shutdown = Shutdown::new();
        let task = tokio::spawn(async { Err(io::Error::new(io::ErrorKind::AddrInUse, "busy")) });

        let err = drain_task("failing", task, &shutdown, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AddrInUse);
    }
}
