//! In-process registry.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use futures_util::future::BoxFuture;
use tokio::sync::broadcast;

use crate::discovery::{RegistryClient, RegistryError};

/// Registry held in memory; every write broadcasts the changed path.
pub struct MemoryRegistry {
    nodes: RwLock<HashMap<String, Vec<String>>>,
    changes: broadcast::Sender<String>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            nodes: RwLock::new(HashMap::new()),
            changes,
        }
    }

    pub fn set_children(&self, path: &str, children: Vec<String>) {
        self.nodes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), children);
        let _ = self.changes.send(path.to_string());
    }

    pub fn remove(&self, path: &str) {
        self.nodes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
        let _ = self.changes.send(path.to_string());
    }

    fn snapshot(&self, path: &str) -> Result<Vec<String>, RegistryError> {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| RegistryError::NoNode(path.to_string()))
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryClient for MemoryRegistry {
    fn children<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<String>, RegistryError>> {
        Box::pin(async move { self.snapshot(path) })
    }

    fn watch_children<'a>(
        &'a self,
        path: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, RegistryError>> {
        let mut rx = self.changes.subscribe();
        Box::pin(async move {
            loop {
                match rx.recv().await {
                    Ok(changed) if changed == path => return self.snapshot(path),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => return self.snapshot(path),
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(RegistryError::Unavailable("registry closed".into()))
                    }
                }
            }
        })
    }
}
