//! Per-namespace lock registry.

use crate::Namespace;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Hands out one async mutex per namespace.
///
/// Namespaces never share a lock, so work on different namespaces is
/// independent.
#[derive(Debug, Default)]
pub struct NamespaceLocks {
    locks: DashMap<Namespace, Arc<Mutex<()>>>,
}

impl NamespaceLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Wait for and take the lock of `namespace`.
    pub async fn lock(&self, namespace: &Namespace) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the DashMap shard is not held across the await.
        let lock = self
            .locks
            .entry(namespace.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        lock.lock_owned().await
    }

    /// True if the namespace lock is currently held.
    pub fn is_locked(&self, namespace: &Namespace) -> bool {
        self.locks
            .get(namespace)
            .is_some_and(|lock| lock.try_lock().is_err())
    }
}
