//! Per-key async locks
//!
//! Locks are created on first use and never removed, so the registry grows
//! with the number of distinct keys ever locked. Each entry is a small
//! `Arc<Mutex<()>>`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[derive(Default)]
pub struct KeyedLocks {
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        {
            let locks = self.locks.read().await;
            if let Some(lock) = locks.get(key) {
                return lock.clone();
            }
        }

        let mut locks = self.locks.write().await;
        locks.entry(key.to_string()).or_default().clone()
    }

    /// Run `critical` while holding the lock for `key`.
    ///
    /// The guard is dropped on every exit, including when `critical` returns
    /// an error, panics, or the returned future is dropped mid-flight.
    pub async fn with_lock<F, T>(&self, key: &str, critical: F) -> T
    where
        F: Future<Output = T>,
    {
        let lock = self.lock_for(key).await;
        let _guard = lock.lock().await;
        critical.await
    }

    /// Snapshot of every key that has ever been locked
    pub async fn keys(&self) -> Vec<String> {
        self.locks.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.locks.read().await.len()
    }
}
