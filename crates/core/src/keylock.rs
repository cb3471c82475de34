//! Per-key async mutual exclusion.
//!
//! Used to serialize read-validate-write cycles on one record and to
//! collapse concurrent computations of the same cache key into one.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Idle entries are pruned once the table grows past this size.
const PRUNE_THRESHOLD: usize = 1024;

pub struct KeyLocks {
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inflight = self.inflight.lock().await;
            if inflight.len() >= PRUNE_THRESHOLD {
                // Only the table holds an idle entry.
                inflight.retain(|_, l| Arc::strong_count(l) > 1);
            }
            Arc::clone(
                inflight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    /// Number of keys currently tracked (held or idle).
    pub async fn len(&self) -> usize {
        self.inflight.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for KeyLocks {
    fn default() -> Self {
        Self::new()
    }
}
