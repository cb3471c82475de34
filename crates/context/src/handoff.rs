//! Finalized scripts held for the call-placement side to pick up.

use outreach_core::context::ConstructedContext;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

struct Handoff {
    context: Arc<ConstructedContext>,
    expires_at: Instant,
}

/// Latest constructed context per record key, kept for a fixed time.
pub struct HandoffStore {
    ttl: Duration,
    entries: RwLock<HashMap<String, Handoff>>,
}

impl HandoffStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Replaces any earlier hand-off for the same record.
    pub async fn put(&self, context: Arc<ConstructedContext>) {
        let key = context.record_key.clone();
        let entry = Handoff {
            context,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.write().await.insert(key, entry);
    }

    pub async fn get(&self, record_key: &str) -> Option<Arc<ConstructedContext>> {
        let entries = self.entries.read().await;
        entries
            .get(record_key)
            .filter(|h| h.expires_at > Instant::now())
            .map(|h| Arc::clone(&h.context))
    }

    pub async fn remove(&self, record_key: &str) -> bool {
        self.entries.write().await.remove(record_key).is_some()
    }

    /// Drop expired entries. Returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, h| h.expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Expired hand-offs removed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
