//! Bounded cache of constructed contexts keyed by content hash.

use outreach_core::context::ConstructedContext;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

struct CacheEntry {
    value: Arc<ConstructedContext>,
    inserted: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Entries never go stale: a changed input yields a different hash.
/// When full, the oldest insertion is evicted.
pub struct ContextCache {
    capacity: usize,
    entries: RwLock<HashMap<String, CacheEntry>>,
    seq: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ContextCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(HashMap::new()),
            seq: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub async fn get(&self, hash: &str) -> Option<Arc<ConstructedContext>> {
        let found = self.entries.read().await.get(hash).map(|e| Arc::clone(&e.value));
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Look up without touching the hit/miss counters.
    pub async fn peek(&self, hash: &str) -> Option<Arc<ConstructedContext>> {
        self.entries.read().await.get(hash).map(|e| Arc::clone(&e.value))
    }

    pub async fn insert(&self, hash: String, value: Arc<ConstructedContext>) {
        let mut entries = self.entries.write().await;
        if !entries.contains_key(&hash) && entries.len() >= self.capacity {
            if let Some(victim) = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&victim);
            }
        }
        let inserted = self.seq.fetch_add(1, Ordering::Relaxed);
        entries.insert(hash, CacheEntry { value, inserted });
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.read().await.len(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
