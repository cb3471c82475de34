//! In-memory record store.

use async_trait::async_trait;
use chrono::Utc;
use outreach_core::error::Result;
use outreach_core::record::{Attributes, Record, RecordFilter, RecordStatus, UpsertOutcome};
use outreach_core::store::RecordStore;
use outreach_core::value::raw_scalar_text;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Records held in a map keyed by record key.
pub struct InMemoryRecordStore {
    records: Arc<RwLock<HashMap<String, Record>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_search(record: &Record, needle: &str) -> bool {
    if record.key.to_lowercase().contains(needle) {
        return true;
    }
    record.attributes.values().any(|v| {
        raw_scalar_text(&v.to_raw()).is_some_and(|text| text.to_lowercase().contains(needle))
    })
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Record>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn upsert(&self, key: &str, attributes: Attributes, priority: Option<i32>) -> Result<UpsertOutcome> {
        let mut records = self.records.write().await;
        let now = Utc::now();
        let created = !records.contains_key(key);
        let record = records
            .entry(key.to_string())
            .or_insert_with(|| Record::new(key));

        record.attributes.extend(attributes);
        if let Some(p) = priority {
            record.priority = p;
        }
        record.updated_at = now;

        debug!(record_key = key, created, "Record upserted");
        Ok(UpsertOutcome {
            created,
            record: record.clone(),
        })
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<Record>> {
        let records = self.records.read().await;
        let needle = filter
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut results: Vec<Record> = records
            .values()
            .filter(|r| filter.status.is_none_or(|s| r.status == s))
            .filter(|r| filter.needs_revalidation.is_none_or(|f| r.needs_revalidation == f))
            .filter(|r| {
                filter
                    .has_attribute
                    .as_deref()
                    .is_none_or(|name| r.attributes.contains_key(name))
            })
            .filter(|r| needle.as_deref().is_none_or(|n| matches_search(r, n)))
            .cloned()
            .collect();

        results.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.key.cmp(&b.key)));
        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    async fn set_status(&self, key: &str, status: RecordStatus) -> Result<Option<Record>> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(key) else {
            return Ok(None);
        };
        let now = Utc::now();
        if status == RecordStatus::InProgress && record.status != RecordStatus::InProgress {
            record.call_count += 1;
            record.last_call_attempt = Some(now);
        }
        record.status = status;
        record.updated_at = now;
        Ok(Some(record.clone()))
    }

    async fn set_needs_revalidation(&self, keys: &[String], flag: bool) -> Result<usize> {
        let mut records = self.records.write().await;
        let mut changed = 0;
        for key in keys {
            if let Some(record) = records.get_mut(key) {
                if record.needs_revalidation != flag {
                    record.needs_revalidation = flag;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.records.write().await.remove(key).is_some())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }
}
