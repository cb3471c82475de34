//! Storage traits for records and context notes.
//!
//! Implementations live in `outreach-store` (in-memory) and may be
//! swapped for a database-backed backend without touching callers.
//! All suspension happens here, at the storage boundary.

use async_trait::async_trait;

use crate::error::Result;
use crate::note::{ContextNote, NoteFilter, NotePatch, NoteSpec};
use crate::record::{Attributes, Record, RecordFilter, RecordStatus, UpsertOutcome};

/// Holds records keyed by their stable identifier.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The backend name (e.g. "in_memory").
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Option<Record>>;

    /// Merge `attributes` into the record under `key`, creating it if needed.
    /// Existing attributes not named in `attributes` are kept.
    async fn upsert(&self, key: &str, attributes: Attributes, priority: Option<i32>) -> Result<UpsertOutcome>;

    /// Records matching `filter`, ordered by priority (desc) then key.
    async fn list(&self, filter: &RecordFilter) -> Result<Vec<Record>>;

    async fn set_status(&self, key: &str, status: RecordStatus) -> Result<Option<Record>>;

    /// Set or clear the revalidation flag on the given records. Returns how many changed.
    async fn set_needs_revalidation(&self, keys: &[String], flag: bool) -> Result<usize>;

    async fn delete(&self, key: &str) -> Result<bool>;

    async fn count(&self) -> Result<usize>;
}

/// Holds reusable context notes.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    fn name(&self) -> &str;

    async fn create(&self, spec: NoteSpec) -> Result<ContextNote>;

    async fn get(&self, id: &str) -> Result<Option<ContextNote>>;

    async fn update(&self, id: &str, patch: NotePatch) -> Result<ContextNote>;

    async fn list(&self, filter: &NoteFilter) -> Result<Vec<ContextNote>>;

    async fn delete(&self, id: &str) -> Result<bool>;
}
