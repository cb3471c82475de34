//! In-memory context note repository.

use async_trait::async_trait;
use chrono::Utc;
use outreach_core::error::{ConflictError, EntityKind, Error, Result};
use outreach_core::note::{ContextNote, NoteFilter, NotePatch, NoteSpec};
use outreach_core::report::{Subject, ValidationReport};
use outreach_core::store::NoteRepository;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

pub struct InMemoryNoteRepository {
    notes: Arc<RwLock<HashMap<String, ContextNote>>>,
}

impl InMemoryNoteRepository {
    pub fn new() -> Self {
        Self {
            notes: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryNoteRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn clean_tags(tags: &[String]) -> BTreeSet<String> {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Title and body must be non-blank and at least one tag given.
fn check_note(id: &str, title: &str, body: &str, tags: &BTreeSet<String>) -> Result<()> {
    let subject = Subject::Note(id.to_string());
    let mut report = ValidationReport::new();
    if title.trim().is_empty() {
        report.error(subject.clone(), Some("title"), None, "title cannot be empty");
    }
    if body.trim().is_empty() {
        report.error(subject.clone(), Some("body"), None, "body cannot be empty");
    }
    if tags.is_empty() {
        report.error(subject, Some("tags"), None, "at least one tag is required");
    }
    if report.has_errors() {
        return Err(Error::Validation(report));
    }
    Ok(())
}

#[async_trait]
impl NoteRepository for InMemoryNoteRepository {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn create(&self, spec: NoteSpec) -> Result<ContextNote> {
        let id = spec
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let tags = clean_tags(&spec.tags);
        check_note(&id, &spec.title, &spec.body, &tags)?;

        let mut notes = self.notes.write().await;
        if notes.contains_key(&id) {
            return Err(ConflictError::DuplicateNote(id).into());
        }

        let now = Utc::now();
        let note = ContextNote {
            id: id.clone(),
            title: spec.title.trim().to_string(),
            body: spec.body,
            tags,
            class: spec.class,
            priority: spec.priority,
            active: true,
            created_at: now,
            updated_at: now,
        };
        notes.insert(id, note.clone());
        debug!(note_id = %note.id, "Note created");
        Ok(note)
    }

    async fn get(&self, id: &str) -> Result<Option<ContextNote>> {
        Ok(self.notes.read().await.get(id).cloned())
    }

    async fn update(&self, id: &str, patch: NotePatch) -> Result<ContextNote> {
        let mut notes = self.notes.write().await;
        let current = notes
            .get(id)
            .ok_or_else(|| Error::not_found(EntityKind::Note, id))?;

        let mut next = current.clone();
        if let Some(title) = patch.title {
            next.title = title.trim().to_string();
        }
        if let Some(body) = patch.body {
            next.body = body;
        }
        if let Some(tags) = patch.tags {
            next.tags = clean_tags(&tags);
        }
        if let Some(class) = patch.class {
            next.class = class;
        }
        if let Some(priority) = patch.priority {
            next.priority = priority;
        }
        if let Some(active) = patch.active {
            next.active = active;
        }
        check_note(id, &next.title, &next.body, &next.tags)?;

        next.updated_at = Utc::now();
        notes.insert(id.to_string(), next.clone());
        Ok(next)
    }

    /// Ordered by class, then priority (desc), then creation, then id.
    async fn list(&self, filter: &NoteFilter) -> Result<Vec<ContextNote>> {
        let notes = self.notes.read().await;
        let mut results: Vec<ContextNote> = notes
            .values()
            .filter(|n| !filter.active_only || n.active)
            .filter(|n| filter.tag.as_deref().is_none_or(|t| n.has_tag(t)))
            .filter(|n| filter.class.is_none_or(|c| n.class == c))
            .cloned()
            .collect();
        results.sort_by(|a, b| {
            a.class
                .cmp(&b.class)
                .then(b.priority.cmp(&a.priority))
                .then(a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(results)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.notes.write().await.remove(id).is_some())
    }
}
