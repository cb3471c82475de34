use chrono::Utc;
use outreach_core::error::{EntityKind, Error, Result};
use outreach_core::event::DomainEvent;
use outreach_core::note::{ContextNote, NoteFilter, NotePatch, NoteSpec};
use std::collections::BTreeMap;
use tracing::info;

use crate::OutreachService;

impl OutreachService {
    pub async fn create_note(&self, spec: NoteSpec) -> Result<ContextNote> {
        let note = self.notes.create(spec).await?;
        self.note_changed(&note.id, "create");
        Ok(note)
    }

    pub async fn get_note(&self, id: &str) -> Result<ContextNote> {
        self.notes
            .get(id)
            .await?
            .ok_or_else(|| Error::not_found(EntityKind::Note, id))
    }

    pub async fn update_note(&self, id: &str, patch: NotePatch) -> Result<ContextNote> {
        let note = self.notes.update(id, patch).await?;
        self.note_changed(id, "update");
        Ok(note)
    }

    /// Soft delete: the note stays listable but is never included in output.
    pub async fn deactivate_note(&self, id: &str) -> Result<ContextNote> {
        let note = self
            .notes
            .update(
                id,
                NotePatch {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .await?;
        self.note_changed(id, "deactivate");
        Ok(note)
    }

    pub async fn delete_note(&self, id: &str) -> Result<()> {
        if !self.notes.delete(id).await? {
            return Err(Error::not_found(EntityKind::Note, id));
        }
        self.note_changed(id, "delete");
        Ok(())
    }

    pub async fn list_notes(&self, filter: &NoteFilter) -> Result<Vec<ContextNote>> {
        self.notes.list(filter).await
    }

    /// Active notes relevant to `query`, most important first.
    pub async fn search_notes(&self, query: &str, limit: Option<usize>) -> Result<Vec<ContextNote>> {
        let mut hits: Vec<ContextNote> = self
            .notes
            .list(&NoteFilter {
                active_only: true,
                ..Default::default()
            })
            .await?
            .into_iter()
            .filter(|n| n.matches_query(query))
            .collect();
        hits.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = limit {
            hits.truncate(limit);
        }
        Ok(hits)
    }

    /// Tag usage across active notes.
    pub async fn note_categories(&self) -> Result<BTreeMap<String, usize>> {
        let notes = self
            .notes
            .list(&NoteFilter {
                active_only: true,
                ..Default::default()
            })
            .await?;
        let mut counts = BTreeMap::new();
        for tag in notes.iter().flat_map(|n| n.tags.iter()) {
            *counts.entry(tag.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Every note, active or not, for backup.
    pub async fn export_notes(&self) -> Result<Vec<ContextNote>> {
        self.notes.list(&NoteFilter::default()).await
    }

    fn note_changed(&self, id: &str, operation: &str) {
        info!(note_id = id, operation, "Note changed");
        self.events.publish(DomainEvent::NoteChanged {
            note_id: id.to_string(),
            operation: operation.to_string(),
            timestamp: Utc::now(),
        });
    }
}
