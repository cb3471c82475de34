// ── Context contract ──

use chrono::Utc;
use outreach_context::{CacheStats, Construction, ConstructionInput};
use outreach_core::context::{ConstructedContext, LengthBudget};
use outreach_core::error::{EntityKind, Error, Result};
use outreach_core::event::DomainEvent;
use outreach_core::note::{ContextNote, ContextSelection};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::OutreachService;

/// A request to merge selected notes with one record's data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRequest {
    pub record_key: String,
    #[serde(default)]
    pub selection: ContextSelection,
    /// Overrides the configured default budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<LengthBudget>,
}

impl ContextRequest {
    pub fn new(record_key: impl Into<String>, selection: ContextSelection) -> Self {
        Self {
            record_key: record_key.into(),
            selection,
            budget: None,
        }
    }

    pub fn with_budget(mut self, budget: LengthBudget) -> Self {
        self.budget = Some(budget);
        self
    }
}

impl OutreachService {
    /// Build the context for a record and hand it off for the next call.
    pub async fn construct_context(&self, request: &ContextRequest) -> Result<Construction> {
        self.run_construction(request, true).await
    }

    /// Build without handing off. Repeated previews are served from cache.
    pub async fn preview_context(&self, request: &ContextRequest) -> Result<Construction> {
        self.run_construction(request, false).await
    }

    /// The most recent unexpired hand-off for `record_key`.
    pub async fn handoff(&self, record_key: &str) -> Result<Arc<ConstructedContext>> {
        self.engine
            .handoff(record_key)
            .await
            .ok_or_else(|| Error::not_found(EntityKind::Record, record_key))
    }

    pub async fn cleanup_expired_handoffs(&self) -> usize {
        self.engine.cleanup_expired().await
    }

    pub async fn context_cache_stats(&self) -> CacheStats {
        self.engine.cache_stats().await
    }

    async fn run_construction(&self, request: &ContextRequest, hand_off: bool) -> Result<Construction> {
        let record = self.get_record(&request.record_key).await?;
        let notes = self.selected_notes(&request.selection).await?;
        let schema = self.registry.snapshot().await;

        let input = ConstructionInput {
            record: &record,
            notes: &notes,
            selection: &request.selection,
            schema: &schema,
            budget: request.budget,
        };
        let construction = if hand_off {
            self.engine.construct(input).await
        } else {
            self.engine.preview(input).await
        };

        if hand_off {
            self.events.publish(DomainEvent::ContextConstructed {
                record_key: record.key.clone(),
                context_hash: construction.context.context_hash.clone(),
                cached: construction.cached,
                truncated: construction.context.truncated,
                timestamp: Utc::now(),
            });
        }
        Ok(construction)
    }

    /// Fetch each selected note once. Unknown ids fail the whole request.
    async fn selected_notes(&self, selection: &ContextSelection) -> Result<Vec<ContextNote>> {
        let mut seen = HashSet::new();
        let mut notes = Vec::with_capacity(selection.entries.len());
        for id in selection.ids().filter(|id| seen.insert(*id)) {
            notes.push(self.get_note(id).await?);
        }
        Ok(notes)
    }
}

#[cfg(test)]
mod tests {
    use super::ContextRequest;
    use crate::OutreachService;
    use outreach_config::AppConfig;
    use outreach_core::context::{LengthBudget, NoteFate};
    use outreach_core::error::{EntityKind, Error};
    use outreach_core::field::{FieldSpec, FieldType};
    use outreach_core::note::{ContextSelection, NoteClass, NotePatch, NoteSpec};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn note(id: &str, class: NoteClass, priority: i32, body: &str) -> NoteSpec {
        NoteSpec {
            id: Some(id.into()),
            title: id.into(),
            body: body.into(),
            tags: vec!["general".into()],
            class,
            priority,
        }
    }

    async fn service() -> OutreachService {
        let svc = OutreachService::new(AppConfig::default());
        svc.define_field(FieldSpec::new("student_name", FieldType::Text).required())
            .await
            .unwrap();
        svc.define_field(FieldSpec::new("scholarship_amount", FieldType::Currency))
            .await
            .unwrap();
        svc.define_field(FieldSpec::new("hostel_fee", FieldType::Currency))
            .await
            .unwrap();

        let attrs: BTreeMap<String, serde_json::Value> = [
            ("student_name".to_string(), json!("Priya")),
            ("scholarship_amount".to_string(), json!(50000)),
        ]
        .into_iter()
        .collect();
        svc.put_record("9876543210", attrs, None).await.unwrap();

        svc.create_note(note("greet", NoteClass::Primary, 5, "Congratulations {{student_name}} on qualifying!"))
            .await
            .unwrap();
        svc.create_note(note("hostel", NoteClass::Secondary, 1, "Hostel fees are {{hostel_fee}}."))
            .await
            .unwrap();
        svc.create_note(note("award", NoteClass::Secondary, 3, "Your award is {{scholarship_amount}}."))
            .await
            .unwrap();
        svc
    }

    #[tokio::test]
    async fn constructs_and_hands_off() {
        let svc = service().await;
        let request = ContextRequest::new(
            "9876543210",
            ContextSelection::from_ids(["hostel", "award", "greet"]),
        );
        let built = svc.construct_context(&request).await.unwrap();
        assert!(!built.cached);
        assert_eq!(
            built.context.text,
            "Congratulations Priya on qualifying!\n\nYour award is ₹50,000."
        );
        let hostel = built
            .context
            .provenance
            .notes
            .iter()
            .find(|n| n.note_id == "hostel")
            .unwrap();
        assert!(matches!(hostel.fate, NoteFate::OmittedMissingFields { .. }));

        let handed = svc.handoff("9876543210").await.unwrap();
        assert_eq!(handed.context_hash, built.context.context_hash);
    }

    #[tokio::test]
    async fn preview_hits_cache_until_note_changes() {
        let svc = service().await;
        let request = ContextRequest::new("9876543210", ContextSelection::from_ids(["greet"]));

        let first = svc.preview_context(&request).await.unwrap();
        let second = svc.preview_context(&request).await.unwrap();
        assert!(!first.cached);
        assert!(second.cached);
        assert!(matches!(svc.handoff("9876543210").await, Err(Error::NotFound { .. })));

        svc.update_note(
            "greet",
            NotePatch {
                body: Some("Well done {{student_name}}!".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let third = svc.preview_context(&request).await.unwrap();
        assert!(!third.cached);
        assert_eq!(third.context.text, "Well done Priya!");
        assert_ne!(third.context.context_hash, first.context.context_hash);
    }

    #[tokio::test]
    async fn budget_drops_secondary_notes() {
        let svc = service().await;
        let request = ContextRequest::new("9876543210", ContextSelection::from_ids(["greet", "award"]))
            .with_budget(LengthBudget::Words(5));
        let built = svc.preview_context(&request).await.unwrap();
        assert_eq!(built.context.text, "Congratulations Priya on qualifying!");
        let award = built
            .context
            .provenance
            .notes
            .iter()
            .find(|n| n.note_id == "award")
            .unwrap();
        assert_eq!(award.fate, NoteFate::DroppedForBudget);
    }

    #[tokio::test]
    async fn unknown_record_or_note_is_not_found() {
        let svc = service().await;
        let request = ContextRequest::new("0000", ContextSelection::from_ids(["greet"]));
        assert!(matches!(
            svc.construct_context(&request).await,
            Err(Error::NotFound {
                kind: EntityKind::Record,
                ..
            })
        ));

        let request = ContextRequest::new("9876543210", ContextSelection::from_ids(["nope"]));
        assert!(matches!(
            svc.construct_context(&request).await,
            Err(Error::NotFound {
                kind: EntityKind::Note,
                ..
            })
        ));
    }
}
