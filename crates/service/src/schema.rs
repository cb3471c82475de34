// ── Schema contract ──

use chrono::Utc;
use outreach_core::error::Result;
use outreach_core::event::DomainEvent;
use outreach_core::field::{FieldDefinition, FieldPatch, FieldSpec};
use outreach_core::record::RecordFilter;
use outreach_core::value::TypedValue;
use outreach_schema::{field_type_catalog, FieldChange, FieldTypeInfo, FormSchema, SchemaSnapshot};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::OutreachService;

/// Result of a field update.
#[derive(Debug, Clone, Serialize)]
pub struct FieldUpdate {
    #[serde(flatten)]
    pub change: FieldChange,
    /// Records flagged for revalidation by this change.
    pub flagged_records: usize,
}

impl OutreachService {
    pub async fn define_field(&self, spec: FieldSpec) -> Result<FieldDefinition> {
        let def = self.registry.define(spec).await?;
        let snapshot = self.registry.snapshot().await;
        let flagged = self.flag_stale_records(&snapshot, &def).await?;
        info!(field = %def.name, flagged, schema_version = snapshot.version, "Field defined");
        self.events.publish(DomainEvent::FieldDefined {
            name: def.name.clone(),
            schema_version: snapshot.version,
            timestamp: Utc::now(),
        });
        Ok(def)
    }

    /// Apply `patch`. Records whose stored values may no longer pass are
    /// flagged `needs_revalidation`; nothing is rewritten.
    pub async fn update_field(&self, name: &str, patch: FieldPatch) -> Result<FieldUpdate> {
        let change = self.registry.update(name, patch).await?;
        let flagged = if change.affects_stored_values() {
            let snapshot = self.registry.snapshot().await;
            self.flag_stale_records(&snapshot, &change.after).await?
        } else {
            0
        };

        if !change.is_noop() {
            info!(field = %change.after.name, flagged, schema_version = change.schema_version, "Field updated");
            self.events.publish(DomainEvent::FieldUpdated {
                name: change.after.name.clone(),
                schema_version: change.schema_version,
                affected_records: flagged,
                timestamp: Utc::now(),
            });
        }
        Ok(FieldUpdate {
            change,
            flagged_records: flagged,
        })
    }

    /// Soft delete. Stored values stay readable.
    pub async fn deactivate_field(&self, name: &str) -> Result<FieldDefinition> {
        let def = self.registry.deactivate(name).await?;
        let schema_version = self.registry.version().await;
        info!(field = %def.name, schema_version, "Field deactivated");
        self.events.publish(DomainEvent::FieldDeactivated {
            name: def.name.clone(),
            schema_version,
            timestamp: Utc::now(),
        });
        Ok(def)
    }

    pub async fn reorder_fields(&self, orders: &[(String, i32)]) -> Result<Vec<FieldDefinition>> {
        self.registry.reorder(orders).await
    }

    pub async fn add_field_alias(&self, name: &str, alias: &str) -> Result<FieldDefinition> {
        self.registry.add_alias(name, alias).await
    }

    pub async fn get_field(&self, name: &str) -> Result<FieldDefinition> {
        self.registry.get(name).await
    }

    pub async fn list_fields(&self, include_inactive: bool) -> Vec<FieldDefinition> {
        if include_inactive {
            self.registry.list_all().await
        } else {
            self.registry.list_active().await
        }
    }

    pub async fn list_visible_fields(&self) -> Vec<FieldDefinition> {
        self.registry.list_visible().await
    }

    pub async fn required_fields(&self) -> Vec<FieldDefinition> {
        self.registry.required_fields().await
    }

    pub async fn validate_field_value(&self, name: &str, raw: &Value) -> Result<Option<TypedValue>> {
        self.registry.validate(name, raw).await
    }

    pub async fn form_schema(&self) -> FormSchema {
        self.registry.form_schema().await
    }

    pub fn field_types(&self) -> Vec<FieldTypeInfo> {
        field_type_catalog()
    }

    pub async fn schema_snapshot(&self) -> SchemaSnapshot {
        self.registry.snapshot().await
    }

    /// Flag records whose value under `def` no longer passes, or that lack
    /// a value `def` now requires.
    async fn flag_stale_records(&self, snapshot: &SchemaSnapshot, def: &FieldDefinition) -> Result<usize> {
        let records = self.records.list(&RecordFilter::default()).await?;
        let stale: Vec<String> = records
            .into_iter()
            .filter(|r| match r.attributes.get(&def.name) {
                Some(value) => {
                    !snapshot.conforms(&def.name, value)
                        || snapshot.validate_value(&def.name, &value.to_raw()).is_err()
                }
                None => def.required,
            })
            .map(|r| r.key)
            .collect();
        if stale.is_empty() {
            return Ok(0);
        }
        self.records.set_needs_revalidation(&stale, true).await
    }
}
