//! The Field Schema Registry.
//!
//! Owns every field definition, active or not. Mutations take the write
//! lock for their whole duration so each call is all-or-nothing and the
//! version stamp moves exactly once per successful change.

use chrono::{DateTime, Utc};
use outreach_core::error::{ConflictError, EntityKind, Error, Result};
use outreach_core::field::{label_from_name, normalize_field_name, FieldDefinition, FieldPatch, FieldSpec, FieldType};
use outreach_core::similarity::squash;
use outreach_core::value::TypedValue;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::snapshot::SchemaSnapshot;
use crate::validate::{check_definition, validate_value};

struct SchemaState {
    /// Insertion order; inactive definitions are retained.
    fields: Vec<FieldDefinition>,
    version: u64,
    updated_at: DateTime<Utc>,
}

impl SchemaState {
    fn active_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.active && f.name == name)
    }

    fn active_sorted(&self) -> Vec<FieldDefinition> {
        let mut active: Vec<FieldDefinition> = self.fields.iter().filter(|f| f.active).cloned().collect();
        // Stable: equal (order, created_at) keep insertion order.
        active.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then(a.created_at.cmp(&b.created_at))
        });
        active
    }

    fn next_display_order(&self) -> i32 {
        self.fields
            .iter()
            .filter(|f| f.active)
            .map(|f| f.display_order + 1)
            .max()
            .unwrap_or(0)
    }

    fn bump(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
}

/// Before/after of a field update.
#[derive(Debug, Clone, Serialize)]
pub struct FieldChange {
    pub before: FieldDefinition,
    pub after: FieldDefinition,
    pub schema_version: u64,
}

impl FieldChange {
    pub fn is_noop(&self) -> bool {
        self.before == self.after
    }

    /// True when values stored under the old definition may no longer pass.
    pub fn affects_stored_values(&self) -> bool {
        self.before.field_type != self.after.field_type
            || self.before.options != self.after.options
            || self.before.validation_rules != self.after.validation_rules
            || (!self.before.required && self.after.required)
    }
}

/// What a dynamic form needs to render itself.
#[derive(Debug, Clone, Serialize)]
pub struct FormSchema {
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    pub fields: Vec<FieldDefinition>,
}

/// The set of typed attribute definitions.
#[derive(Clone)]
pub struct FieldRegistry {
    state: Arc<RwLock<SchemaState>>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(SchemaState {
                fields: Vec::new(),
                version: 0,
                updated_at: Utc::now(),
            })),
        }
    }

    /// Register a new field. Fails if an active field already holds the
    /// name or the options/rules do not fit the type.
    pub async fn define(&self, spec: FieldSpec) -> Result<FieldDefinition> {
        let name = normalize_field_name(&spec.name)?;
        check_definition(&name, spec.field_type, &spec.options, &spec.validation_rules)?;

        let mut state = self.state.write().await;
        if state.active_index(&name).is_some() {
            return Err(ConflictError::DuplicateField(name).into());
        }

        let now = Utc::now();
        let label = spec
            .label
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| label_from_name(&name));
        let display_order = spec.display_order.unwrap_or_else(|| state.next_display_order());
        let mut aliases = Vec::new();
        for alias in spec.aliases {
            push_alias(&mut aliases, &name, &alias);
        }

        let def = FieldDefinition {
            name,
            field_type: spec.field_type,
            label,
            required: spec.required,
            visible_in_list: spec.visible_in_list,
            options: spec.options,
            validation_rules: spec.validation_rules,
            display_order,
            active: true,
            aliases,
            created_at: now,
            updated_at: now,
        };
        state.fields.push(def.clone());
        state.bump(now);

        info!(field = %def.name, field_type = %def.field_type, version = state.version, "Field defined");
        Ok(def)
    }

    /// Apply a partial update. Changing the type away from single-select
    /// clears the options; any rule that does not fit the resulting type is
    /// rejected. Stored values are never touched here.
    pub async fn update(&self, name: &str, patch: FieldPatch) -> Result<FieldChange> {
        let name = normalize_field_name(name)?;
        let mut state = self.state.write().await;
        let idx = state
            .active_index(&name)
            .ok_or_else(|| Error::not_found(EntityKind::Field, &name))?;

        let before = state.fields[idx].clone();
        let mut after = before.clone();

        if let Some(field_type) = patch.field_type {
            after.field_type = field_type;
            if field_type != FieldType::SingleSelect && patch.options.is_none() {
                after.options.clear();
            }
        }
        if let Some(label) = patch.label.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()) {
            after.label = label;
        }
        if let Some(required) = patch.required {
            after.required = required;
        }
        if let Some(visible) = patch.visible_in_list {
            after.visible_in_list = visible;
        }
        if let Some(options) = patch.options {
            after.options = options;
        }
        if let Some(rules) = patch.validation_rules {
            after.validation_rules = rules;
        }
        if let Some(order) = patch.display_order {
            after.display_order = order;
        }

        check_definition(&after.name, after.field_type, &after.options, &after.validation_rules)?;

        if after == before {
            debug!(field = %name, "Field update is a no-op");
            return Ok(FieldChange {
                before,
                after,
                schema_version: state.version,
            });
        }

        let now = Utc::now();
        after.updated_at = now;
        state.fields[idx] = after.clone();
        state.bump(now);

        info!(
            field = %name,
            from_type = %before.field_type,
            to_type = %after.field_type,
            version = state.version,
            "Field updated"
        );
        Ok(FieldChange {
            before,
            after,
            schema_version: state.version,
        })
    }

    /// Soft delete. Stored values under the name stay readable.
    pub async fn deactivate(&self, name: &str) -> Result<FieldDefinition> {
        let name = normalize_field_name(name)?;
        let mut state = self.state.write().await;
        let idx = state
            .active_index(&name)
            .ok_or_else(|| Error::not_found(EntityKind::Field, &name))?;

        let now = Utc::now();
        let field = &mut state.fields[idx];
        field.active = false;
        field.updated_at = now;
        let def = field.clone();
        state.bump(now);

        info!(field = %name, version = state.version, "Field deactivated");
        Ok(def)
    }

    /// Set display orders in bulk. Every name must be active or nothing changes.
    pub async fn reorder(&self, orders: &[(String, i32)]) -> Result<Vec<FieldDefinition>> {
        let mut state = self.state.write().await;
        let mut targets = Vec::with_capacity(orders.len());
        for (name, order) in orders {
            let name = normalize_field_name(name)?;
            let idx = state
                .active_index(&name)
                .ok_or_else(|| Error::not_found(EntityKind::Field, &name))?;
            targets.push((idx, *order));
        }

        let now = Utc::now();
        for (idx, order) in targets {
            let field = &mut state.fields[idx];
            if field.display_order != order {
                field.display_order = order;
                field.updated_at = now;
            }
        }
        state.bump(now);
        Ok(state.active_sorted())
    }

    /// Remember a historical header spelling for `name`.
    pub async fn add_alias(&self, name: &str, alias: &str) -> Result<FieldDefinition> {
        let name = normalize_field_name(name)?;
        let mut state = self.state.write().await;
        let idx = state
            .active_index(&name)
            .ok_or_else(|| Error::not_found(EntityKind::Field, &name))?;

        let now = Utc::now();
        let field = &mut state.fields[idx];
        let changed = push_alias(&mut field.aliases, &name, alias);
        if changed {
            field.updated_at = now;
        }
        let def = field.clone();
        if changed {
            state.bump(now);
            debug!(field = %name, alias = alias, "Alias recorded");
        }
        Ok(def)
    }

    /// Record confirmed header→field pairs as aliases. Unknown or inactive
    /// fields are skipped. Returns how many aliases were new.
    pub async fn record_aliases(&self, pairs: &[(String, String)]) -> usize {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut added = 0;
        for (field_name, header) in pairs {
            let Some(idx) = state.active_index(field_name) else {
                continue;
            };
            let field = &mut state.fields[idx];
            let name = field.name.clone();
            if push_alias(&mut field.aliases, &name, header) {
                field.updated_at = now;
                added += 1;
            }
        }
        if added > 0 {
            state.bump(now);
        }
        added
    }

    pub async fn get_active(&self, name: &str) -> Option<FieldDefinition> {
        let name = normalize_field_name(name).ok()?;
        let state = self.state.read().await;
        state.active_index(&name).map(|i| state.fields[i].clone())
    }

    pub async fn get(&self, name: &str) -> Result<FieldDefinition> {
        self.get_active(name)
            .await
            .ok_or_else(|| Error::not_found(EntityKind::Field, name))
    }

    /// Active fields ordered by display order, ties by creation time.
    pub async fn list_active(&self) -> Vec<FieldDefinition> {
        self.state.read().await.active_sorted()
    }

    /// Every definition ever registered, including deactivated ones.
    pub async fn list_all(&self) -> Vec<FieldDefinition> {
        self.state.read().await.fields.clone()
    }

    pub async fn list_visible(&self) -> Vec<FieldDefinition> {
        let mut fields = self.list_active().await;
        fields.retain(|f| f.visible_in_list);
        fields
    }

    pub async fn required_fields(&self) -> Vec<FieldDefinition> {
        let mut fields = self.list_active().await;
        fields.retain(|f| f.required);
        fields
    }

    /// Validate one value against the named active field.
    pub async fn validate(&self, name: &str, raw: &Value) -> Result<Option<TypedValue>> {
        let def = self.get(name).await?;
        Ok(validate_value(&def, raw)?)
    }

    pub async fn version(&self) -> u64 {
        self.state.read().await.version
    }

    /// Consistent copy of the active schema and its version.
    pub async fn snapshot(&self) -> SchemaSnapshot {
        let state = self.state.read().await;
        SchemaSnapshot {
            version: state.version,
            fields: state.active_sorted(),
        }
    }

    pub async fn form_schema(&self) -> FormSchema {
        let state = self.state.read().await;
        FormSchema {
            version: state.version,
            updated_at: state.updated_at,
            fields: state.active_sorted(),
        }
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Append `alias` unless it is blank, spells the field name, or is
/// already known. Comparison ignores case and separators.
fn push_alias(aliases: &mut Vec<String>, name: &str, alias: &str) -> bool {
    let alias = alias.trim();
    let key = squash(alias);
    if key.is_empty() || key == squash(name) || aliases.iter().any(|a| squash(a) == key) {
        return false;
    }
    aliases.push(alias.to_string());
    true
}
