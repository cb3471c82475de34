//! A versioned, read-only view of the active schema.
//!
//! Batches and constructions work against a snapshot so every row or
//! script in one request sees the same definitions, and the version stamp
//! tells the caller whether the registry moved underneath them.

use outreach_core::error::{EntityKind, Error, Result, Rule};
use outreach_core::field::{normalize_field_name, FieldDefinition};
use outreach_core::hash::PartsHasher;
use outreach_core::record::Attributes;
use outreach_core::report::{Subject, ValidationReport};
use outreach_core::value::{AttributeValue, TypedValue};
use serde::Serialize;
use serde_json::Value;

use crate::validate::{is_empty, validate_value};

#[derive(Debug, Clone, Serialize)]
pub struct SchemaSnapshot {
    pub version: u64,
    /// Active fields ordered by display order, then creation.
    pub fields: Vec<FieldDefinition>,
}

/// Outcome of validating a set of attributes for one record write.
#[derive(Debug, Clone, Default)]
pub struct AttributeCheck {
    /// Values that passed, tagged with their type. Unknown names are kept unschematized.
    pub attributes: Attributes,
    /// Names stored without a matching active field.
    pub unschematized: Vec<String>,
    pub report: ValidationReport,
}

impl AttributeCheck {
    pub fn is_valid(&self) -> bool {
        !self.report.has_errors()
    }
}

impl SchemaSnapshot {
    /// Active field by name, case-insensitively.
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        let normalized = normalize_field_name(name).ok();
        self.fields.iter().find(|f| match &normalized {
            Some(n) => f.name == *n,
            None => f.name.eq_ignore_ascii_case(name.trim()),
        })
    }

    pub fn validate_value(&self, name: &str, raw: &Value) -> Result<Option<TypedValue>> {
        let def = self
            .field(name)
            .ok_or_else(|| Error::not_found(EntityKind::Field, name))?;
        Ok(validate_value(def, raw)?)
    }

    /// Validate raw name→value pairs for a write that will be merged into
    /// `existing`. Required fields must be present after the merge.
    pub fn validate_attributes<I>(&self, subject: &Subject, raw: I, existing: Option<&Attributes>) -> AttributeCheck
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut check = AttributeCheck::default();

        for (name, value) in raw {
            match self.field(&name) {
                Some(def) => match validate_value(def, &value) {
                    Ok(Some(typed)) => {
                        check.attributes.insert(def.name.clone(), typed.into());
                    }
                    Ok(None) => {}
                    Err(e) => check.report.reject(subject.clone(), e),
                },
                None if is_empty(&value) => {}
                None => match normalize_field_name(&name) {
                    Ok(normalized) => {
                        check.unschematized.push(normalized.clone());
                        check
                            .attributes
                            .insert(normalized, AttributeValue::Unschematized(value));
                    }
                    Err(e) => check.report.error(subject.clone(), Some(&name), None, e.to_string()),
                },
            }
        }

        self.check_required(subject, &mut check, existing);
        check
    }

    /// Re-check stored attributes against the current definitions.
    ///
    /// Values under active fields are re-validated from their raw form and
    /// re-tagged; values under names the schema no longer defines are kept
    /// exactly as stored.
    pub fn revalidate_attributes(&self, subject: &Subject, stored: &Attributes) -> AttributeCheck {
        let mut check = AttributeCheck::default();

        for (name, value) in stored {
            match self.field(name) {
                Some(def) => match validate_value(def, &value.to_raw()) {
                    Ok(Some(typed)) => {
                        check.attributes.insert(def.name.clone(), typed.into());
                    }
                    Ok(None) => {}
                    Err(e) => check.report.reject(subject.clone(), e),
                },
                None => {
                    if value.is_unschematized() {
                        check.unschematized.push(name.clone());
                    }
                    check.attributes.insert(name.clone(), value.clone());
                }
            }
        }

        self.check_required(subject, &mut check, None);
        check
    }

    fn check_required(&self, subject: &Subject, check: &mut AttributeCheck, existing: Option<&Attributes>) {
        for def in self.fields.iter().filter(|f| f.required) {
            let present = check.attributes.contains_key(&def.name)
                || existing.is_some_and(|a| a.contains_key(&def.name));
            let reported = check
                .report
                .errors()
                .any(|i| i.field.as_deref() == Some(def.name.as_str()));
            if !present && !reported {
                check.report.error(
                    subject.clone(),
                    Some(&def.name),
                    Some(Rule::Required),
                    format!("{} is required", def.label),
                );
            }
        }
    }

    /// Whether a stored value still matches the active definition's type.
    /// Values under unknown names are reported as conforming.
    pub fn conforms(&self, name: &str, value: &AttributeValue) -> bool {
        match (self.field(name), value) {
            (Some(def), AttributeValue::Typed(v)) => v.field_type() == def.field_type,
            (Some(_), AttributeValue::Unschematized(_)) => false,
            (None, _) => true,
        }
    }

    /// Hash of the (name, type) pairs of the active fields.
    pub fn fingerprint(&self) -> String {
        let mut names: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.field_type.as_str()))
            .collect();
        names.sort_unstable();

        let mut h = PartsHasher::new("schema-fields/v1");
        for (name, field_type) in names {
            h.str(name).str(field_type);
        }
        h.finish()
    }
}
