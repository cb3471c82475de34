//! Records: entities keyed by a stable identifier carrying typed attributes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::value::AttributeValue;

/// Attribute map, ordered by field name so snapshots serialize deterministically.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Outreach status of a record. Written by the call-placement collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    NoAnswer,
    Busy,
    Failed,
    CallbackRequested,
    Cancelled,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::NoAnswer => "no_answer",
            Self::Busy => "busy",
            Self::Failed => "failed",
            Self::CallbackRequested => "callback_requested",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entity such as a contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable unique key (e.g. a phone number). The only mandatory attribute.
    pub key: String,

    #[serde(default)]
    pub attributes: Attributes,

    #[serde(default)]
    pub status: RecordStatus,

    /// Higher is more urgent.
    #[serde(default)]
    pub priority: i32,

    /// Set when a schema change may have invalidated stored values.
    #[serde(default)]
    pub needs_revalidation: bool,

    #[serde(default)]
    pub call_count: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_call_attempt: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    pub fn new(key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            attributes: Attributes::new(),
            status: RecordStatus::default(),
            priority: 0,
            needs_revalidation: false,
            call_count: 0,
            last_call_attempt: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Names of attributes stored without a matching field definition.
    pub fn unschematized_names(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|(_, v)| v.is_unschematized())
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

/// Selection criteria for listing records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RecordStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_revalidation: Option<bool>,
    /// Case-insensitive substring over the key and scalar attribute values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Only records holding an attribute with this name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Result of a merge-write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertOutcome {
    pub created: bool,
    pub record: Record,
}
