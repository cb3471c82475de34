//! Context notes (reusable, prioritized knowledge snippets) and the
//! selection that names which notes go into one constructed script.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::hash::PartsHasher;

/// Primary notes precede secondary ones and are never dropped for length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteClass {
    Primary,
    #[default]
    Secondary,
}

impl NoteClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

/// A reusable knowledge snippet. The body may embed `{{field_name}}` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextNote {
    pub id: String,
    pub title: String,
    pub body: String,
    /// Non-empty. The first tag (in sorted order) acts as the category.
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub class: NoteClass,
    /// Higher is more important.
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl ContextNote {
    /// Hash over everything that can change constructed output.
    pub fn content_hash(&self) -> String {
        let mut h = PartsHasher::new("context-note/v1");
        h.str(&self.id)
            .str(&self.title)
            .str(&self.body)
            .str(self.class.as_str())
            .str(&self.priority.to_string())
            .str(if self.active { "active" } else { "inactive" })
            .str(&self.created_at.to_rfc3339());
        for tag in &self.tags {
            h.str(tag);
        }
        h.finish()
    }

    pub fn category(&self) -> &str {
        self.tags.iter().next().map(String::as_str).unwrap_or("other")
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn word_count(&self) -> usize {
        self.body.split_whitespace().count()
    }

    /// Case-insensitive relevance test over title, body and tags.
    pub fn matches_query(&self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&q)
            || self.body.to_lowercase().contains(&q)
            || self.tags.iter().any(|t| {
                let t = t.to_lowercase();
                t.contains(&q) || q.contains(&t)
            })
    }
}

/// Input for creating a note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteSpec {
    /// Caller-chosen id; generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    #[serde(default)]
    pub class: NoteClass,
    #[serde(default)]
    pub priority: i32,
}

/// Partial update for a note.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<NoteClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

/// Listing criteria for notes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoteFilter {
    #[serde(default)]
    pub active_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<NoteClass>,
}

/// One selected note, optionally pinned to an explicit position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionEntry {
    pub note_id: String,
    /// Lower sorts first among notes of equal class and priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

/// The ordered list of notes requested for one construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSelection {
    pub entries: Vec<SelectionEntry>,
}

impl ContextSelection {
    /// Selection with no order overrides.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: ids
                .into_iter()
                .map(|id| SelectionEntry {
                    note_id: id.into(),
                    order: None,
                })
                .collect(),
        }
    }

    pub fn with_order(mut self, note_id: &str, order: i32) -> Self {
        for e in self.entries.iter_mut().filter(|e| e.note_id == note_id) {
            e.order = Some(order);
        }
        self
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.note_id.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
