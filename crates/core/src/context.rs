//! Constructed context — the deterministic script artifact handed to the
//! call-placement collaborator.

use serde::{Deserialize, Serialize};

/// Upper bound on the length of a constructed script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "unit", content = "limit", rename_all = "snake_case")]
pub enum LengthBudget {
    /// Unicode scalar values.
    Chars(usize),
    /// Whitespace-separated words.
    Words(usize),
}

impl LengthBudget {
    pub fn limit(&self) -> usize {
        match self {
            Self::Chars(n) | Self::Words(n) => *n,
        }
    }

    /// Length of `text` in this budget's unit.
    pub fn measure(&self, text: &str) -> usize {
        match self {
            Self::Chars(_) => text.chars().count(),
            Self::Words(_) => text.split_whitespace().count(),
        }
    }

    pub fn fits(&self, text: &str) -> bool {
        self.measure(text) <= self.limit()
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Chars(n) => format!("chars:{n}"),
            Self::Words(n) => format!("words:{n}"),
        }
    }
}

/// What happened to one selected note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "fate", rename_all = "snake_case")]
pub enum NoteFate {
    Included,
    /// Every sentence referenced a missing value.
    OmittedMissingFields { fields: Vec<String> },
    Inactive,
    DuplicateOf { note_id: String },
    DroppedForBudget,
    /// Kept, but cut at a sentence boundary.
    Truncated,
}

/// Contribution record for one selected note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteProvenance {
    pub note_id: String,
    pub content_hash: String,
    pub fate: NoteFate,
    /// Clauses/sentences dropped because a referenced field was missing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub omitted_fields: Vec<String>,
}

/// Which notes and fields contributed to a constructed script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub notes: Vec<NoteProvenance>,
    /// Field names whose values were substituted, sorted.
    pub fields: Vec<String>,
}

impl Provenance {
    pub fn included_note_ids(&self) -> Vec<&str> {
        self.notes
            .iter()
            .filter(|n| matches!(n.fate, NoteFate::Included | NoteFate::Truncated))
            .map(|n| n.note_id.as_str())
            .collect()
    }
}

/// The finished artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructedContext {
    pub record_key: String,
    pub text: String,
    pub provenance: Provenance,
    pub truncated: bool,
    /// Content hash of every input; the cache key.
    pub context_hash: String,
    pub template_version: String,
    pub budget: LengthBudget,
}
