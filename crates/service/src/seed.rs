//! Workspace seed files.
//!
//! A seed is a TOML document describing fields, notes and records to load
//! into a fresh service, e.g. for demos or local development:
//!
//! ```toml
//! [[fields]]
//! name = "student_name"
//! type = "text"
//! required = true
//!
//! [[notes]]
//! id = "greet"
//! title = "Greeting"
//! body = "Congratulations {{student_name}}!"
//! tags = ["welcome"]
//! class = "primary"
//!
//! [[records]]
//! key = "9876543210"
//! attributes = { student_name = "Priya" }
//! ```

use outreach_core::error::{Error, Result};
use outreach_core::field::FieldSpec;
use outreach_core::note::NoteSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::OutreachService;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceSeed {
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub notes: Vec<NoteSpec>,
    #[serde(default)]
    pub records: Vec<SeedRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedRecord {
    pub key: String,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// What a seed added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub fields: usize,
    pub notes: usize,
    pub records: usize,
}

impl WorkspaceSeed {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config {
            message: format!("invalid seed: {e}"),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read seed {}: {e}", path.display()),
        })?;
        Self::from_toml_str(&text)
    }
}

impl OutreachService {
    /// Apply a seed in order: fields, then notes, then records. Stops at the
    /// first failure; anything applied before it stays.
    pub async fn apply_seed(&self, seed: WorkspaceSeed) -> Result<SeedSummary> {
        let mut summary = SeedSummary::default();
        for spec in seed.fields {
            self.define_field(spec).await?;
            summary.fields += 1;
        }
        for spec in seed.notes {
            self.create_note(spec).await?;
            summary.notes += 1;
        }
        for record in seed.records {
            self.put_record(&record.key, record.attributes, record.priority).await?;
            summary.records += 1;
        }
        info!(
            fields = summary.fields,
            notes = summary.notes,
            records = summary.records,
            "Seed applied"
        );
        Ok(summary)
    }
}
