//! Error types for the outreach domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] wraps them all.
//! Expected validation outcomes travel as a [`ValidationReport`] rather
//! than as free-form strings.

use crate::report::ValidationReport;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all outreach operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Schema registry ---
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    // --- Single value checks ---
    #[error("Invalid value: {0}")]
    InvalidValue(#[from] ValidationError),

    // --- Record writes rejected with a structured report ---
    #[error("Validation failed: {0}")]
    Validation(ValidationReport),

    // --- Ingestion mapping ---
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    // --- Duplicate names / duplicate targets ---
    #[error("Conflict: {0}")]
    Conflict(#[from] ConflictError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    // --- Storage boundary ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Short machine-readable kind, used by the HTTP surface.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Schema(_) => "schema_error",
            Self::InvalidValue(_) | Self::Validation(_) => "validation_error",
            Self::Mapping(_) => "mapping_ambiguous",
            Self::Conflict(_) => "conflict_error",
            Self::NotFound { .. } => "not_found",
            Self::Store(_) => "store_error",
            Self::Config { .. } => "config_error",
            Self::Serialization(_) => "serialization_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Which kind of entity a lookup failed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Record,
    Field,
    Note,
    Header,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Record => "Record",
            Self::Field => "Field",
            Self::Note => "Note",
            Self::Header => "Header",
        };
        f.write_str(s)
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("invalid field name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("field '{name}' is single-select but declares no options")]
    MissingOptions { name: String },

    #[error("invalid validation rules for '{name}': {reason}")]
    InvalidRules { name: String, reason: String },

    #[error("field '{name}' is not active")]
    Inactive { name: String },
}

/// The rule a value violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Required,
    Type,
    MinLength,
    MaxLength,
    Pattern,
    Min,
    Max,
    Precision,
    NonNegative,
    DateRange,
    Options,
    RecordKey,
    RowShape,
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Required => "required",
            Self::Type => "type",
            Self::MinLength => "min_length",
            Self::MaxLength => "max_length",
            Self::Pattern => "pattern",
            Self::Min => "min",
            Self::Max => "max",
            Self::Precision => "precision",
            Self::NonNegative => "non_negative",
            Self::DateRange => "date_range",
            Self::Options => "options",
            Self::RecordKey => "record_key",
            Self::RowShape => "row_shape",
        };
        f.write_str(s)
    }
}

/// A value failed a type or rule check. Carries the field and the rule.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{field}: {reason} ({rule})")]
pub struct ValidationError {
    pub field: String,
    pub rule: Rule,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, rule: Rule, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            rule,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    #[error("header '{header}' matches several fields equally well: {}", candidates.join(", "))]
    Ambiguous {
        header: String,
        candidates: Vec<String>,
    },

    #[error("header '{0}' is not present in the table")]
    UnknownHeader(String),

    #[error("no record key column was given or detected")]
    MissingKeyHeader,

    #[error("table has no header row")]
    EmptyTable,

    #[error("malformed table: {0}")]
    Malformed(String),

    #[error("scoring strategy '{strategy}' failed: {reason}")]
    Scoring { strategy: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConflictError {
    #[error("an active field named '{0}' already exists")]
    DuplicateField(String),

    #[error("field '{field}' is targeted by more than one header: {}", headers.join(", "))]
    DuplicateMappingTarget { field: String, headers: Vec<String> },

    #[error("a note with id '{0}' already exists")]
    DuplicateNote(String),
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store operation timed out after {0} ms")]
    Timeout(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_error_lists_headers() {
        let err = Error::Conflict(ConflictError::DuplicateMappingTarget {
            field: "student_name".into(),
            headers: vec!["Name".into(), "Full Name".into()],
        });
        let msg = err.to_string();
        assert!(msg.contains("student_name"));
        assert!(msg.contains("Full Name"));
        assert_eq!(err.kind(), "conflict_error");
    }

    #[test]
    fn validation_error_displays_rule() {
        let err = ValidationError::new("city", Rule::Options, "must be one of: Delhi, Pune");
        assert_eq!(err.to_string(), "city: must be one of: Delhi, Pune (options)");
    }

    #[test]
    fn not_found_displays_kind() {
        let err = Error::not_found(EntityKind::Note, "n-42");
        assert_eq!(err.to_string(), "Note not found: n-42");
    }
}
