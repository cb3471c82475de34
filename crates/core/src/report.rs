//! Structured validation reporting.
//!
//! Every expected failure the registry, the record write path, and the
//! ingestion mapper produce is described here: who it concerns, which
//! field, how severe, and a reason a human can act on.

use crate::error::{Rule, ValidationError};
use serde::{Deserialize, Serialize};

/// `Error` blocks a write; `Warning` is informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// What an issue is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Subject {
    /// 1-based data row number (header excluded).
    Row(usize),
    Record(String),
    Field(String),
    Note(String),
    Batch,
}

/// A single finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub subject: Subject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<Rule>,
    pub reason: String,
}

/// An ordered list of issues.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, subject: Subject, field: Option<&str>, rule: Option<Rule>, reason: impl Into<String>) {
        self.issues.push(Issue {
            subject,
            field: field.map(str::to_string),
            severity: Severity::Error,
            rule,
            reason: reason.into(),
        });
    }

    pub fn warning(&mut self, subject: Subject, field: Option<&str>, reason: impl Into<String>) {
        self.issues.push(Issue {
            subject,
            field: field.map(str::to_string),
            severity: Severity::Warning,
            rule: None,
            reason: reason.into(),
        });
    }

    /// Record a failed value check as a blocking issue.
    pub fn reject(&mut self, subject: Subject, err: ValidationError) {
        self.issues.push(Issue {
            subject,
            field: Some(err.field),
            severity: Severity::Error,
            rule: Some(err.rule),
            reason: err.reason,
        });
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.issues.extend(other.issues);
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for issue in self.errors() {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            match &issue.field {
                Some(field) => write!(f, "{field}: {}", issue.reason)?,
                None => f.write_str(&issue.reason)?,
            }
        }
        if first {
            f.write_str("no blocking issues")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_do_not_block() {
        let mut report = ValidationReport::new();
        report.warning(Subject::Batch, None, "schema changed since proposal");
        assert!(!report.has_errors());
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn rejected_value_keeps_field_and_rule() {
        let mut report = ValidationReport::new();
        report.reject(
            Subject::Row(3),
            ValidationError::new("scholarship_amount", Rule::NonNegative, "cannot be negative"),
        );
        assert!(report.has_errors());
        let issue = report.errors().next().unwrap();
        assert_eq!(issue.field.as_deref(), Some("scholarship_amount"));
        assert_eq!(issue.rule, Some(Rule::NonNegative));
        assert_eq!(report.to_string(), "scholarship_amount: cannot be negative");
    }

    #[test]
    fn subject_serializes_tagged() {
        let json = serde_json::to_string(&Subject::Row(2)).unwrap();
        assert_eq!(json, r#"{"type":"row","id":2}"#);
    }
}
