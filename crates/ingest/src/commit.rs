//! Row-granular commit of a confirmed mapping.
//!
//! Every row ends up either accepted (written to the record store) or
//! quarantined with the issues that stopped it. One bad row never blocks
//! the rest of the batch.

use futures::stream::{self, StreamExt};
use outreach_core::error::{ConflictError, EntityKind, Error, MappingError, Result, Rule, SchemaError};
use outreach_core::field::normalize_field_name;
use outreach_core::keylock::KeyLocks;
use outreach_core::report::{Issue, Severity, Subject};
use outreach_core::store::RecordStore;
use outreach_schema::{FieldRegistry, SchemaSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::mapper::{HeaderStatus, MappingReport};
use crate::table::{Table, TableRow};

/// Validation passes per row before giving up on a schema that keeps moving.
const MAX_ATTEMPTS: usize = 3;

/// What to do with one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HeaderAction {
    /// Validate the cell against this active field.
    Field { name: String },
    /// Store the cell as-is under `name`, outside the schema.
    Unschematized { name: String },
    Skip,
}

/// The caller's decision on how a table maps onto the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedMapping {
    /// Column holding the record key.
    pub key_header: String,
    #[serde(default)]
    pub columns: BTreeMap<String, HeaderAction>,
    /// Schema version of the proposal this confirmation was based on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_version: Option<u64>,
}

impl ConfirmedMapping {
    pub fn new(key_header: impl Into<String>) -> Self {
        Self {
            key_header: key_header.into(),
            columns: BTreeMap::new(),
            proposal_version: None,
        }
    }

    pub fn map_field(mut self, header: impl Into<String>, field: impl Into<String>) -> Self {
        self.columns
            .insert(header.into(), HeaderAction::Field { name: field.into() });
        self
    }

    pub fn keep_unschematized(mut self, header: impl Into<String>, name: impl Into<String>) -> Self {
        self.columns
            .insert(header.into(), HeaderAction::Unschematized { name: name.into() });
        self
    }

    pub fn skip(mut self, header: impl Into<String>) -> Self {
        self.columns.insert(header.into(), HeaderAction::Skip);
        self
    }

    /// Accept every proposal as-is. Headers without one are skipped.
    pub fn from_proposals(report: &MappingReport) -> Result<Self> {
        let key_header = report
            .key_header
            .clone()
            .ok_or(MappingError::MissingKeyHeader)?;
        let mut mapping = Self::new(key_header);
        mapping.proposal_version = Some(report.schema_version);
        for h in &report.headers {
            if h.header == mapping.key_header {
                continue;
            }
            let action = match &h.status {
                HeaderStatus::Proposed { field, .. } => HeaderAction::Field { name: field.clone() },
                _ => HeaderAction::Skip,
            };
            mapping.columns.insert(h.header.clone(), action);
        }
        Ok(mapping)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedRow {
    pub row: usize,
    pub key: String,
    pub created: bool,
    /// Names this row wrote outside the schema.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unschematized: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarantinedRow {
    pub row: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitTotals {
    pub rows: usize,
    pub accepted: usize,
    pub quarantined: usize,
    pub created: usize,
    pub updated: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitReport {
    pub accepted: Vec<AcceptedRow>,
    pub quarantined: Vec<QuarantinedRow>,
    pub warnings: Vec<String>,
    pub totals: CommitTotals,
    /// Registry version when the batch started.
    pub schema_version: u64,
    /// Header spellings newly remembered as field aliases.
    pub aliases_learned: usize,
    /// Every name the batch wrote outside the schema; candidates for new fields.
    #[serde(default)]
    pub unschematized: BTreeSet<String>,
}

/// A mapping resolved against one table and one schema snapshot.
struct Plan {
    key_column: usize,
    /// (column, attribute name) for every column that is written.
    columns: Vec<(usize, String)>,
    /// (field, header) pairs for alias learning.
    field_headers: Vec<(String, String)>,
}

enum RowOutcome {
    Accepted(AcceptedRow),
    Quarantined(QuarantinedRow),
}

fn quarantine(row: usize, key: Option<&str>, rule: Option<Rule>, reason: impl Into<String>) -> RowOutcome {
    RowOutcome::Quarantined(QuarantinedRow {
        row,
        key: key.map(str::to_string),
        issues: vec![Issue {
            subject: Subject::Row(row),
            field: None,
            severity: Severity::Error,
            rule,
            reason: reason.into(),
        }],
    })
}

pub struct BatchCommitter {
    registry: FieldRegistry,
    store: Arc<dyn RecordStore>,
    locks: Arc<KeyLocks>,
    concurrency: usize,
}

impl BatchCommitter {
    pub fn new(registry: FieldRegistry, store: Arc<dyn RecordStore>, locks: Arc<KeyLocks>, concurrency: usize) -> Self {
        Self {
            registry,
            store,
            locks,
            concurrency: concurrency.max(1),
        }
    }

    /// Validate and write every row of `table` under `mapping`.
    ///
    /// Errors are returned only when the mapping itself is unusable; in that
    /// case no row has been touched.
    pub async fn commit(&self, table: &Table, mapping: &ConfirmedMapping) -> Result<CommitReport> {
        let snapshot = self.registry.snapshot().await;
        let (plan, mut warnings) = resolve(table, mapping, &snapshot)?;
        warnings.extend(repeated_keys(table, plan.key_column));

        let pending: Vec<_> = table
            .rows
            .iter()
            .map(|row| self.commit_row(row, &plan, &snapshot))
            .collect();
        let outcomes: Vec<RowOutcome> = stream::iter(pending)
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = CommitReport {
            accepted: Vec::new(),
            quarantined: Vec::new(),
            warnings,
            totals: CommitTotals {
                rows: table.len(),
                ..Default::default()
            },
            schema_version: snapshot.version,
            aliases_learned: 0,
            unschematized: BTreeSet::new(),
        };
        for outcome in outcomes {
            match outcome {
                RowOutcome::Accepted(row) => {
                    if row.created {
                        report.totals.created += 1;
                    } else {
                        report.totals.updated += 1;
                    }
                    report.unschematized.extend(row.unschematized.iter().cloned());
                    report.accepted.push(row);
                }
                RowOutcome::Quarantined(row) => report.quarantined.push(row),
            }
        }
        report.totals.accepted = report.accepted.len();
        report.totals.quarantined = report.quarantined.len();

        if !report.accepted.is_empty() {
            report.aliases_learned = self.registry.record_aliases(&plan.field_headers).await;
        }

        info!(
            rows = report.totals.rows,
            accepted = report.totals.accepted,
            quarantined = report.totals.quarantined,
            schema_version = report.schema_version,
            "Batch committed"
        );
        if !report.unschematized.is_empty() {
            info!(names = ?report.unschematized, "Batch stored values outside the schema");
        }
        Ok(report)
    }

    async fn commit_row(&self, row: &TableRow, plan: &Plan, batch: &SchemaSnapshot) -> RowOutcome {
        let subject = Subject::Row(row.number);
        if let Some(defect) = &row.defect {
            let key = row.cell(plan.key_column);
            let key = (!key.is_empty() && !key.contains('\u{fffd}')).then_some(key);
            return quarantine(row.number, key, Some(Rule::RowShape), format!("row is unreadable: {defect}"));
        }
        if !row.overflow.is_empty() {
            return quarantine(
                row.number,
                None,
                Some(Rule::RowShape),
                format!("row has {} more cells than the header", row.overflow.len()),
            );
        }

        let key = row.cell(plan.key_column);
        if key.is_empty() {
            return quarantine(row.number, None, Some(Rule::RecordKey), "record key is empty");
        }

        let raw: Vec<(String, Value)> = plan
            .columns
            .iter()
            .map(|(col, name)| (name.clone(), Value::String(row.cell(*col).to_string())))
            .collect();

        let _guard = self.locks.acquire(key).await;
        let mut snapshot = Cow::Borrowed(batch);
        for attempt in 1..=MAX_ATTEMPTS {
            // Re-read each pass; the required check depends on the stored record.
            let existing = match self.store.get(key).await {
                Ok(existing) => existing,
                Err(e) => return quarantine(row.number, Some(key), None, e.to_string()),
            };
            let check = snapshot.validate_attributes(
                &subject,
                raw.iter().cloned(),
                existing.as_ref().map(|r| &r.attributes),
            );
            if !check.is_valid() {
                debug!(row = row.number, key, "Row quarantined");
                return RowOutcome::Quarantined(QuarantinedRow {
                    row: row.number,
                    key: Some(key.to_string()),
                    issues: check.report.issues,
                });
            }

            let current = self.registry.version().await;
            if current != snapshot.version {
                debug!(row = row.number, attempt, from = snapshot.version, to = current, "Schema moved, revalidating row");
                snapshot = Cow::Owned(self.registry.snapshot().await);
                continue;
            }

            return match self.store.upsert(key, check.attributes, None).await {
                Ok(outcome) => RowOutcome::Accepted(AcceptedRow {
                    row: row.number,
                    key: key.to_string(),
                    created: outcome.created,
                    unschematized: check.unschematized,
                }),
                Err(e) => {
                    warn!(row = row.number, key, error = %e, "Row write failed");
                    quarantine(row.number, Some(key), None, e.to_string())
                }
            };
        }

        quarantine(
            row.number,
            Some(key),
            None,
            "schema changed repeatedly while the row was being committed; retry the row",
        )
    }
}

/// Check the mapping against the table and schema before any row is touched.
fn resolve(table: &Table, mapping: &ConfirmedMapping, snapshot: &SchemaSnapshot) -> Result<(Plan, Vec<String>)> {
    let mut warnings = Vec::new();

    let key_header = mapping.key_header.trim();
    if key_header.is_empty() {
        return Err(MappingError::MissingKeyHeader.into());
    }
    let key_column = table
        .column(key_header)
        .ok_or_else(|| MappingError::UnknownHeader(key_header.to_string()))?;

    let mut columns = Vec::new();
    let mut field_headers = Vec::new();
    let mut targets: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (header, action) in &mapping.columns {
        let column = table
            .column(header)
            .ok_or_else(|| MappingError::UnknownHeader(header.clone()))?;
        let target = match action {
            HeaderAction::Skip => continue,
            HeaderAction::Field { name } => {
                let def = snapshot
                    .field(name)
                    .ok_or_else(|| Error::not_found(EntityKind::Field, name.as_str()))?;
                field_headers.push((def.name.clone(), header.clone()));
                def.name.clone()
            }
            HeaderAction::Unschematized { name } => {
                let name = normalize_field_name(name)?;
                if snapshot.field(&name).is_some() {
                    return Err(SchemaError::InvalidName {
                        name,
                        reason: "an active field has this name; map the column to the field instead".into(),
                    }
                    .into());
                }
                name
            }
        };
        targets.entry(target.clone()).or_default().push(header.clone());
        columns.push((column, target));
    }

    if let Some((field, headers)) = targets.iter().find(|(_, headers)| headers.len() > 1) {
        return Err(ConflictError::DuplicateMappingTarget {
            field: field.clone(),
            headers: headers.clone(),
        }
        .into());
    }

    for header in &table.headers {
        if header != key_header && !mapping.columns.contains_key(header) {
            warnings.push(format!("header '{header}' is not in the mapping and was skipped"));
        }
    }
    for def in snapshot.fields.iter().filter(|f| f.required) {
        if !targets.contains_key(&def.name) {
            warnings.push(format!(
                "required field '{}' is not mapped; rows for new records will be quarantined",
                def.name
            ));
        }
    }
    if let Some(v) = mapping.proposal_version {
        if v != snapshot.version {
            warnings.push(format!(
                "mapping was proposed against schema version {v}, committing against version {}",
                snapshot.version
            ));
        }
    }

    Ok((
        Plan {
            key_column,
            columns,
            field_headers,
        },
        warnings,
    ))
}

fn repeated_keys(table: &Table, key_column: usize) -> Vec<String> {
    let mut first: HashMap<&str, usize> = HashMap::new();
    let mut warnings = Vec::new();
    for row in &table.rows {
        let key = row.cell(key_column);
        if key.is_empty() {
            continue;
        }
        if let Some(earlier) = first.get(key) {
            warnings.push(format!(
                "row {} repeats key '{key}' from row {earlier}; its values are merged over the earlier row",
                row.number
            ));
        } else {
            first.insert(key, row.number);
        }
    }
    warnings
}
