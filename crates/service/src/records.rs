use chrono::Utc;
use outreach_core::error::{EntityKind, Error, Result, Rule};
use outreach_core::event::DomainEvent;
use outreach_core::record::{Record, RecordFilter, RecordStatus};
use outreach_core::report::{Subject, ValidationReport};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::{OutreachService, WRITE_ATTEMPTS};

/// Outcome of re-checking one record against the current schema.
#[derive(Debug, Clone, Serialize)]
pub struct Revalidation {
    pub record: Record,
    /// Empty when every stored value passed.
    pub report: ValidationReport,
}

/// Result of one record write.
#[derive(Debug, Clone, Serialize)]
pub struct RecordWrite {
    pub created: bool,
    pub record: Record,
    /// Names in this write that matched no active field and were stored as-is.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unschematized: Vec<String>,
}

impl OutreachService {
    /// Validate and merge `attributes` into the record under `key`.
    ///
    /// Values under unknown names are stored unschematized. Nothing is
    /// written if any value fails.
    pub async fn put_record(
        &self,
        key: &str,
        attributes: BTreeMap<String, Value>,
        priority: Option<i32>,
    ) -> Result<RecordWrite> {
        let key = key.trim();
        if key.is_empty() {
            let mut report = ValidationReport::new();
            report.error(
                Subject::Record(String::new()),
                None,
                Some(Rule::RecordKey),
                "record key is empty",
            );
            return Err(Error::Validation(report));
        }

        let _guard = self.locks.acquire(key).await;
        let subject = Subject::Record(key.to_string());
        let existing = self.records.get(key).await?;

        for attempt in 1..=WRITE_ATTEMPTS {
            let snapshot = self.registry.snapshot().await;
            let check = snapshot.validate_attributes(
                &subject,
                attributes.clone(),
                existing.as_ref().map(|r| &r.attributes),
            );
            if !check.is_valid() {
                return Err(Error::Validation(check.report));
            }
            if self.registry.version().await != snapshot.version {
                warn!(record_key = key, attempt, "Schema changed during write; revalidating");
                continue;
            }

            let outcome = self.records.upsert(key, check.attributes, priority).await?;
            info!(record_key = key, created = outcome.created, "Record written");
            if !check.unschematized.is_empty() {
                info!(record_key = key, names = ?check.unschematized, "Values stored outside the schema");
            }
            self.events.publish(DomainEvent::RecordWritten {
                key: key.to_string(),
                created: outcome.created,
                timestamp: Utc::now(),
            });
            return Ok(RecordWrite {
                created: outcome.created,
                record: outcome.record,
                unschematized: check.unschematized,
            });
        }

        Err(Error::Internal(format!(
            "schema kept changing while writing record '{key}'"
        )))
    }

    pub async fn get_record(&self, key: &str) -> Result<Record> {
        self.records
            .get(key)
            .await?
            .ok_or_else(|| Error::not_found(EntityKind::Record, key))
    }

    pub async fn list_records(&self, filter: &RecordFilter) -> Result<Vec<Record>> {
        self.records.list(filter).await
    }

    pub async fn count_records(&self) -> Result<usize> {
        self.records.count().await
    }

    pub async fn set_record_status(&self, key: &str, status: RecordStatus) -> Result<Record> {
        self.records
            .set_status(key, status)
            .await?
            .ok_or_else(|| Error::not_found(EntityKind::Record, key))
    }

    /// Re-check a record's stored values. Passing values are re-tagged and
    /// the revalidation flag cleared; otherwise the flag stays set and the
    /// report names the failures.
    pub async fn revalidate_record(&self, key: &str) -> Result<Revalidation> {
        let _guard = self.locks.acquire(key).await;
        let record = self.get_record(key).await?;
        let snapshot = self.registry.snapshot().await;
        let check = snapshot.revalidate_attributes(&Subject::Record(key.to_string()), &record.attributes);

        if !check.is_valid() {
            self.records.set_needs_revalidation(&[key.to_string()], true).await?;
            let record = self.get_record(key).await?;
            return Ok(Revalidation {
                record,
                report: check.report,
            });
        }

        self.records.upsert(key, check.attributes, None).await?;
        self.records.set_needs_revalidation(&[key.to_string()], false).await?;
        Ok(Revalidation {
            record: self.get_record(key).await?,
            report: check.report,
        })
    }

    pub async fn delete_record(&self, key: &str) -> Result<()> {
        let _guard = self.locks.acquire(key).await;
        if !self.records.delete(key).await? {
            return Err(Error::not_found(EntityKind::Record, key));
        }
        info!(record_key = key, "Record deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::OutreachService;
    use outreach_config::AppConfig;
    use outreach_core::error::{Error, Rule};
    use outreach_core::field::{FieldSpec, FieldType};
    use outreach_core::record::RecordStatus;
    use outreach_core::value::{AttributeValue, Money, TypedValue};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn attrs(pairs: &[(&str, serde_json::Value)]) -> BTreeMap<String, serde_json::Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    async fn service() -> OutreachService {
        let svc = OutreachService::new(AppConfig::default());
        svc.define_field(FieldSpec::new("student_name", FieldType::Text).required())
            .await
            .unwrap();
        svc.define_field(FieldSpec::new("scholarship_amount", FieldType::Currency))
            .await
            .unwrap();
        svc
    }

    #[tokio::test]
    async fn put_types_values_and_merges() {
        let svc = service().await;
        let first = svc
            .put_record("9876543210", attrs(&[("student_name", json!("Rahul Sharma"))]), Some(2))
            .await
            .unwrap();
        assert!(first.created);

        let second = svc
            .put_record("9876543210", attrs(&[("Scholarship_Amount", json!("50000"))]), None)
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.record.priority, 2);
        assert_eq!(
            second.record.attribute("scholarship_amount"),
            Some(&AttributeValue::Typed(TypedValue::Currency(Money::from_minor(5_000_000))))
        );
        assert!(second.record.attribute("student_name").is_some());
        assert!(first.unschematized.is_empty());
        assert!(second.unschematized.is_empty());
    }

    #[tokio::test]
    async fn unknown_names_surfaced_on_write() {
        let svc = service().await;
        let write = svc
            .put_record(
                "1",
                attrs(&[("student_name", json!("Priya")), ("Home City", json!("Pune")), ("notes", json!(""))]),
                None,
            )
            .await
            .unwrap();
        assert_eq!(write.unschematized, vec!["home_city"]);
        assert!(write.record.attribute("home_city").unwrap().is_unschematized());
        assert!(write.record.attribute("notes").is_none());
    }

    #[tokio::test]
    async fn invalid_value_writes_nothing() {
        let svc = service().await;
        let err = svc
            .put_record(
                "1",
                attrs(&[("student_name", json!("Priya")), ("scholarship_amount", json!("lots"))]),
                None,
            )
            .await
            .unwrap_err();
        match err {
            Error::Validation(report) => assert_eq!(report.errors().count(), 1),
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(svc.get_record("1").await, Err(Error::NotFound { .. })));
    }

    #[tokio::test]
    async fn empty_key_rejected() {
        let svc = service().await;
        match svc.put_record("  ", attrs(&[]), None).await {
            Err(Error::Validation(report)) => {
                assert_eq!(report.errors().next().unwrap().rule, Some(Rule::RecordKey));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_and_delete() {
        let svc = service().await;
        svc.put_record("1", attrs(&[("student_name", json!("Priya"))]), None)
            .await
            .unwrap();
        let record = svc.set_record_status("1", RecordStatus::Completed).await.unwrap();
        assert_eq!(record.status, RecordStatus::Completed);

        svc.delete_record("1").await.unwrap();
        assert!(matches!(svc.delete_record("1").await, Err(Error::NotFound { .. })));
        assert!(matches!(
            svc.set_record_status("1", RecordStatus::Busy).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn failing_revalidation_keeps_flag() {
        let svc = service().await;
        svc.put_record("1", attrs(&[("student_name", json!("Priya")), ("grade", json!("A"))]), None)
            .await
            .unwrap();
        svc.define_field(FieldSpec::new("grade", FieldType::Number)).await.unwrap();

        let result = svc.revalidate_record("1").await.unwrap();
        assert!(result.report.has_errors());
        assert!(result.record.needs_revalidation);
        assert!(result.record.attribute("grade").unwrap().is_unschematized());
    }
}
