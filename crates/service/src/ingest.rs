// ── Ingestion contract ──

use chrono::Utc;
use outreach_core::error::Result;
use outreach_core::event::DomainEvent;
use outreach_ingest::{CommitReport, ConfirmedMapping, MappingReport, Table};
use tracing::info;

use crate::OutreachService;

impl OutreachService {
    /// Parse CSV text into a table.
    pub fn parse_csv(&self, text: &str) -> Result<Table> {
        self.parse_csv_bytes(text.as_bytes())
    }

    /// Parse raw CSV bytes. Rows that are not valid UTF-8 are kept and
    /// quarantined at commit.
    pub fn parse_csv_bytes(&self, bytes: &[u8]) -> Result<Table> {
        Table::from_csv(bytes)
    }

    /// Propose header mappings. Nothing is written; the caller confirms
    /// (possibly edited) proposals through [`commit_mapping`](Self::commit_mapping).
    pub async fn propose_mapping(&self, table: &Table, key_header: Option<&str>) -> Result<MappingReport> {
        let snapshot = self.registry.snapshot().await;
        let report = self.mapper.propose(table, &snapshot, key_header).await?;
        info!(
            headers = report.headers.len(),
            rows = report.row_count,
            strategy = %report.strategy,
            schema_version = report.schema_version,
            "Mapping proposed"
        );
        Ok(report)
    }

    /// Write every valid row under `mapping`; invalid rows are quarantined.
    pub async fn commit_mapping(&self, table: &Table, mapping: &ConfirmedMapping) -> Result<CommitReport> {
        let report = self.committer.commit(table, mapping).await?;
        info!(
            accepted = report.totals.accepted,
            quarantined = report.totals.quarantined,
            created = report.totals.created,
            updated = report.totals.updated,
            "Batch committed"
        );
        self.events.publish(DomainEvent::BatchCommitted {
            accepted: report.totals.accepted,
            quarantined: report.totals.quarantined,
            timestamp: Utc::now(),
        });
        Ok(report)
    }
}
