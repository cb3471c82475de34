//! Shared setup: an in-memory service, optionally seeded, and CSV input.

use outreach_config::AppConfig;
use outreach_ingest::Table;
use outreach_service::{OutreachService, WorkspaceSeed};
use std::path::Path;
use tracing::info;

/// A fresh service with `seed` applied.
pub async fn open(config: AppConfig, seed: Option<&Path>) -> Result<OutreachService, Box<dyn std::error::Error>> {
    let service = OutreachService::new(config);
    if let Some(path) = seed {
        let summary = service.apply_seed(WorkspaceSeed::load(path)?).await?;
        info!(
            seed = %path.display(),
            fields = summary.fields,
            notes = summary.notes,
            records = summary.records,
            "Workspace seeded"
        );
    }
    Ok(service)
}

pub fn read_table(service: &OutreachService, path: &Path) -> Result<Table, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    Ok(service.parse_csv_bytes(&bytes)?)
}
