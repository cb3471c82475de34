//! `outreach map` — Propose header mappings for a CSV file.

use outreach_config::AppConfig;
use outreach_ingest::{HeaderMapping, HeaderStatus, MappingReport, UnmappedReason};
use std::path::Path;

use super::workspace;

pub async fn run(
    config: AppConfig,
    csv: &Path,
    seed: &Path,
    key_header: Option<&str>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = workspace::open(config, Some(seed)).await?;
    let table = workspace::read_table(&service, csv)?;
    let report = service.propose_mapping(&table, key_header).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

pub fn print_report(report: &MappingReport) {
    println!(
        "Mapping proposal: {} headers, {} rows (schema v{}, strategy {})",
        report.headers.len(),
        report.row_count,
        report.schema_version,
        report.strategy
    );
    match &report.key_header {
        Some(key) => println!("   Key column: {key}"),
        None => println!("   Key column: none detected (pass --key-header)"),
    }
    println!();
    for h in &report.headers {
        println!("  {:<24} {}", h.header, describe(h));
    }
    for w in &report.warnings {
        println!("   ⚠️  {w}");
    }
    println!();
    println!("   Nothing was written. Confirm with `outreach import`.");
}

/// One-line summary of a header's proposal.
pub fn describe(h: &HeaderMapping) -> String {
    match &h.status {
        HeaderStatus::Proposed {
            field,
            confidence,
            band,
        } => format!("→ {field} ({:.0}%, {band:?})", confidence * 100.0),
        HeaderStatus::Unmapped { reason } => match reason {
            UnmappedReason::KeySource => "record key".to_string(),
            UnmappedReason::BelowThreshold => "unmapped (no confident match)".to_string(),
            UnmappedReason::Ambiguous { candidates } => {
                format!("ambiguous: {}", candidates.join(" | "))
            }
            UnmappedReason::LostConflict { field, winner } => {
                format!("unmapped ({field} taken by '{winner}')")
            }
        },
        HeaderStatus::NewFieldSuggestion {
            name, field_type, ..
        } => format!("new field? {name} ({})", field_type.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outreach_core::field::FieldType;
    use outreach_ingest::ConfidenceBand;

    fn header(status: HeaderStatus) -> HeaderMapping {
        HeaderMapping {
            header: "Award".into(),
            column: 2,
            status,
            inferred_type: FieldType::Number,
            alternatives: Vec::new(),
            samples: vec!["50000".into()],
        }
    }

    #[test]
    fn describes_proposal() {
        let h = header(HeaderStatus::Proposed {
            field: "scholarship_amount".into(),
            confidence: 0.72,
            band: ConfidenceBand::Medium,
        });
        assert_eq!(describe(&h), "→ scholarship_amount (72%, Medium)");
    }

    #[test]
    fn describes_conflict_loser() {
        let h = header(HeaderStatus::Unmapped {
            reason: UnmappedReason::LostConflict {
                field: "student_name".into(),
                winner: "Name".into(),
            },
        });
        assert_eq!(describe(&h), "unmapped (student_name taken by 'Name')");
    }
}
