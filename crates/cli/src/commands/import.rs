//! `outreach import` — Commit a CSV file under a confirmed mapping.

use clap::Args;
use outreach_config::AppConfig;
use outreach_core::error::MappingError;
use outreach_ingest::{CommitReport, ConfirmedMapping, HeaderAction, HeaderStatus, Table, UnmappedReason};
use outreach_service::OutreachService;
use std::path::Path;

use super::workspace;

/// How table headers map onto the schema.
#[derive(Args, Debug, Clone, Default)]
pub struct MappingArgs {
    /// Column holding the record key
    #[arg(long)]
    pub key_header: Option<String>,

    /// `Header=field` to map, `Header=-` to skip, `Header=~name` to keep unschematized
    #[arg(long = "map", value_name = "HEADER=TARGET")]
    pub maps: Vec<String>,

    /// Start from the proposed mappings; explicit --map entries override them
    #[arg(long)]
    pub accept_proposals: bool,
}

pub async fn run(
    config: AppConfig,
    csv: &Path,
    seed: &Path,
    args: &MappingArgs,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = workspace::open(config, Some(seed)).await?;
    let table = workspace::read_table(&service, csv)?;
    let mapping = build_mapping(&service, &table, args).await?;
    let report = service.commit_mapping(&table, &mapping).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Turn command-line choices into a confirmed mapping.
pub async fn build_mapping(
    service: &OutreachService,
    table: &Table,
    args: &MappingArgs,
) -> Result<ConfirmedMapping, Box<dyn std::error::Error>> {
    let overrides = args
        .maps
        .iter()
        .map(|raw| parse_map_arg(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let mut mapping = if args.accept_proposals {
        let proposal = service
            .propose_mapping(table, args.key_header.as_deref())
            .await?;
        // Ambiguous headers need an explicit --map; never pick one silently.
        for h in &proposal.headers {
            if let HeaderStatus::Unmapped {
                reason: UnmappedReason::Ambiguous { candidates },
            } = &h.status
            {
                if !overrides.iter().any(|(header, _)| header == &h.header) {
                    return Err(MappingError::Ambiguous {
                        header: h.header.clone(),
                        candidates: candidates.clone(),
                    }
                    .into());
                }
            }
        }
        ConfirmedMapping::from_proposals(&proposal)?
    } else {
        let key = args
            .key_header
            .clone()
            .ok_or("--key-header is required unless --accept-proposals is given")?;
        ConfirmedMapping::new(key)
    };

    for (header, action) in overrides {
        mapping.columns.insert(header, action);
    }
    Ok(mapping)
}

/// Parse one `--map` value.
pub fn parse_map_arg(raw: &str) -> Result<(String, HeaderAction), String> {
    let (header, target) = raw
        .split_once('=')
        .ok_or_else(|| format!("--map expects HEADER=TARGET, got '{raw}'"))?;
    let header = header.trim();
    let target = target.trim();
    if header.is_empty() || target.is_empty() {
        return Err(format!("--map expects HEADER=TARGET, got '{raw}'"));
    }

    let action = match target {
        "-" => HeaderAction::Skip,
        t => match t.strip_prefix('~') {
            Some(name) => HeaderAction::Unschematized {
                name: name.trim().to_string(),
            },
            None => HeaderAction::Field { name: t.to_string() },
        },
    };
    Ok((header.to_string(), action))
}

pub fn print_report(report: &CommitReport) {
    let t = &report.totals;
    println!(
        "Imported {} of {} rows ({} created, {} updated, {} quarantined)",
        t.accepted, t.rows, t.created, t.updated, t.quarantined
    );
    for q in &report.quarantined {
        let key = q.key.as_deref().unwrap_or("-");
        for issue in &q.issues {
            let field = issue.field.as_deref().unwrap_or("-");
            println!("   ❌ row {} [{key}] {field}: {}", q.row, issue.reason);
        }
    }
    for w in &report.warnings {
        println!("   ⚠️  {w}");
    }
    if !report.unschematized.is_empty() {
        let names: Vec<&str> = report.unschematized.iter().map(String::as_str).collect();
        println!("   Stored outside the schema: {}", names.join(", "));
    }
    if report.aliases_learned > 0 {
        println!("   Learned {} header aliases", report.aliases_learned);
    }
}
