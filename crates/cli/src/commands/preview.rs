//! `outreach preview` — Import a CSV file and construct one record's context.

use outreach_config::AppConfig;
use outreach_core::context::{LengthBudget, NoteFate};
use outreach_core::note::ContextSelection;
use outreach_service::ContextRequest;
use std::path::Path;

use super::import::{self, MappingArgs};
use super::workspace;

/// Budget from the mutually exclusive command-line limits.
pub fn budget(chars: Option<usize>, words: Option<usize>) -> Option<LengthBudget> {
    match (chars, words) {
        (Some(n), _) => Some(LengthBudget::Chars(n)),
        (None, Some(n)) => Some(LengthBudget::Words(n)),
        (None, None) => None,
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn run(
    config: AppConfig,
    csv: &Path,
    seed: &Path,
    key: &str,
    notes: Vec<String>,
    args: &MappingArgs,
    budget: Option<LengthBudget>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = workspace::open(config, Some(seed)).await?;
    let table = workspace::read_table(&service, csv)?;
    let mapping = import::build_mapping(&service, &table, args).await?;
    let commit = service.commit_mapping(&table, &mapping).await?;
    if !json {
        import::print_report(&commit);
        println!();
    }

    let mut request = ContextRequest::new(key, ContextSelection::from_ids(notes));
    request.budget = budget;
    let built = service.preview_context(&request).await?;
    let ctx = &built.context;

    if json {
        println!("{}", serde_json::to_string_pretty(&**ctx)?);
        return Ok(());
    }

    println!("Context for {} ({}, budget {})", ctx.record_key, ctx.template_version, ctx.budget.describe());
    println!("{}", "─".repeat(60));
    println!("{}", ctx.text);
    println!("{}", "─".repeat(60));
    for n in &ctx.provenance.notes {
        println!("  {:<20} {}", n.note_id, describe_fate(&n.fate));
    }
    if ctx.truncated {
        println!("   ⚠️  Output was truncated to fit the budget");
    }
    println!("   Hash: {}", ctx.context_hash);
    Ok(())
}

fn describe_fate(fate: &NoteFate) -> String {
    match fate {
        NoteFate::Included => "included".into(),
        NoteFate::OmittedMissingFields { fields } => format!("omitted (missing {})", fields.join(", ")),
        NoteFate::Inactive => "skipped (inactive)".into(),
        NoteFate::DuplicateOf { note_id } => format!("skipped (duplicate of {note_id})"),
        NoteFate::DroppedForBudget => "dropped for budget".into(),
        NoteFate::Truncated => "truncated".into(),
    }
}
