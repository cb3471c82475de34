//! `outreach fields` — List the schema a seed defines.

use outreach_config::AppConfig;
use std::path::Path;

use super::workspace;

pub async fn run(config: AppConfig, seed: &Path, include_inactive: bool) -> Result<(), Box<dyn std::error::Error>> {
    let service = workspace::open(config, Some(seed)).await?;
    let fields = service.list_fields(include_inactive).await;
    let version = service.schema_snapshot().await.version;

    println!("Schema version {version} ({} fields)", fields.len());
    println!();
    println!("  {:<24} {:<14} {:<9} {:<7} LABEL", "NAME", "TYPE", "REQUIRED", "ORDER");
    for f in &fields {
        let name = if f.active {
            f.name.clone()
        } else {
            format!("{} (inactive)", f.name)
        };
        println!(
            "  {:<24} {:<14} {:<9} {:<7} {}",
            name,
            f.field_type.as_str(),
            if f.required { "yes" } else { "no" },
            f.display_order,
            f.label
        );
        if !f.options.is_empty() {
            println!("  {:<24} options: {}", "", f.options.join(", "));
        }
        if !f.aliases.is_empty() {
            println!("  {:<24} aliases: {}", "", f.aliases.join(", "));
        }
    }

    Ok(())
}
