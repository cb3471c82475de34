//! `outreach config` — Configuration commands.

use outreach_config::{AppConfig, ConfigError};
use std::path::{Path, PathBuf};

fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

pub fn print_default() {
    println!("{}", AppConfig::default_toml());
}

pub fn show(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

pub fn path(explicit: Option<&Path>) {
    println!("{}", config_path(explicit).display());
}

pub fn validate(
    explicit: Option<&Path>,
    loaded: Result<AppConfig, ConfigError>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating {}...", config_path(explicit).display());

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   ✅ Config parsed successfully");

    let mut warnings = Vec::new();
    if config.gateway.host == "0.0.0.0" {
        warnings.push("Gateway bound to 0.0.0.0; the API has no authentication");
    }
    if config.ingest.high_confidence < config.ingest.confidence_threshold {
        warnings.push("ingest.high_confidence is below the proposal threshold; every proposal will be high");
    }
    if config.ingest.synonyms.is_empty() {
        warnings.push("No header synonyms configured");
    }

    if warnings.is_empty() {
        println!("   ✅ All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   ⚠️  {w}");
        }
    }

    println!();
    println!("   Gateway:          {}:{}", config.gateway.host, config.gateway.port);
    println!("   Template version: {}", config.context.template_version);
    println!("   Default budget:   {} chars", config.context.default_budget_chars);
    println!("   Proposal cutoff:  {:.2}", config.ingest.confidence_threshold);
    println!("   Log format:       {:?}", config.logging.format);

    Ok(())
}
