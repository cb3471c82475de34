//! `outreach serve` — Start the HTTP API server.

use outreach_config::AppConfig;
use std::path::PathBuf;
use std::sync::Arc;

use super::workspace;

pub async fn run(
    mut config: AppConfig,
    seed: Option<PathBuf>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let service = workspace::open(config.clone(), seed.as_deref()).await?;

    println!("Outreach Gateway");
    println!("   Listening:        {}:{}", config.gateway.host, config.gateway.port);
    println!("   Template version: {}", config.context.template_version);
    if let Some(seed) = &seed {
        println!("   Seed:             {}", seed.display());
    }

    outreach_gateway::start(config, Arc::new(service)).await?;

    Ok(())
}
