//! Outreach CLI — the main entry point.
//!
//! Commands:
//! - `serve`    — Start the HTTP API over an in-memory workspace
//! - `fields`   — List the fields a seed defines
//! - `map`      — Propose header mappings for a CSV file
//! - `import`   — Commit a CSV file under a confirmed mapping
//! - `preview`  — Import, then construct a context for one record
//! - `config`   — Print, locate or validate configuration

use clap::{Parser, Subcommand};
use outreach_config::{AppConfig, LogFormat};
use std::path::PathBuf;

mod commands;

use commands::import::MappingArgs;

#[derive(Parser)]
#[command(
    name = "outreach",
    about = "Outreach — dynamic schema and context construction engine",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.outreach/config.toml)
    #[arg(long, global = true, env = "OUTREACH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Workspace seed (fields, notes, records) to load at startup
        #[arg(long)]
        seed: Option<PathBuf>,

        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List the fields defined by a seed
    Fields {
        #[arg(long)]
        seed: PathBuf,

        /// Include inactive fields
        #[arg(long)]
        all: bool,
    },

    /// Propose header-to-field mappings for a CSV file (writes nothing)
    Map {
        csv: PathBuf,

        #[arg(long)]
        seed: PathBuf,

        /// Column holding the record key (detected when omitted)
        #[arg(long)]
        key_header: Option<String>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Commit a CSV file; invalid rows are quarantined
    Import {
        csv: PathBuf,

        #[arg(long)]
        seed: PathBuf,

        #[command(flatten)]
        mapping: MappingArgs,

        #[arg(long)]
        json: bool,
    },

    /// Import a CSV file, then construct the context for one record
    Preview {
        csv: PathBuf,

        #[arg(long)]
        seed: PathBuf,

        /// Record key to build the context for
        #[arg(long)]
        key: String,

        /// Note ids to merge, in selection order
        #[arg(long = "note", required = true)]
        notes: Vec<String>,

        #[command(flatten)]
        mapping: MappingArgs,

        #[arg(long, conflicts_with = "budget_words")]
        budget_chars: Option<usize>,

        #[arg(long)]
        budget_words: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the default configuration as TOML
    Default,
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Check the config file for errors
    Validate,
}

fn init_tracing(verbose: bool, config: &AppConfig) {
    let filter = if verbose { "debug" } else { config.logging.level.as_str() };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    match config.logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let loaded = commands::load_config(cli.config.as_deref());
    if let Commands::Config {
        action: Some(ConfigAction::Validate),
    } = &cli.command
    {
        return commands::config_cmd::validate(cli.config.as_deref(), loaded);
    }
    let config = loaded?;
    init_tracing(cli.verbose, &config);

    match cli.command {
        Commands::Serve { seed, port } => commands::serve::run(config, seed, port).await?,
        Commands::Fields { seed, all } => commands::fields::run(config, &seed, all).await?,
        Commands::Map {
            csv,
            seed,
            key_header,
            json,
        } => commands::map::run(config, &csv, &seed, key_header.as_deref(), json).await?,
        Commands::Import {
            csv,
            seed,
            mapping,
            json,
        } => commands::import::run(config, &csv, &seed, &mapping, json).await?,
        Commands::Preview {
            csv,
            seed,
            key,
            notes,
            mapping,
            budget_chars,
            budget_words,
            json,
        } => {
            let budget = commands::preview::budget(budget_chars, budget_words);
            commands::preview::run(config, &csv, &seed, &key, notes, &mapping, budget, json).await?
        }
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Default) {
            ConfigAction::Default => commands::config_cmd::print_default(),
            ConfigAction::Show => commands::config_cmd::show(&config)?,
            ConfigAction::Path => commands::config_cmd::path(cli.config.as_deref()),
            ConfigAction::Validate => commands::config_cmd::validate(cli.config.as_deref(), Ok(config))?,
        },
    }

    Ok(())
}
