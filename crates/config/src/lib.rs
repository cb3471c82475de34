//! Configuration loading, validation, and management for Outreach.
//!
//! Loads configuration from `~/.outreach/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.outreach/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Ingestion mapping and commit settings
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Context construction settings
    #[serde(default)]
    pub context: ContextConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Log output configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ── Ingestion ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Minimum confidence for a header→field proposal.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Proposals at or above this score are banded "high".
    #[serde(default = "default_high_confidence")]
    pub high_confidence: f32,

    /// Below this score an unmatched header becomes a new-field suggestion.
    #[serde(default = "default_suggestion_floor")]
    pub suggestion_floor: f32,

    /// Rows sampled per column for type inference.
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,

    /// Rows validated and written concurrently during commit.
    #[serde(default = "default_commit_concurrency")]
    pub commit_concurrency: usize,

    /// Deadline for an external scoring strategy before falling back.
    #[serde(default = "default_scoring_timeout_ms")]
    pub scoring_timeout_ms: u64,

    /// Header spellings recognized as the record key column.
    #[serde(default = "default_key_aliases")]
    pub key_aliases: Vec<String>,

    /// Groups of interchangeable header tokens.
    #[serde(default = "default_synonyms")]
    pub synonyms: Vec<Vec<String>>,
}

fn default_confidence_threshold() -> f32 {
    0.5
}
fn default_high_confidence() -> f32 {
    0.85
}
fn default_suggestion_floor() -> f32 {
    0.3
}
fn default_sample_rows() -> usize {
    20
}
fn default_commit_concurrency() -> usize {
    8
}
fn default_scoring_timeout_ms() -> u64 {
    2000
}
fn default_key_aliases() -> Vec<String> {
    ["phone", "mobile", "contact", "phone_number"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_synonyms() -> Vec<Vec<String>> {
    let groups: &[&[&str]] = &[
        &["phone", "mobile", "contact", "cell", "telephone"],
        &["amount", "award", "money", "grant"],
        &["percentage", "percent", "pct"],
        &["score", "marks", "points"],
        &["rank", "position", "standing"],
        &["parent", "father", "mother", "guardian"],
        &["city", "location", "town"],
        &["course", "program", "programme", "stream"],
    ];
    groups
        .iter()
        .map(|g| g.iter().map(|s| s.to_string()).collect())
        .collect()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            high_confidence: default_high_confidence(),
            suggestion_floor: default_suggestion_floor(),
            sample_rows: default_sample_rows(),
            commit_concurrency: default_commit_concurrency(),
            scoring_timeout_ms: default_scoring_timeout_ms(),
            key_aliases: default_key_aliases(),
            synonyms: default_synonyms(),
        }
    }
}

// ── Context construction ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Folded into every context hash; bump to invalidate cached scripts.
    #[serde(default = "default_template_version")]
    pub template_version: String,

    /// Blocks at least this similar to an earlier block are dropped.
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f32,

    #[serde(default = "default_budget_chars")]
    pub default_budget_chars: usize,

    /// Maximum cached constructed contexts.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// How long a finalized script stays available for hand-off.
    #[serde(default = "default_handoff_ttl_secs")]
    pub handoff_ttl_secs: u64,

    #[serde(default = "default_paragraph_separator")]
    pub paragraph_separator: String,

    #[serde(default)]
    pub locale: LocaleConfig,
}

fn default_template_version() -> String {
    "v1".into()
}
fn default_dedup_threshold() -> f32 {
    0.85
}
fn default_budget_chars() -> usize {
    1200
}
fn default_cache_capacity() -> usize {
    1024
}
fn default_handoff_ttl_secs() -> u64 {
    3600
}
fn default_paragraph_separator() -> String {
    "\n\n".into()
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            template_version: default_template_version(),
            dedup_threshold: default_dedup_threshold(),
            default_budget_chars: default_budget_chars(),
            cache_capacity: default_cache_capacity(),
            handoff_ttl_secs: default_handoff_ttl_secs(),
            paragraph_separator: default_paragraph_separator(),
            locale: LocaleConfig::default(),
        }
    }
}

/// How digits of a currency amount are grouped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigitGrouping {
    /// 12,34,567
    #[default]
    Indian,
    /// 1,234,567
    Western,
}

/// Rendering rules for typed values substituted into scripts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocaleConfig {
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,

    #[serde(default)]
    pub digit_grouping: DigitGrouping,

    /// Render `50000.00` as `50,000`.
    #[serde(default = "default_true")]
    pub trim_whole_currency: bool,

    /// chrono `strftime` pattern.
    #[serde(default = "default_date_format")]
    pub date_format: String,

    #[serde(default = "default_true_word")]
    pub true_word: String,

    #[serde(default = "default_false_word")]
    pub false_word: String,
}

fn default_currency_symbol() -> String {
    "₹".into()
}
fn default_date_format() -> String {
    "%-d %B %Y".into()
}
fn default_true_word() -> String {
    "yes".into()
}
fn default_false_word() -> String {
    "no".into()
}
fn default_true() -> bool {
    true
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            currency_symbol: default_currency_symbol(),
            digit_grouping: DigitGrouping::default(),
            trim_whole_currency: true,
            date_format: default_date_format(),
            true_word: default_true_word(),
            false_word: default_false_word(),
        }
    }
}

// ── Gateway ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Largest accepted request body (ingestion uploads included).
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_port() -> u16 {
    8470
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_body_bytes() -> usize {
    4 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

// ── Logging ──

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::ValidationError(format!(
                "unknown log format '{other}' (expected pretty or json)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,

    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.outreach/config.toml).
    ///
    /// Environment variables override file values:
    /// - `OUTREACH_HOST`, `OUTREACH_PORT`
    /// - `OUTREACH_TEMPLATE_VERSION`
    /// - `OUTREACH_LOG_FORMAT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply `OUTREACH_*` environment overrides, then re-validate.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = lookup("OUTREACH_HOST") {
            self.gateway.host = host;
        }
        if let Some(port) = lookup("OUTREACH_PORT") {
            self.gateway.port = port.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("OUTREACH_PORT is not a valid port: {port}"))
            })?;
        }
        if let Some(version) = lookup("OUTREACH_TEMPLATE_VERSION") {
            self.context.template_version = version;
        }
        if let Some(format) = lookup("OUTREACH_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".outreach")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ingest = &self.ingest;
        for (name, value) in [
            ("ingest.confidence_threshold", ingest.confidence_threshold),
            ("ingest.high_confidence", ingest.high_confidence),
            ("ingest.suggestion_floor", ingest.suggestion_floor),
            ("context.dedup_threshold", self.context.dedup_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 0.0 and 1.0"
                )));
            }
        }

        if ingest.suggestion_floor > ingest.confidence_threshold {
            return Err(ConfigError::ValidationError(
                "ingest.suggestion_floor must not exceed ingest.confidence_threshold".into(),
            ));
        }

        if ingest.commit_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "ingest.commit_concurrency must be at least 1".into(),
            ));
        }

        if self.context.template_version.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "context.template_version cannot be empty".into(),
            ));
        }

        if self.context.cache_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "context.cache_capacity must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gateway.port, 8470);
        assert_eq!(config.context.template_version, "v1");
        assert_eq!(config.context.locale.digit_grouping, DigitGrouping::Indian);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.ingest.synonyms, config.ingest.synonyms);
        assert_eq!(parsed.context.locale, config.context.locale);
    }

    #[test]
    fn threshold_out_of_range_rejected() {
        let mut config = AppConfig::default();
        config.ingest.confidence_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn floor_above_threshold_rejected() {
        let mut config = AppConfig::default();
        config.ingest.suggestion_floor = 0.7;
        config.ingest.confidence_threshold = 0.6;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("suggestion_floor"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        let config = result.unwrap();
        assert_eq!(config.ingest.sample_rows, 20);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[ingest]\nconfidence_threshold = 0.6\n\n[context.locale]\ndigit_grouping = \"western\"\ncurrency_symbol = \"$\""
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert!((config.ingest.confidence_threshold - 0.6).abs() < f32::EPSILON);
        assert_eq!(config.ingest.commit_concurrency, 8);
        assert_eq!(config.context.locale.digit_grouping, DigitGrouping::Western);
        assert_eq!(config.context.locale.currency_symbol, "$");
        assert_eq!(config.context.locale.true_word, "yes");
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[ingest\nconfidence_threshold = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn invalid_file_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[context]\ndedup_threshold = 2.0\n").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("OUTREACH_PORT", "9000"),
            ("OUTREACH_TEMPLATE_VERSION", "v2"),
            ("OUTREACH_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.context.template_version, "v2");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.gateway.host, "127.0.0.1");
    }

    #[test]
    fn bad_port_override_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides(|k| (k == "OUTREACH_PORT").then(|| "http".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("8470"));
        assert!(toml_str.contains("template_version"));
        assert!(toml_str.contains("indian"));
    }
}
