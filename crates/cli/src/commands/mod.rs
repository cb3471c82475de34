pub mod config_cmd;
pub mod fields;
pub mod import;
pub mod map;
pub mod preview;
pub mod serve;
pub mod workspace;

use outreach_config::{AppConfig, ConfigError};
use std::path::Path;

/// Load `path` if given, otherwise the default location; env overrides apply either way.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_env_overrides()?;
            Ok(config)
        }
        None => AppConfig::load(),
    }
}
