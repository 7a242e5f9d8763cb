//! Configuration loading.

use std::path::Path;

use figment::providers::{Env, Format, Toml};
use figment::Figment;

use super::types::Config;
use super::validate::validate_config;
use super::ConfigError;

/// Environment prefix for overrides. Sections are separated with a double
/// underscore so field names keep their single ones:
/// `RALLYPOINT_MATCHMAKER__MAX_TICKETS=5`.
const ENV_PREFIX: &str = "RALLYPOINT_";

/// Load configuration from a TOML file, apply environment overrides and
/// validate the result.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let figment = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));
    let config: Config = figment
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    validate_config(&config)?;
    Ok(config)
}

/// Parse configuration from a TOML string, with no file lookup,
/// environment overrides or validation. Tests use this to build
/// configurations directly, including deliberately invalid ones.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    Figment::from(Toml::string(toml_str))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}
