//! Configuration loading and data root resolution
//!
//! Configuration is optional. A missing TOML file logs a warning and the
//! compiled defaults apply; a present but malformed file is an error.
//!
//! Data root resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `DAOIP_DATA_ROOT` environment variable
//! 3. `data_root` in the TOML config file
//! 4. Compiled default `./daoip-5/json`

use crate::values::DEFAULT_CREATED_AT;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the data root
pub const DATA_ROOT_ENV: &str = "DAOIP_DATA_ROOT";

/// Environment variable pointing at the TOML config file
pub const CONFIG_ENV: &str = "DAOIP_CONFIG";

/// Compiled default data root (relative to the working directory)
pub const DEFAULT_DATA_ROOT: &str = "daoip-5/json";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root of the published JSON tree (one directory per grant system)
    #[serde(default)]
    pub data_root: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub quality: QualityConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Quality scoring policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Points deducted from 100 per reported issue
    ///
    /// **Default:** 5
    #[serde(default = "default_penalty_per_issue")]
    pub penalty_per_issue: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            penalty_per_issue: default_penalty_per_issue(),
        }
    }
}

/// Conversion pipeline defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// `createdAt` used when a row has no parseable date
    #[serde(default = "default_created_at")]
    pub default_created_at: String,

    /// Base URL for `applicationsURI` in generated pool indexes
    #[serde(default)]
    pub applications_uri_base: Option<String>,

    /// `requiredCredentials` written on generated pools
    #[serde(default = "default_required_credentials")]
    pub required_credentials: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_created_at: default_created_at(),
            applications_uri_base: None,
            required_credentials: default_required_credentials(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_penalty_per_issue() -> u32 {
    5
}

fn default_created_at() -> String {
    DEFAULT_CREATED_AT.to_string()
}

fn default_required_credentials() -> Vec<String> {
    vec!["DAO Attestation".to_string(), "KYC".to_string()]
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::at_path(path, e))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Locate the config file: CLI argument, then `DAOIP_CONFIG`, then the user config dir
pub fn locate_config_file(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("daoip").join("config.toml"))
        .filter(|p| p.exists())
}

/// Load configuration, degrading to defaults when no file can be found.
///
/// An explicitly requested file (CLI or env) that does not exist is logged as a
/// warning, not treated as fatal. Parse errors are returned.
pub fn load_or_default(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = locate_config_file(cli_arg) else {
        info!("No config file found, using built-in defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!("Config file {} not found, using built-in defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let config = load_toml_config(&path)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Resolve the data root following the documented priority order
pub fn resolve_data_root(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(DATA_ROOT_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.data_root {
        return path.clone();
    }

    // Priority 4: compiled default
    PathBuf::from(DEFAULT_DATA_ROOT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.quality.penalty_per_issue, 5);
        assert_eq!(config.pipeline.default_created_at, DEFAULT_CREATED_AT);
        assert_eq!(config.pipeline.required_credentials, vec!["DAO Attestation", "KYC"]);
        assert!(config.data_root.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [quality]
            penalty_per_issue = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.quality.penalty_per_issue, 2);
        assert_eq!(config.logging.level, "info");
        assert!(config.pipeline.applications_uri_base.is_none());
    }
}
