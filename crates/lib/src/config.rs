//! # Pipeline Configuration
//!
//! Settings are resolved in layers, later layers winning:
//!
//! 1. Defaults declared on `EtlConfig`.
//! 2. A YAML file (`hpetl.yml` in the working directory, or an explicit path),
//!    with `${VAR}` placeholders substituted from the environment.
//! 3. Plain environment variables for top-level keys (`DATA_DIR`,
//!    `MONGO_CONNECTION`, `API_BASE_URL`, ...).
//! 4. `HPETL_` prefixed variables with `__` for nesting
//!    (e.g. `HPETL_RETRY__RETRY_COUNT`).
//!
//! CLI flags are applied on top of the result by the binary.

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_CONFIG_FILE, DEFAULT_DATABASE, DEFAULT_DATA_DIR,
    DEFAULT_MONGO_CONNECTION, DEFAULT_RESOURCE, RAW_SNAPSHOT_FILE, TRANSFORMED_SNAPSHOT_FILE,
};
use crate::retry::RetryConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    General(String),
    #[error("{0}")]
    NotFound(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// What the transform stage does with a record that fails validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    /// Drop the record, log a warning, and keep going.
    #[default]
    Skip,
    /// Fail the stage on the first invalid record.
    Abort,
}

impl FromStr for ValidationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(ValidationPolicy::Skip),
            "abort" => Ok(ValidationPolicy::Abort),
            other => Err(format!(
                "unknown validation policy '{other}' (expected 'skip' or 'abort')"
            )),
        }
    }
}

impl fmt::Display for ValidationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationPolicy::Skip => f.write_str("skip"),
            ValidationPolicy::Abort => f.write_str("abort"),
        }
    }
}

/// The fully resolved pipeline configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EtlConfig {
    /// Directory holding both snapshot files. `DATA_DIR`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Base URL of the source API. `API_BASE_URL`.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Resource path appended to the base URL. `API_RESOURCE`.
    #[serde(default = "default_api_resource")]
    pub api_resource: String,
    /// Page size requested from paginated APIs. `PAGE_SIZE`.
    #[serde(default)]
    pub page_size: Option<u32>,
    /// Pause between page requests, to stay under API rate limits.
    #[serde(default)]
    pub request_delay_ms: u64,
    /// MongoDB connection string. `MONGO_CONNECTION`.
    #[serde(default = "default_mongo_connection")]
    pub mongo_connection: String,
    /// Target database name. `MONGO_DATABASE`.
    #[serde(default = "default_mongo_database")]
    pub mongo_database: String,
    #[serde(default)]
    pub validation_policy: ValidationPolicy,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_api_resource() -> String {
    DEFAULT_RESOURCE.to_string()
}

fn default_mongo_connection() -> String {
    DEFAULT_MONGO_CONNECTION.to_string()
}

fn default_mongo_database() -> String {
    DEFAULT_DATABASE.to_string()
}

impl EtlConfig {
    pub fn raw_snapshot_path(&self) -> PathBuf {
        self.data_dir.join(RAW_SNAPSHOT_FILE)
    }

    pub fn transformed_snapshot_path(&self) -> PathBuf {
        self.data_dir.join(TRANSFORMED_SNAPSHOT_FILE)
    }
}

// Reads a file and substitutes `${VAR}` placeholders from the environment.
// Returns Ok(None) if the file does not exist.
fn read_and_substitute(path: &Path) -> Result<Option<String>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).map_err(|e| {
        ConfigError::General(format!(
            "Failed to read config file '{}': {e}",
            path.display()
        ))
    })?;

    let re = Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}")
        .map_err(|e| ConfigError::General(e.to_string()))?;
    let expanded = re.replace_all(&content, |caps: &regex::Captures| {
        env::var(&caps["var"]).unwrap_or_default()
    });

    Ok(Some(expanded.into_owned()))
}

/// Loads the pipeline configuration.
///
/// An explicit `config_path_override` must exist; the default `hpetl.yml` is
/// optional.
pub fn get_config(config_path_override: Option<&str>) -> Result<EtlConfig, ConfigError> {
    let mut builder = ConfigBuilder::builder();

    match config_path_override {
        Some(path) => {
            let content = read_and_substitute(Path::new(path))?.ok_or_else(|| {
                ConfigError::NotFound(format!("Config file not found at '{path}'."))
            })?;
            info!("Loading configuration from '{path}'.");
            builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
        }
        None => {
            if let Some(content) = read_and_substitute(Path::new(DEFAULT_CONFIG_FILE))? {
                info!("Loading configuration from '{DEFAULT_CONFIG_FILE}'.");
                builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
            }
        }
    }

    let settings = builder
        .add_source(Environment::default())
        .add_source(
            Environment::with_prefix("HPETL")
                .prefix_separator("_")
                .try_parsing(true)
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_str() {
        assert_eq!("skip".parse::<ValidationPolicy>(), Ok(ValidationPolicy::Skip));
        assert_eq!(" ABORT ".parse::<ValidationPolicy>(), Ok(ValidationPolicy::Abort));
        assert!("ignore".parse::<ValidationPolicy>().is_err());
    }

    #[test]
    fn test_snapshot_paths_are_under_data_dir() {
        let config = EtlConfig {
            data_dir: PathBuf::from("/tmp/hp"),
            api_base_url: default_api_base_url(),
            api_resource: default_api_resource(),
            page_size: None,
            request_delay_ms: 0,
            mongo_connection: default_mongo_connection(),
            mongo_database: default_mongo_database(),
            validation_policy: ValidationPolicy::Skip,
            retry: RetryConfig::default(),
        };
        assert_eq!(
            config.raw_snapshot_path(),
            PathBuf::from("/tmp/hp/1.raw_data.json")
        );
        assert_eq!(
            config.transformed_snapshot_path(),
            PathBuf::from("/tmp/hp/2.transformed_data.json")
        );
    }
}
