//! Per-validator configuration files
//!
//! Each validator type may have a `<config_dir>/<TypeIdentifier>.json` file
//! holding a flat JSON object. A missing or unreadable file degrades to an
//! empty configuration; only the validator constructor decides whether that
//! is fatal.

use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::validator::{ConfigError, ValidatorConfig};

/// Directory searched for validator configs when none is given
pub const DEFAULT_CONFIG_DIR: &str = "config";

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed config file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

/// Location of the config file for a validator type
pub fn config_path(config_dir: &Path, type_identifier: &str) -> PathBuf {
    config_dir.join(format!("{}.json", type_identifier))
}

/// Read and parse a config file, reporting exactly what went wrong
pub fn read_validator_config(path: &Path) -> Result<ValidatorConfig, ConfigLoadError> {
    let data = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigLoadError::NotFound(path.to_path_buf())
        } else {
            ConfigLoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    match serde_json::from_str::<serde_json::Value>(&data) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(ConfigLoadError::Malformed {
            path: path.to_path_buf(),
            reason: format!("expected a JSON object, found {}", json_kind(&other)),
        }),
        Err(e) => Err(ConfigLoadError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// Load the config for `type_identifier`, falling back to an empty mapping
pub fn load_validator_config(config_dir: &Path, type_identifier: &str) -> ValidatorConfig {
    let path = config_path(config_dir, type_identifier);
    match read_validator_config(&path) {
        Ok(config) => config,
        Err(ConfigLoadError::NotFound(_)) => {
            tracing::info!("Could not find config for '{}'", type_identifier);
            ValidatorConfig::new()
        }
        Err(e) => {
            tracing::warn!("Could not load config for '{}': {}", type_identifier, e);
            ValidatorConfig::new()
        }
    }
}

/// Deserialize a typed config out of the flat mapping
///
/// A missing required field maps to [`ConfigError::Missing`], anything else
/// that does not fit the target type to [`ConfigError::Invalid`].
pub fn from_config<T: DeserializeOwned>(config: &ValidatorConfig) -> Result<T, ConfigError> {
    serde_json::from_value(serde_json::Value::Object(config.clone())).map_err(|e| {
        let reason = e.to_string();
        if reason.starts_with("missing field") {
            ConfigError::Missing(reason)
        } else {
            ConfigError::Invalid(reason)
        }
    })
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
