//! Config loading and validation.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::schema::TriageConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// Loads and validates a config from a JSON file.
pub fn load_config(path: &Path) -> Result<TriageConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    load_config_from_str(&raw)
}

/// Parses and validates a config from a JSON string.
pub fn load_config_from_str(raw: &str) -> Result<TriageConfig, ConfigError> {
    let config: TriageConfig = serde_json::from_str(raw)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &TriageConfig) -> Result<(), ConfigError> {
    if config.tag_cap == 0 {
        return Err(ConfigError::Validation {
            message: "tag_cap must be at least 1".to_string(),
        });
    }
    if !(0.0..=1.0).contains(&config.min_confidence) {
        return Err(ConfigError::Validation {
            message: format!(
                "min_confidence must be within 0.0..=1.0, got {}",
                config.min_confidence
            ),
        });
    }
    if config.adapter_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "adapter_timeout_secs must be at least 1".to_string(),
        });
    }
    if config.ocr.languages.is_empty() {
        return Err(ConfigError::Validation {
            message: "ocr.languages must not be empty".to_string(),
        });
    }
    Ok(())
}
