//! Configuration file loading and parsing.

use std::path::Path;

use anyhow::{Context, Result};

use super::model::AppConfig;
use crate::error::ConfigError;
use crate::validation::{review, TranscoderProbe};

/// Loads the configuration file from disk and parses it.
pub fn load_from_path(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse(path, &content)
}

/// Parses YAML configuration content. `path` is only used for error messages.
pub fn parse(path: &Path, content: &str) -> Result<AppConfig, ConfigError> {
    serde_yaml::from_str(content).map_err(|e| ConfigError::ParseFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Loads the configuration file and checks it against this host.
pub async fn load_and_validate(path: &Path) -> Result<AppConfig> {
    let config = load_from_path(path).context("Failed to load configuration")?;
    let probe = TranscoderProbe::run(&config.transcoder.binary).await;

    let review = review(&config, &probe);

    for issue in review.warnings() {
        tracing::warn!(field = issue.field, message = %issue.message, "Config warning");
    }

    if !review.is_accepted() {
        tracing::error!(report = %review, "Config rejected");
        anyhow::bail!(ConfigError::ValidationFailed {
            error_count: review.rejection_count()
        });
    }

    Ok(config)
}
