//! Error types for configuration loading, resolution and history logging

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

/// Errors that abort a config load or a single feature resolution.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// The config file exists but is not a JSON object-of-objects.
    #[error("failed to parse config file {}: {reason}", .path.display())]
    ConfigParseError { path: PathBuf, reason: String },

    /// The config file exists but could not be read.
    #[error("I/O error reading config at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value (call-site or config file) does not fit the option's declared kind,
    /// or the option is not part of the feature's schema.
    #[error("invalid option '{option}' for '{feature}': {value} ({reason})")]
    InvalidOption {
        feature: String,
        option: String,
        value: Value,
        reason: String,
    },

    /// No schema is registered under this feature name.
    #[error("unknown feature '{0}'")]
    UnknownFeature(String),

    /// An alias and its canonical option were both supplied by the same source.
    #[error("'{alias}' and '{option}' cannot both be used in '{feature}'")]
    AliasConflict {
        feature: String,
        alias: String,
        option: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid_option(
        feature: &str,
        option: &str,
        value: &Value,
        reason: impl Into<String>,
    ) -> Self {
        ConfigError::InvalidOption {
            feature: feature.to_string(),
            option: option.to_string(),
            value: value.clone(),
            reason: reason.into(),
        }
    }
}

/// Non-fatal failure to persist a history record or metadata snapshot.
///
/// Logged as a warning; plotting continues.
#[derive(Debug, Error)]
#[error("failed to write run history at {}: {source}", .path.display())]
pub struct HistoryWriteWarning {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}
