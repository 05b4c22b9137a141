#![forbid(unsafe_code)]
//! Configuration resolution and run history for gsplot figures.
//!
//! A plotting feature (axes, show, line, ...) asks a [`ConfigResolver`] for its
//! effective options. Call-site arguments win over the `gsplot.json` config
//! file, which wins over the feature's built-in defaults. When the config
//! enables `metadata`, each run is appended to the history log by
//! [`RunHistoryLogger`].

pub mod config;
pub mod constants;
pub mod error;
pub mod features;
pub mod history;

pub use config::{CallArgs, ConfigDocument, ConfigResolver, ConfigStore, FeatureSchema, ResolvedParameters};
pub use error::{ConfigError, HistoryWriteWarning};
pub use history::{HistoryRecord, RunHistoryLogger};

/// Package version recorded in run history
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commit hash recorded in run history, taken from `GSPLOT_COMMIT` at build time
pub fn commit() -> &'static str {
    option_env!("GSPLOT_COMMIT").unwrap_or(constants::history::UNKNOWN_COMMIT)
}
