//! Application-wide constants
//!
//! File names, directory names and fixed formats shared by the config
//! store, the history logger and the binary.

/// Configuration file discovery
pub mod config {
    /// Application directory under the user config dir (e.g. ~/.config/gsplot)
    pub const APP_DIR: &str = "gsplot";

    /// Config file name, looked up in the working dir, APP_DIR and home
    pub const FILENAME: &str = "gsplot.json";

    /// Top-level key that enables run history logging
    pub const METADATA_KEY: &str = "metadata";

    /// Section handed to the plotting backend untouched
    pub const BACKEND_PARAMS_KEY: &str = "rcParams";
}

/// Run history and metadata snapshot
pub mod history {
    /// Append-only log, one JSON object per line
    pub const LOG_FILENAME: &str = "history.jsonl";

    /// Snapshot of the most recent recorded run
    pub const SNAPSHOT_FILENAME: &str = "metadata.json";

    /// Copy of the config document used by the most recent recorded run
    pub const CONFIG_SNAPSHOT_FILENAME: &str = "config.json";

    /// Timestamp format for records and snapshots
    pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    /// Reported when the build did not provide a commit hash
    pub const UNKNOWN_COMMIT: &str = "unknown";
}

/// Length conversion factors to inches
pub mod units {
    pub const MM_PER_INCH: f64 = 25.4;
    pub const CM_PER_INCH: f64 = 2.54;
    pub const PT_PER_INCH: f64 = 72.0;
}
