//! Run history for reproducibility
//!
//! Each recorded plotting run appends one JSON line to `history.jsonl` in the
//! metadata directory and overwrites `metadata.json` with the latest
//! `{date, version, commit}` and `config.json` with the loaded config
//! document. Prior lines are never rewritten.
//! Write failures are warnings: history must never abort a plot.

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{ConfigDocument, ConfigStore, ResolvedParameters};
use crate::constants::config::APP_DIR;
use crate::constants::history::{CONFIG_SNAPSHOT_FILENAME, DATE_FORMAT, LOG_FILENAME, SNAPSHOT_FILENAME};
use crate::error::HistoryWriteWarning;

/// One line of the history log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub date: String,
    pub version: String,
    pub commit: String,
    /// Resolved parameters keyed by feature name
    #[serde(default)]
    pub config: BTreeMap<String, Value>,
}

/// Latest recorded run, kept separate from the append-only log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    pub date: String,
    pub version: String,
    pub commit: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerState {
    Uninitialized,
    /// Metadata directory exists; records can be appended
    MetadataDirEnsured,
}

pub struct RunHistoryLogger {
    metadata_dir: PathBuf,
    enabled: bool,
    state: LoggerState,
    appended: usize,
    /// Loaded config document, copied to config.json on each record
    config: Option<ConfigDocument>,
}

fn current_date() -> String {
    Local::now().format(DATE_FORMAT).to_string()
}

impl RunHistoryLogger {
    /// Per-user metadata directory (e.g. ~/.config/gsplot)
    pub fn default_metadata_dir() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        path
    }

    pub fn new(metadata_dir: PathBuf, enabled: bool) -> Self {
        Self {
            metadata_dir,
            enabled,
            state: LoggerState::Uninitialized,
            appended: 0,
            config: None,
        }
    }

    /// Logger in the default directory, enabled by `"metadata": true`
    pub fn from_store(store: &ConfigStore) -> Self {
        Self::new(Self::default_metadata_dir(), store.document().metadata_enabled())
            .with_config(store.document().clone())
    }

    /// Keep a copy of the config document next to the metadata snapshot
    pub fn with_config(mut self, document: ConfigDocument) -> Self {
        self.config = Some(document);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> LoggerState {
        self.state
    }

    /// Records appended by this logger during the process
    pub fn appended(&self) -> usize {
        self.appended
    }

    pub fn log_path(&self) -> PathBuf {
        self.metadata_dir.join(LOG_FILENAME)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.metadata_dir.join(SNAPSHOT_FILENAME)
    }

    pub fn config_snapshot_path(&self) -> PathBuf {
        self.metadata_dir.join(CONFIG_SNAPSHOT_FILENAME)
    }

    /// Append a record if enabled. Failures are logged as warnings and swallowed.
    pub fn record(&mut self, resolved: &[ResolvedParameters], version: &str, commit: &str) {
        if !self.enabled {
            debug!("Run history disabled, not recording");
            return;
        }
        match self.try_record(resolved, version, commit) {
            Ok(snapshot_failures) => {
                for warning in snapshot_failures {
                    warn!(error = %warning, "Run history recorded, snapshot not updated");
                }
            }
            Err(warning) => warn!(error = %warning, "Run history not recorded"),
        }
    }

    /// Append a record regardless of the enabled flag.
    ///
    /// `Err` means the history line was not written. Once the line is on disk,
    /// failures to refresh `metadata.json` or `config.json` are returned in `Ok`.
    pub fn try_record(
        &mut self,
        resolved: &[ResolvedParameters],
        version: &str,
        commit: &str,
    ) -> Result<Vec<HistoryWriteWarning>, HistoryWriteWarning> {
        self.ensure_metadata_dir()?;

        let date = current_date();
        let record = HistoryRecord {
            date: date.clone(),
            version: version.to_string(),
            commit: commit.to_string(),
            config: resolved
                .iter()
                .map(|params| (params.feature().to_string(), params.to_value()))
                .collect(),
        };
        self.append(&record)?;
        self.appended += 1;

        let snapshot = MetadataSnapshot {
            date,
            version: version.to_string(),
            commit: commit.to_string(),
        };
        info!(path = %self.log_path().display(), version = %version, commit = %commit, "Recorded run history");

        let mut snapshot_failures = Vec::new();
        if let Err(warning) = write_json(&self.snapshot_path(), &snapshot) {
            snapshot_failures.push(warning);
        }
        if let Some(document) = &self.config {
            if let Err(warning) = write_json(&self.config_snapshot_path(), document) {
                snapshot_failures.push(warning);
            }
        }
        Ok(snapshot_failures)
    }

    fn ensure_metadata_dir(&mut self) -> Result<(), HistoryWriteWarning> {
        if self.state == LoggerState::MetadataDirEnsured {
            return Ok(());
        }
        fs::create_dir_all(&self.metadata_dir).map_err(|source| HistoryWriteWarning {
            path: self.metadata_dir.clone(),
            source,
        })?;
        self.state = LoggerState::MetadataDirEnsured;
        Ok(())
    }

    fn append(&self, record: &HistoryRecord) -> Result<(), HistoryWriteWarning> {
        let path = self.log_path();
        let warning = |source: io::Error| HistoryWriteWarning {
            path: path.clone(),
            source,
        };

        let mut line = serde_json::to_string(record).map_err(|e| warning(io::Error::from(e)))?;
        line.push('\n');

        // One write_all per record
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(warning)?;
        file.write_all(line.as_bytes()).map_err(warning)?;
        Ok(())
    }
}

/// Overwrite `path` with pretty JSON
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), HistoryWriteWarning> {
    let warning = |source: io::Error| HistoryWriteWarning {
        path: path.to_path_buf(),
        source,
    };

    let contents = serde_json::to_string_pretty(value).map_err(|e| warning(io::Error::from(e)))?;
    fs::write(path, contents).map_err(warning)?;
    Ok(())
}

/// Read the history log back. A missing log is empty; malformed lines are skipped.
pub fn read_history(path: &Path) -> io::Result<Vec<HistoryRecord>> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<HistoryRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(path = %path.display(), line = index + 1, error = %e, "Skipping malformed history line");
            }
        }
    }
    Ok(records)
}

pub fn read_snapshot(path: &Path) -> io::Result<Option<MetadataSnapshot>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Config document saved by the most recent recorded run
pub fn read_config_snapshot(path: &Path) -> io::Result<Option<ConfigDocument>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let value: Value = serde_json::from_str(&contents)?;
    ConfigDocument::from_value(value).map(Some).ok_or_else(|| {
        io::Error::new(ErrorKind::InvalidData, "config snapshot is not a JSON object")
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitEntry {
    pub commit: String,
    /// Date the commit was first recorded
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionEntry {
    pub version: String,
    pub commits: Vec<CommitEntry>,
}

/// Group records by version, each distinct commit once, in first-seen order
pub fn version_summary(records: &[HistoryRecord]) -> Vec<VersionEntry> {
    let mut summary: Vec<VersionEntry> = Vec::new();

    for record in records {
        let index = match summary.iter().position(|v| v.version == record.version) {
            Some(index) => index,
            None => {
                summary.push(VersionEntry {
                    version: record.version.clone(),
                    commits: Vec::new(),
                });
                summary.len() - 1
            }
        };

        let entry = &mut summary[index];
        if !entry.commits.iter().any(|c| c.commit == record.commit) {
            entry.commits.push(CommitEntry {
                commit: record.commit.clone(),
                date: record.date.clone(),
            });
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CallArgs, ConfigResolver};
    use serde_json::json;
    use tempfile::tempdir;

    fn resolved_axes() -> ResolvedParameters {
        let store = ConfigStore::from_document(ConfigDocument::empty());
        ConfigResolver::new(&store)
            .resolve_builtin("axes", &CallArgs::new().set("mosaic", "AB"))
            .unwrap()
    }

    fn record(version: &str, commit: &str, date: &str) -> HistoryRecord {
        HistoryRecord {
            date: date.to_string(),
            version: version.to_string(),
            commit: commit.to_string(),
            config: BTreeMap::new(),
        }
    }

    #[test]
    fn test_record_round_trip() {
        let dir = tempdir().unwrap();
        let mut logger = RunHistoryLogger::new(dir.path().join("meta"), true);
        assert_eq!(logger.state(), LoggerState::Uninitialized);

        logger.record(&[resolved_axes()], "0.3.1", "abc123");

        assert_eq!(logger.state(), LoggerState::MetadataDirEnsured);
        let records = read_history(&logger.log_path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].version, "0.3.1");
        assert_eq!(records[0].commit, "abc123");
        assert_eq!(records[0].config["axes"]["mosaic"], json!("AB"));
    }

    #[test]
    fn test_records_append_without_rewriting() {
        let dir = tempdir().unwrap();
        let mut logger = RunHistoryLogger::new(dir.path().to_path_buf(), true);

        logger.record(&[], "0.1.0", "first");
        let first_contents = fs::read_to_string(logger.log_path()).unwrap();
        logger.record(&[resolved_axes()], "0.1.0", "second");

        let contents = fs::read_to_string(logger.log_path()).unwrap();
        assert!(contents.starts_with(&first_contents));
        assert_eq!(contents.lines().count(), 2);
        assert_eq!(logger.appended(), 2);
    }

    #[test]
    fn test_snapshot_tracks_latest_run() {
        let dir = tempdir().unwrap();
        let mut logger = RunHistoryLogger::new(dir.path().to_path_buf(), true);

        logger.record(&[], "0.1.0", "aaa");
        logger.record(&[], "0.2.0", "bbb");

        let snapshot = read_snapshot(&logger.snapshot_path()).unwrap().unwrap();
        assert_eq!(snapshot.version, "0.2.0");
        assert_eq!(snapshot.commit, "bbb");
    }

    #[test]
    fn test_disabled_logger_writes_nothing() {
        let dir = tempdir().unwrap();
        let mut logger = RunHistoryLogger::new(dir.path().join("meta"), false);

        logger.record(&[resolved_axes()], "0.1.0", "abc");

        assert!(!dir.path().join("meta").exists());
        assert_eq!(logger.state(), LoggerState::Uninitialized);
    }

    #[test]
    fn test_write_failure_is_not_fatal() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "file in the way").unwrap();
        let mut logger = RunHistoryLogger::new(blocker.join("meta"), true);

        // Must not panic
        logger.record(&[], "0.1.0", "abc");
        assert_eq!(logger.appended(), 0);
        assert!(logger.try_record(&[], "0.1.0", "abc").is_err());
    }

    #[test]
    fn test_snapshot_failure_keeps_appended_record() {
        let dir = tempdir().unwrap();
        let mut logger = RunHistoryLogger::new(dir.path().to_path_buf(), true);
        // A directory where metadata.json should go makes the snapshot write fail
        fs::create_dir(logger.snapshot_path()).unwrap();

        let failures = logger.try_record(&[], "1.0.0", "c0ffee").unwrap();

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, logger.snapshot_path());
        assert_eq!(logger.appended(), 1);
        let records = read_history(&logger.log_path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].commit, "c0ffee");

        // record() only warns
        logger.record(&[], "1.0.0", "c0ffee");
        assert_eq!(logger.appended(), 2);
    }

    #[test]
    fn test_config_document_saved_with_run() {
        let dir = tempdir().unwrap();
        let document = ConfigDocument::from_value(json!({
            "metadata": true,
            "axes": {"size": [10, 10]},
            "rcParams": {"font.size": 9}
        }))
        .unwrap();
        let mut logger =
            RunHistoryLogger::new(dir.path().to_path_buf(), true).with_config(document.clone());

        let failures = logger.try_record(&[resolved_axes()], "0.1.0", "abc").unwrap();
        assert!(failures.is_empty());

        let saved = read_config_snapshot(&logger.config_snapshot_path()).unwrap().unwrap();
        assert_eq!(saved, document);
    }

    #[test]
    fn test_config_document_not_written_without_config() {
        let dir = tempdir().unwrap();
        let mut logger = RunHistoryLogger::new(dir.path().to_path_buf(), true);

        logger.record(&[], "0.1.0", "abc");

        assert!(read_config_snapshot(&logger.config_snapshot_path()).unwrap().is_none());
    }

    #[test]
    fn test_from_store_carries_config_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gsplot.json");
        fs::write(&path, r#"{"metadata": true, "show": {"dpi": 300}}"#).unwrap();
        let store = ConfigStore::load(Some(&path)).unwrap();

        let logger = RunHistoryLogger::from_store(&store);
        assert_eq!(logger.config.as_ref(), Some(store.document()));
    }

    #[test]
    fn test_from_store_follows_metadata_flag() {
        let on = ConfigStore::from_document(ConfigDocument::from_value(json!({"metadata": true})).unwrap());
        let off = ConfigStore::from_document(ConfigDocument::empty());

        assert!(RunHistoryLogger::from_store(&on).is_enabled());
        assert!(!RunHistoryLogger::from_store(&off).is_enabled());
    }

    #[test]
    fn test_read_history_missing_file() {
        let dir = tempdir().unwrap();
        assert!(read_history(&dir.path().join("history.jsonl")).unwrap().is_empty());
        assert!(read_snapshot(&dir.path().join("metadata.json")).unwrap().is_none());
        assert!(read_config_snapshot(&dir.path().join("config.json")).unwrap().is_none());
    }

    #[test]
    fn test_read_history_skips_malformed_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let good = serde_json::to_string(&record("0.1.0", "abc", "2024-01-01 00:00:00")).unwrap();
        fs::write(&path, format!("{good}\n{{broken\n\n{good}\n")).unwrap();

        let records = read_history(&path).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_version_summary_groups_commits() {
        let records = vec![
            record("0.1.0", "aaa", "2024-01-01 10:00:00"),
            record("0.1.0", "aaa", "2024-01-02 10:00:00"),
            record("0.1.0", "bbb", "2024-01-03 10:00:00"),
            record("0.2.0", "ccc", "2024-02-01 10:00:00"),
        ];

        let summary = version_summary(&records);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].version, "0.1.0");
        assert_eq!(
            summary[0].commits,
            vec![
                CommitEntry { commit: "aaa".into(), date: "2024-01-01 10:00:00".into() },
                CommitEntry { commit: "bbb".into(), date: "2024-01-03 10:00:00".into() },
            ]
        );
        assert_eq!(summary[1].commits.len(), 1);
    }

    #[test]
    fn test_date_format() {
        let date = current_date();
        assert!(chrono::NaiveDateTime::parse_from_str(&date, DATE_FORMAT).is_ok());
    }
}
