//! Config file discovery and loading
//!
//! The store owns the parsed document for the lifetime of the process.
//! It is created once by the entry point and borrowed by every resolution,
//! replacing a process-global config singleton.

use serde::Serialize;
use serde_json::{Map, Value};
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::constants::config::{APP_DIR, BACKEND_PARAMS_KEY, FILENAME, METADATA_KEY};
use crate::error::ConfigError;

/// Parsed config file: feature name -> option map, plus a few top-level settings
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConfigDocument {
    entries: Map<String, Value>,
}

impl ConfigDocument {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap an already parsed JSON value. Returns None unless the root is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(entries) => Some(Self { entries }),
            _ => None,
        }
    }

    fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let value: Value =
            serde_json::from_str(contents).map_err(|e| ConfigError::ConfigParseError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        Self::from_value(value).ok_or_else(|| ConfigError::ConfigParseError {
            path: path.to_path_buf(),
            reason: "top-level value must be an object".to_string(),
        })
    }

    /// Option map for a feature.
    /// Entries that are not objects (e.g. `"metadata": true`) are not feature sections.
    pub fn feature_options(&self, feature: &str) -> Option<&Map<String, Value>> {
        match self.entries.get(feature)? {
            Value::Object(options) => Some(options),
            other => {
                debug!(feature = %feature, value = %other, "Config entry is not an option map, ignoring");
                None
            }
        }
    }

    /// `"metadata": true` turns on run history logging
    pub fn metadata_enabled(&self) -> bool {
        self.entries
            .get(METADATA_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Backend passthrough section (`rcParams`), not resolved against any schema
    pub fn backend_params(&self) -> Option<&Map<String, Value>> {
        self.entries.get(BACKEND_PARAMS_KEY).and_then(Value::as_object)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where a store's document came from, so `reload` can repeat the same lookup
#[derive(Debug, Clone, PartialEq)]
enum Origin {
    Explicit(PathBuf),
    Discovered(Vec<PathBuf>),
    InMemory,
}

/// Holder of the loaded configuration document
#[derive(Debug, Clone)]
pub struct ConfigStore {
    document: ConfigDocument,
    source: Option<PathBuf>,
    origin: Origin,
}

/// Candidate config locations in lookup order:
/// working directory, user config directory, home directory
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(3);

    match env::current_dir() {
        Ok(cwd) => paths.push(cwd.join(FILENAME)),
        Err(e) => {
            warn!(error = %e, "Cannot determine working directory, using relative path");
            paths.push(PathBuf::from(FILENAME));
        }
    }

    if let Some(mut path) = dirs::config_dir() {
        path.push(APP_DIR);
        path.push(FILENAME);
        paths.push(path);
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(FILENAME));
    }

    paths
}

fn read_document(path: &Path) -> Result<ConfigDocument, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ConfigError::ConfigNotFound(path.to_path_buf()),
        _ => ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    ConfigDocument::parse(path, &contents)
}

impl ConfigStore {
    /// Load from an explicit path, or discover one along `search_paths()`.
    ///
    /// Only an explicit path can fail; discovery falls back to an empty document.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit_path {
            Some(path) => Self::load_explicit(path),
            None => Ok(Self::discover(search_paths())),
        }
    }

    pub fn load_explicit(path: &Path) -> Result<Self, ConfigError> {
        let document = read_document(path)?;
        info!(path = %path.display(), "Loaded config file");
        Ok(Self {
            document,
            source: Some(path.to_path_buf()),
            origin: Origin::Explicit(path.to_path_buf()),
        })
    }

    /// First existing, parseable candidate wins.
    /// A corrupted candidate is skipped with a warning rather than blocking plotting.
    pub fn discover(candidates: Vec<PathBuf>) -> Self {
        for candidate in &candidates {
            if !candidate.is_file() {
                debug!(path = %candidate.display(), "No config file at candidate path");
                continue;
            }

            match read_document(candidate) {
                Ok(document) => {
                    info!(path = %candidate.display(), "Loaded config file");
                    return Self {
                        document,
                        source: Some(candidate.clone()),
                        origin: Origin::Discovered(candidates),
                    };
                }
                Err(e) => {
                    warn!(path = %candidate.display(), error = %e, "Skipping config file that failed to load");
                }
            }
        }

        info!("No config file found, using built-in defaults");
        Self {
            document: ConfigDocument::empty(),
            source: None,
            origin: Origin::Discovered(candidates),
        }
    }

    /// Store over an in-memory document (no file behind it)
    pub fn from_document(document: ConfigDocument) -> Self {
        Self {
            document,
            source: None,
            origin: Origin::InMemory,
        }
    }

    /// Repeat the original lookup and replace the document.
    /// On error the previous document is kept.
    pub fn reload(&mut self) -> Result<(), ConfigError> {
        let fresh = match &self.origin {
            Origin::Explicit(path) => Self::load_explicit(path)?,
            Origin::Discovered(candidates) => Self::discover(candidates.clone()),
            Origin::InMemory => return Ok(()),
        };
        *self = fresh;
        Ok(())
    }

    pub fn document(&self) -> &ConfigDocument {
        &self.document
    }

    /// File the document was read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_explicit_missing_path_is_not_found() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.json");

        let err = ConfigStore::load(Some(&missing)).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigNotFound(p) if p == missing));
    }

    #[test]
    fn test_explicit_malformed_file_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "gsplot.json", "{ \"axes\": ");

        let err = ConfigStore::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigParseError { .. }));
    }

    #[test]
    fn test_explicit_non_object_root_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "gsplot.json", "[1, 2, 3]");

        let err = ConfigStore::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigParseError { .. }));
    }

    #[test]
    fn test_explicit_path_loads_document() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "custom.json", r#"{"axes": {"unit": "cm"}}"#);

        let store = ConfigStore::load(Some(&path)).unwrap();
        assert_eq!(store.source(), Some(path.as_path()));
        assert_eq!(
            store.document().feature_options("axes").unwrap().get("unit"),
            Some(&json!("cm"))
        );
    }

    #[test]
    fn test_discover_nothing_gives_empty_document() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::discover(vec![
            dir.path().join("a.json"),
            dir.path().join("b.json"),
        ]);

        assert!(store.document().is_empty());
        assert_eq!(store.source(), None);
    }

    #[test]
    fn test_discover_first_existing_wins() {
        let dir = tempdir().unwrap();
        let second = write(dir.path(), "second.json", r#"{"show": {"dpi": 300}}"#);
        let third = write(dir.path(), "third.json", r#"{"show": {"dpi": 100}}"#);

        let store = ConfigStore::discover(vec![dir.path().join("first.json"), second.clone(), third]);
        assert_eq!(store.source(), Some(second.as_path()));
        assert_eq!(
            store.document().feature_options("show").unwrap().get("dpi"),
            Some(&json!(300))
        );
    }

    #[test]
    fn test_discover_skips_corrupted_candidate() {
        let dir = tempdir().unwrap();
        let broken = write(dir.path(), "broken.json", "not json at all");
        let good = write(dir.path(), "good.json", r#"{"metadata": true}"#);

        let store = ConfigStore::discover(vec![broken, good.clone()]);
        assert_eq!(store.source(), Some(good.as_path()));
        assert!(store.document().metadata_enabled());
    }

    #[test]
    fn test_discover_only_corrupted_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let broken = write(dir.path(), "broken.json", "{");

        let store = ConfigStore::discover(vec![broken]);
        assert!(store.document().is_empty());
        assert_eq!(store.source(), None);
    }

    #[test]
    fn test_reload_picks_up_changes() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "gsplot.json", r#"{"axes": {"ion": false}}"#);
        let mut store = ConfigStore::load(Some(&path)).unwrap();

        fs::write(&path, r#"{"axes": {"ion": true}}"#).unwrap();
        store.reload().unwrap();

        assert_eq!(
            store.document().feature_options("axes").unwrap().get("ion"),
            Some(&json!(true))
        );
    }

    #[test]
    fn test_reload_failure_keeps_previous_document() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "gsplot.json", r#"{"axes": {"ion": true}}"#);
        let mut store = ConfigStore::load(Some(&path)).unwrap();

        fs::remove_file(&path).unwrap();
        assert!(matches!(store.reload(), Err(ConfigError::ConfigNotFound(_))));
        assert!(store.document().feature_options("axes").is_some());
    }

    #[test]
    fn test_non_object_entries_are_not_features() {
        let doc = ConfigDocument::from_value(json!({
            "metadata": true,
            "axes": {"clear": false},
            "rcParams": {"font.size": 9}
        }))
        .unwrap();

        assert!(doc.feature_options("metadata").is_none());
        assert!(doc.feature_options("axes").is_some());
        assert!(doc.metadata_enabled());
        assert_eq!(doc.backend_params().unwrap().get("font.size"), Some(&json!(9)));
    }

    #[test]
    fn test_metadata_defaults_to_disabled() {
        assert!(!ConfigDocument::empty().metadata_enabled());

        let doc = ConfigDocument::from_value(json!({"metadata": "yes"})).unwrap();
        assert!(!doc.metadata_enabled());
    }

    #[test]
    fn test_search_paths_order() {
        let cwd_path = env::current_dir()
            .map(|cwd| cwd.join(FILENAME))
            .unwrap_or_else(|_| PathBuf::from(FILENAME));
        let mut expected = vec![cwd_path.clone()];
        if let Some(config_dir) = dirs::config_dir() {
            expected.push(config_dir.join(APP_DIR).join(FILENAME));
        }
        if let Some(home) = dirs::home_dir() {
            expected.push(home.join(FILENAME));
        }

        let paths = search_paths();
        assert_eq!(paths, expected);
        assert_eq!(paths[0], cwd_path);
        if let Some(home) = dirs::home_dir() {
            assert_eq!(paths.last(), Some(&home.join(FILENAME)));
        }
    }
}
