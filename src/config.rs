//! Configuration loading and validation.
//!
//! Configuration lives in a JSON file. A missing file is fatal at startup;
//! every section has defaults so a `{}` file is valid. Unknown keys are
//! rejected so typos fail loudly instead of silently using defaults.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::SextantError;

/// Default maximum file size considered for indexing (1 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1_048_576;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub redis: RedisConfig,
    pub indexer: IndexerConfig,
    pub pagerank: PagerankConfig,
    pub watcher: WatcherSettings,
    pub git: GitConfig,
}

/// Storage backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct RedisConfig {
    pub url: String,
    /// Application prefix for every key; the project name is appended.
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "sextant".to_string(),
        }
    }
}

/// File selection and sizing rules for the scanner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct IndexerConfig {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub max_file_size: u64,
    /// In-flight file-processing tasks per extraction batch.
    pub max_concurrency: usize,
    /// Files per extraction batch; progress is reported per batch.
    pub batch_size: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            include: vec![
                "**/*.ts".into(),
                "**/*.tsx".into(),
                "**/*.js".into(),
                "**/*.jsx".into(),
                "**/*.mjs".into(),
                "**/*.cjs".into(),
                "**/*.py".into(),
                "**/*.go".into(),
                "**/*.rs".into(),
                "**/*.java".into(),
                "**/*.c".into(),
                "**/*.h".into(),
                "**/*.cpp".into(),
                "**/*.cc".into(),
                "**/*.cxx".into(),
                "**/*.hpp".into(),
                "**/*.hxx".into(),
            ],
            exclude: vec![
                "**/node_modules/**".into(),
                "**/.git/**".into(),
                "**/target/**".into(),
                "**/dist/**".into(),
                "**/build/**".into(),
                "**/__pycache__/**".into(),
                "**/.venv/**".into(),
                "**/venv/**".into(),
            ],
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_concurrency: 8,
            batch_size: 50,
        }
    }
}

/// PageRank iteration parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct PagerankConfig {
    pub damping: f64,
    pub iterations: usize,
    pub tolerance: f64,
}

impl Default for PagerankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            iterations: 30,
            tolerance: 1e-6,
        }
    }
}

/// Filesystem watcher settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct WatcherSettings {
    pub enabled: bool,
    pub debounce_ms: u64,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            debounce_ms: 500,
        }
    }
}

/// Git metadata provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct GitConfig {
    pub enabled: bool,
    /// Commits examined per file when computing churn.
    pub history_depth: usize,
    /// Only commits within this window count toward churn.
    pub sample_window_days: i64,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            history_depth: 50,
            sample_window_days: 90,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// A missing file is an error: startup must not proceed on guessed
    /// settings. A present-but-empty `{}` file yields all defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SextantError::ConfigInvalid(format!(
                "cannot read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| {
            SextantError::ConfigInvalid(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.pagerank.damping) {
            anyhow::bail!(SextantError::ConfigInvalid(format!(
                "pagerank.damping must be within [0, 1], got {}",
                self.pagerank.damping
            )));
        }
        if self.pagerank.iterations == 0 {
            anyhow::bail!(SextantError::ConfigInvalid(
                "pagerank.iterations must be at least 1".into()
            ));
        }
        if self.indexer.max_file_size == 0 {
            anyhow::bail!(SextantError::ConfigInvalid(
                "indexer.max_file_size must be greater than 0".into()
            ));
        }
        if self.indexer.max_concurrency == 0 || self.indexer.batch_size == 0 {
            anyhow::bail!(SextantError::ConfigInvalid(
                "indexer.max_concurrency and indexer.batch_size must be at least 1".into()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_is_an_error() {
        let result = Config::load(Path::new("/nonexistent/sextant.json"));
        assert!(result.is_err());
    }

    #[test]
    fn empty_object_yields_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sextant.json");
        std::fs::write(&path, "{}").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.pagerank.damping, 0.85);
        assert_eq!(config.indexer.max_file_size, DEFAULT_MAX_FILE_SIZE);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sextant.json");
        std::fs::write(&path, r#"{"redis": {"uri": "redis://x"}}"#).unwrap();

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn out_of_range_damping_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sextant.json");
        std::fs::write(&path, r#"{"pagerank": {"damping": 1.5}}"#).unwrap();

        let err = Config::load(&path).unwrap_err().to_string();
        assert!(err.contains("damping"));
    }

    #[test]
    fn sections_merge_with_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sextant.json");
        std::fs::write(
            &path,
            r#"{"watcher": {"enabled": true}, "git": {"enabled": false}}"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.watcher.enabled);
        assert_eq!(config.watcher.debounce_ms, 500);
        assert!(!config.git.enabled);
        assert_eq!(config.git.history_depth, 50);
    }
}
