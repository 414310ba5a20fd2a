//! Directory scanning and change detection.
//!
//! Enumerates candidate files under the configured include/exclude globs and
//! size cap, and reports `{files, changed, deleted}` against a tracking map.
//! Hashes are computed lazily for changed files only: SHA-256 of content
//! below the threshold, a metadata digest (path, mtime, size) above it.
//! Both forms are stable strings suitable for change detection.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::gitignore::Gitignore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::warn;

use crate::config::IndexerConfig;
use crate::model::FileTracking;

/// Files at or below this size are content-hashed; larger files get the
/// constant-time metadata digest.
pub const CONTENT_HASH_THRESHOLD: u64 = 1_048_576;

/// Result of one scan.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Every candidate file, sorted.
    pub files: Vec<String>,
    /// Files whose mtime differs from the tracked record (or every file
    /// when no tracking map was provided), sorted.
    pub changed: Vec<String>,
    /// Tracked paths no longer present on disk, sorted.
    pub deleted: Vec<String>,
    /// Fresh tracking records for each changed file.
    pub hashes: HashMap<String, FileTracking>,
}

/// Compiled include/exclude matchers for one project, plus gitignore rules
/// found at the root.
pub struct ScanFilter {
    include: GlobSet,
    include_empty: bool,
    exclude: GlobSet,
    gitignore: Option<Gitignore>,
    max_file_size: u64,
}

impl ScanFilter {
    pub fn new(root: &Path, config: &IndexerConfig) -> Result<Self> {
        Ok(Self {
            include: compile_globs(&config.include)?,
            include_empty: config.include.is_empty(),
            exclude: compile_globs(&config.exclude)?,
            gitignore: load_gitignore(root),
            max_file_size: config.max_file_size,
        })
    }

    /// Filtering decision for a path relative to the project root.
    pub fn matches(&self, relative: &Path) -> bool {
        if self.exclude.is_match(relative) {
            return false;
        }
        if let Some(gitignore) = &self.gitignore {
            if gitignore.matched_path_or_any_parents(relative, false).is_ignore() {
                return false;
            }
        }
        self.include_empty || self.include.is_match(relative)
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }
}

/// Compile `.gitignore` and `.ignore` rules from the project root.
/// A malformed file is logged and skipped, never fatal.
fn load_gitignore(root: &Path) -> Option<Gitignore> {
    let mut builder = ignore::gitignore::GitignoreBuilder::new(root);
    let mut found = false;
    for name in [".gitignore", ".ignore"] {
        let path = root.join(name);
        if path.exists() {
            found = true;
            if let Some(err) = builder.add(&path) {
                warn!("failed to load {}: {}", path.display(), err);
            }
        }
    }
    if !found {
        return None;
    }
    builder.build().ok()
}

fn compile_globs(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .with_context(|| format!("invalid glob pattern '{}'", pattern))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Scan `root` for candidate files and diff them against `tracked`.
///
/// When `tracked` is `None`, every file is reported as changed and nothing
/// as deleted (full-index semantics). Files above the size cap never appear
/// in any list. Unreadable entries are skipped, not fatal.
pub fn scan_project(
    root: &Path,
    config: &IndexerConfig,
    tracked: Option<&HashMap<String, FileTracking>>,
) -> Result<ScanOutcome> {
    let filter = ScanFilter::new(root, config)?;
    let mut outcome = ScanOutcome::default();

    for entry in walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        if !filter.matches(relative) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if metadata.len() > filter.max_file_size() {
            continue;
        }

        let path_str = path.to_string_lossy().to_string();
        let mtime = mtime_millis(&metadata);

        let is_changed = match tracked {
            Some(tracked) => tracked
                .get(&path_str)
                .map(|record| record.mtime != mtime)
                .unwrap_or(true),
            None => true,
        };
        if is_changed {
            if let Ok(hash) = file_digest(path, &metadata) {
                outcome
                    .hashes
                    .insert(path_str.clone(), FileTracking { mtime, hash });
            }
            outcome.changed.push(path_str.clone());
        }
        outcome.files.push(path_str);
    }

    outcome.files.sort();
    outcome.changed.sort();

    if let Some(tracked) = tracked {
        let present: std::collections::HashSet<&String> = outcome.files.iter().collect();
        outcome.deleted = tracked
            .keys()
            .filter(|path| !present.contains(path))
            .cloned()
            .collect();
        outcome.deleted.sort();
    }

    Ok(outcome)
}

fn mtime_millis(metadata: &std::fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Stable digest for one file.
pub fn file_digest(path: &Path, metadata: &std::fs::Metadata) -> Result<String> {
    if metadata.len() <= CONTENT_HASH_THRESHOLD {
        let content = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut hasher = Sha256::new();
        hasher.update(&content);
        Ok(hex::encode(hasher.finalize()))
    } else {
        let mut hasher = Sha256::new();
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update(mtime_millis(metadata).to_le_bytes());
        hasher.update(metadata.len().to_le_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}
