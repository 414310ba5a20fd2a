//! Git metadata provider.
//!
//! Derives per-file churn, contributors, and stability from repository
//! history. The provider is a pluggable metadata source with a narrow
//! contract: `metadata_for` returns `None` whenever git is disabled, the
//! file is not in a repository, or anything goes wrong — indexing never
//! fails because of git. Results are cached by `(path, file hash, head
//! commit)` and the provider never touches the store.

use dashmap::DashMap;
use git2::{Repository, Sort};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::config::GitConfig;
use crate::model::GitMetadata;

/// Hard ceiling on commits walked per lookup, regardless of history depth.
const MAX_WALK: usize = 1_000;

/// How many contributors to report.
const TOP_CONTRIBUTORS: usize = 3;

#[derive(Clone)]
struct CacheEntry {
    file_hash: Option<String>,
    head_sha: String,
    metadata: Option<GitMetadata>,
}

/// Cached, side-effect-free git history reader.
#[derive(Clone)]
pub struct GitProvider {
    config: GitConfig,
    cache: Arc<DashMap<String, CacheEntry>>,
}

impl GitProvider {
    pub fn new(config: GitConfig) -> Self {
        Self {
            config,
            cache: Arc::new(DashMap::new()),
        }
    }

    /// Drop the cached entry for one file, forcing the next lookup to walk
    /// history again.
    pub fn invalidate(&self, filepath: &str) {
        self.cache.remove(filepath);
    }

    /// Metadata for one file, or `None` when disabled or unavailable.
    pub async fn metadata_for(
        &self,
        filepath: &str,
        file_hash: Option<&str>,
    ) -> Option<GitMetadata> {
        if !self.config.enabled {
            return None;
        }
        let provider = self.clone();
        let filepath = filepath.to_string();
        let file_hash = file_hash.map(|s| s.to_string());

        // libgit2 is synchronous; keep it off the async workers.
        tokio::task::spawn_blocking(move || provider.lookup_blocking(&filepath, file_hash))
            .await
            .ok()
            .flatten()
    }

    fn lookup_blocking(&self, filepath: &str, file_hash: Option<String>) -> Option<GitMetadata> {
        let path = Path::new(filepath);
        let repo = match Repository::discover(path.parent().unwrap_or(path)) {
            Ok(repo) => repo,
            Err(e) => {
                debug!(filepath, "no repository: {}", e);
                return None;
            }
        };

        let head_sha = repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok())
            .map(|commit| commit.id().to_string())?;

        if let Some(entry) = self.cache.get(filepath) {
            if entry.head_sha == head_sha && entry.file_hash == file_hash {
                return entry.metadata.clone();
            }
        }

        let metadata = self.walk_history(&repo, path);
        self.cache.insert(
            filepath.to_string(),
            CacheEntry {
                file_hash,
                head_sha,
                metadata: metadata.clone(),
            },
        );
        metadata
    }

    /// Walk history newest-first, collecting commits that touched the file
    /// inside the sampling window.
    fn walk_history(&self, repo: &Repository, path: &Path) -> Option<GitMetadata> {
        let workdir = repo.workdir()?;
        let rel_path = path.strip_prefix(workdir).ok()?.to_str()?.to_string();

        let mut revwalk = repo.revwalk().ok()?;
        revwalk.push_head().ok()?;
        revwalk.set_sorting(Sort::TIME).ok()?;

        let now = chrono::Utc::now().timestamp();
        let window_start = now - self.config.sample_window_days * 86_400;

        let mut touching: Vec<(String, i64, String)> = Vec::new(); // (sha, time, author)
        let mut walked = 0usize;

        for oid in revwalk {
            walked += 1;
            if walked > MAX_WALK || touching.len() >= self.config.history_depth {
                break;
            }
            let Ok(oid) = oid else { continue };
            let Ok(commit) = repo.find_commit(oid) else {
                continue;
            };
            let commit_time = commit.time().seconds();
            if commit_time < window_start {
                break; // sorted by time: everything older is out of window
            }

            // Diff against the first parent to see whether this commit
            // touched the file.
            let Ok(tree) = commit.tree() else { continue };
            let parent_tree = commit.parent(0).ok().and_then(|p| p.tree().ok());
            let Ok(diff) = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None) else {
                continue;
            };

            let mut touched = false;
            diff.foreach(
                &mut |delta, _| {
                    let changed = delta
                        .new_file()
                        .path()
                        .or_else(|| delta.old_file().path())
                        .and_then(|p| p.to_str());
                    if changed == Some(rel_path.as_str()) {
                        touched = true;
                    }
                    true
                },
                None,
                None,
                None,
            )
            .ok();

            if touched {
                let author = commit
                    .author()
                    .name()
                    .unwrap_or("unknown")
                    .to_string();
                touching.push((oid.to_string(), commit_time, author));
            }
        }

        if touching.is_empty() {
            return None;
        }

        let churn = touching.len() as u32;
        let (last_sha, last_time, _) = touching[0].clone();
        let last_commit_at = chrono::DateTime::from_timestamp(last_time, 0)?;

        let mut by_author: std::collections::HashMap<&str, usize> =
            std::collections::HashMap::new();
        for (_, _, author) in &touching {
            *by_author.entry(author.as_str()).or_insert(0) += 1;
        }
        let mut contributors: Vec<(&str, usize)> = by_author.into_iter().collect();
        contributors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let ownership_confidence = contributors
            .first()
            .map(|(_, count)| *count as f64 / touching.len() as f64)
            .unwrap_or(0.0);
        let top_contributors: Vec<String> = contributors
            .into_iter()
            .take(TOP_CONTRIBUTORS)
            .map(|(name, _)| name.to_string())
            .collect();

        Some(GitMetadata {
            last_commit_sha: Some(last_sha),
            last_commit_at: Some(last_commit_at),
            churn_count: Some(churn),
            top_contributors,
            stability_score: GitMetadata::stability_from_churn(churn),
            freshness_days: Some((now - last_time) / 86_400),
            ownership_confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(enabled: bool) -> GitProvider {
        GitProvider::new(GitConfig {
            enabled,
            ..GitConfig::default()
        })
    }

    #[tokio::test]
    async fn disabled_provider_returns_none() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("a.ts");
        std::fs::write(&file, "let a = 1;").unwrap();

        let result = provider(false)
            .metadata_for(&file.to_string_lossy(), None)
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn file_outside_any_repository_degrades_to_none() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("a.ts");
        std::fs::write(&file, "let a = 1;").unwrap();

        let result = provider(true)
            .metadata_for(&file.to_string_lossy(), None)
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn committed_file_reports_churn_and_stability() {
        let dir = tempfile::TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let file = dir.path().join("a.ts");

        let sig = git2::Signature::now("Dev One", "dev@example.com").unwrap();
        let mut commit_file = |content: &str, message: &str| {
            std::fs::write(&file, content).unwrap();
            let mut index = repo.index().unwrap();
            index.add_path(Path::new("a.ts")).unwrap();
            index.write().unwrap();
            let tree_id = index.write_tree().unwrap();
            let tree = repo.find_tree(tree_id).unwrap();
            let parent = repo
                .head()
                .ok()
                .and_then(|h| h.peel_to_commit().ok());
            let parents: Vec<&git2::Commit> = parent.iter().collect();
            repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
                .unwrap();
        };
        commit_file("let a = 1;", "add a");
        commit_file("let a = 2;", "bump a");

        let metadata = provider(true)
            .metadata_for(&file.to_string_lossy(), Some("hash1"))
            .await
            .expect("metadata for committed file");

        assert_eq!(metadata.churn_count, Some(2));
        assert!((metadata.stability_score - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(metadata.top_contributors, vec!["Dev One".to_string()]);
        assert!((metadata.ownership_confidence - 1.0).abs() < 1e-12);
        assert!(metadata.last_commit_sha.is_some());
        assert_eq!(metadata.freshness_days, Some(0));
    }

    #[tokio::test]
    async fn cache_is_keyed_by_head_and_file_hash() {
        let dir = tempfile::TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let file = dir.path().join("a.ts");

        let sig = git2::Signature::now("Dev One", "dev@example.com").unwrap();
        std::fs::write(&file, "let a = 1;").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("a.ts")).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "add a", &tree, &[])
            .unwrap();

        let provider = provider(true);
        let path = file.to_string_lossy().to_string();

        let first = provider.metadata_for(&path, Some("h1")).await.unwrap();
        // Same head, same hash: served from cache, identical answer.
        let second = provider.metadata_for(&path, Some("h1")).await.unwrap();
        assert_eq!(first, second);
    }
}
