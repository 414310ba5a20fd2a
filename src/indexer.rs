//! Top-level indexing pipeline.
//!
//! `index_project` runs the phases in order: switch the store's project
//! context, take the single-writer lock, scan, apply deletions, extract,
//! attach git metadata, replace-and-add symbols, resolve dependencies,
//! update tracking, recompute PageRank, and write project metadata. The
//! lock is released on success and on error; its TTL bounds the damage of
//! a crashed writer.

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::SextantError;
use crate::extractor::{ExtractProgress, Extractor, FileError};
use crate::git::GitProvider;
use crate::graph::GraphAnalytics;
use crate::ingest::EdgeKind;
use crate::model::{Edge, ProjectMetadata, ProjectStats};
use crate::resolver::Resolver;
use crate::scanner;
use crate::store::GraphStore;

/// Name of the per-project indexing lock.
const INDEX_LOCK: &str = "indexing";

/// Lock TTL: long enough for a large run, short enough that a crashed
/// writer does not wedge the project forever.
const INDEX_LOCK_TTL_MS: u64 = 600_000;

/// Options for one indexing run.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexOptions {
    /// Reprocess every file even when tracking says it is unchanged.
    pub force: bool,
    /// Use tracking records to process only changed files.
    pub incremental: bool,
}

/// What [`Indexer::reconcile_file`] did to one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// File gone or no longer eligible; all facts removed.
    Removed,
    /// Content hash matched tracking; nothing touched.
    Unchanged,
    /// Reparsed and replaced wholesale.
    Reindexed,
    /// Extraction failed; stored state untouched.
    Failed(FileError),
}

/// Outcome of one indexing run.
#[derive(Debug, Default)]
pub struct IndexStats {
    pub files_indexed: usize,
    pub files_deleted: usize,
    pub symbols_found: usize,
    pub dependencies_found: usize,
    pub errors: Vec<FileError>,
}

/// Wires scanner, extractor, git provider, resolver, and analytics over one
/// store handle.
pub struct Indexer {
    store: Arc<GraphStore>,
    config: Config,
    git: GitProvider,
}

impl Indexer {
    pub fn new(store: Arc<GraphStore>, config: Config) -> Self {
        let git = GitProvider::new(config.git.clone());
        Self { store, config, git }
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn pagerank_config(&self) -> &crate::config::PagerankConfig {
        &self.config.pagerank
    }

    /// Index the project rooted at `root`.
    ///
    /// Refuses with [`SextantError::LockContention`] when another run holds
    /// the project lock.
    pub async fn index_project(
        &self,
        root: &Path,
        options: IndexOptions,
        progress: Option<&(dyn Fn(&ExtractProgress) + Send + Sync)>,
    ) -> Result<IndexStats> {
        let root_str = root.to_string_lossy().to_string();
        self.store.set_project_context(&root_str).await;

        if !self.store.acquire_lock(INDEX_LOCK, INDEX_LOCK_TTL_MS).await? {
            return Err(SextantError::LockContention(INDEX_LOCK.to_string()).into());
        }

        let result = self.run_pipeline(root, &root_str, options, progress).await;

        if let Err(e) = self.store.release_lock(INDEX_LOCK).await {
            warn!("failed to release index lock: {}", e);
        }
        result
    }

    async fn run_pipeline(
        &self,
        root: &Path,
        root_str: &str,
        options: IndexOptions,
        progress: Option<&(dyn Fn(&ExtractProgress) + Send + Sync)>,
    ) -> Result<IndexStats> {
        let tracked = self.store.all_tracking().await?;
        let incremental = options.incremental && !options.force && !tracked.is_empty();

        let outcome = scanner::scan_project(
            root,
            &self.config.indexer,
            incremental.then_some(&tracked),
        )?;

        // Deletions first so nothing below resurrects them.
        for deleted in &outcome.deleted {
            self.store.remove_file(deleted).await?;
        }

        let files_to_process: &[String] = if options.force {
            &outcome.files
        } else {
            &outcome.changed
        };
        info!(
            total = outcome.files.len(),
            processing = files_to_process.len(),
            deleted = outcome.deleted.len(),
            incremental,
            "indexing {}",
            root_str
        );

        let extractor = Extractor::new(
            self.config.indexer.max_concurrency,
            self.config.indexer.batch_size,
        );
        let mut extraction = extractor.extract_batch(files_to_process, progress).await;

        // Git metadata per distinct file, copied onto every symbol of it.
        let files_with_symbols: HashSet<String> = extraction
            .symbols
            .iter()
            .map(|s| s.filepath.clone())
            .collect();
        let mut git_by_file = HashMap::new();
        for file in &files_with_symbols {
            let hash = outcome.hashes.get(file).map(|t| t.hash.as_str());
            if let Some(metadata) = self.git.metadata_for(file, hash).await {
                git_by_file.insert(file.clone(), metadata);
            }
        }
        for symbol in &mut extraction.symbols {
            symbol.git = git_by_file.get(&symbol.filepath).cloned();
        }

        // Replace-then-add: old symbols of each reprocessed file go first,
        // so a reparse is a wholesale swap.
        for file in files_to_process {
            self.store.remove_file(file).await?;
        }
        self.store.add_symbols(&extraction.symbols).await?;

        // Dependency resolution and edge persistence.
        let edges_persisted = self
            .persist_edges(&extraction.dependencies, files_to_process)
            .await?;

        // Tracking records from the scanner's hashes.
        for file in files_to_process {
            if let Some(tracking) = outcome.hashes.get(file) {
                self.store.put_file_tracking(file, tracking).await?;
            }
        }

        // Full-store PageRank recomputation.
        let analytics = GraphAnalytics::new(&self.store);
        analytics.compute_pagerank(&self.config.pagerank).await?;

        let stats = ProjectStats {
            files: self.store.all_tracking().await?.len() as u64,
            symbols: self.store.all_symbol_ids().await?.len() as u64,
            edges: self.store.all_edges().await?.len() as u64,
        };
        self.store
            .put_project_metadata(&ProjectMetadata {
                root: root_str.to_string(),
                indexed_at: chrono::Utc::now(),
                stats,
            })
            .await?;

        Ok(IndexStats {
            files_indexed: files_to_process.len(),
            files_deleted: outcome.deleted.len(),
            symbols_found: extraction.symbols.len(),
            dependencies_found: edges_persisted,
            errors: extraction.errors,
        })
    }

    /// Bring one file's stored state in line with the filesystem.
    ///
    /// Deterministic update-or-delete semantics regardless of the event
    /// that triggered it: a missing (or now-oversized) file loses all its
    /// facts; an unchanged hash is a no-op; anything else is a wholesale
    /// reparse-and-replace.
    pub async fn reconcile_file(&self, path: &str) -> Result<ReconcileOutcome> {
        let file_path = Path::new(path);
        let metadata = match std::fs::metadata(file_path) {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => {
                self.store.remove_file(path).await?;
                return Ok(ReconcileOutcome::Removed);
            }
        };
        if metadata.len() > self.config.indexer.max_file_size {
            self.store.remove_file(path).await?;
            return Ok(ReconcileOutcome::Removed);
        }

        let hash = scanner::file_digest(file_path, &metadata)?;
        if let Some(tracking) = self.store.file_tracking(path).await? {
            if tracking.hash == hash {
                return Ok(ReconcileOutcome::Unchanged);
            }
        }

        let files = vec![path.to_string()];
        let extractor = Extractor::new(1, 1);
        let mut extraction = extractor.extract_batch(&files, None).await;
        if !extraction.errors.is_empty() {
            return Ok(ReconcileOutcome::Failed(extraction.errors.remove(0)));
        }

        if let Some(git) = self.git.metadata_for(path, Some(&hash)).await {
            for symbol in &mut extraction.symbols {
                symbol.git = Some(git.clone());
            }
        }

        self.store.remove_file(path).await?;
        self.store.add_symbols(&extraction.symbols).await?;
        self.persist_edges(&extraction.dependencies, &files).await?;
        self.store
            .put_file_tracking(
                path,
                &crate::model::FileTracking {
                    mtime: metadata
                        .modified()
                        .ok()
                        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                        .map(|d| d.as_millis() as i64)
                        .unwrap_or(0),
                    hash,
                },
            )
            .await?;
        Ok(ReconcileOutcome::Reindexed)
    }

    /// Persist batch edges: imports resolve cross-file (unresolved ones stay
    /// file→specifier), other kinds are kept only when both endpoints are
    /// stored symbols, and intra-file symbolic edges are derived from
    /// signatures.
    async fn persist_edges(
        &self,
        dependencies: &[Edge],
        processed_files: &[String],
    ) -> Result<usize> {
        let resolver = Resolver::new(&self.store);
        let known: HashSet<String> = self.store.all_symbol_ids().await?.into_iter().collect();

        let (imports, symbolic): (Vec<Edge>, Vec<Edge>) = dependencies
            .iter()
            .cloned()
            .partition(|e| e.kind == EdgeKind::Imports);

        let mut persisted = 0usize;

        let (resolved, unresolved) = resolver.resolve_imports(&imports).await?;
        for edge in resolved.iter().chain(unresolved.iter()) {
            self.store.add_edge(edge).await?;
            persisted += 1;
        }

        // Parser-emitted symbolic edges: both endpoints must exist.
        for edge in &symbolic {
            if known.contains(&edge.from) && known.contains(&edge.to) {
                self.store.add_edge(edge).await?;
                persisted += 1;
            }
        }

        // Signature-derived intra-file edges.
        for file in processed_files {
            for edge in resolver.resolve_symbolic(file).await? {
                self.store.add_edge(&edge).await?;
                persisted += 1;
            }
        }

        Ok(persisted)
    }
}
