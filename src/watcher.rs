//! Filesystem watcher with debounced batch events.
//!
//! Events within the debounce window are collected, filtered through the
//! same exclude rules as the scanner, de-duplicated, sorted, and emitted as
//! one batch. Event types do not survive debouncing, so the consumer
//! reconciles against actual file state ([`crate::indexer::Indexer::reconcile_file`]).
//! The watch loop additionally coalesces processed paths over a secondary
//! window (twice the debounce) into grouped emissions for subscribers.

use anyhow::Result;
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{IndexerConfig, WatcherSettings};
use crate::graph::GraphAnalytics;
use crate::indexer::{Indexer, ReconcileOutcome};
use crate::scanner::ScanFilter;

/// Deterministic batch of dirty paths, sorted lexicographically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchBatch {
    pub paths: Vec<String>,
}

impl WatchBatch {
    fn from_set(paths: BTreeSet<String>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Watches a project tree and emits debounced [`WatchBatch`]es.
pub struct FileSystemWatcher {
    batch_rx: async_channel::Receiver<WatchBatch>,
    shutdown: Arc<AtomicBool>,
    debounce_ms: u64,
    _thread: thread::JoinHandle<()>,
}

impl FileSystemWatcher {
    /// Start watching `root` recursively, honouring the indexer's
    /// include/exclude globs.
    pub fn new(
        root: PathBuf,
        settings: &WatcherSettings,
        indexer_config: &IndexerConfig,
    ) -> Result<Self> {
        let (batch_tx, batch_rx) = async_channel::unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));
        let filter = ScanFilter::new(&root, indexer_config)?;
        let debounce_ms = settings.debounce_ms;

        let thread_shutdown = Arc::clone(&shutdown);
        let thread = thread::spawn(move || {
            if let Err(e) = run_watcher(root, batch_tx, filter, debounce_ms, thread_shutdown) {
                warn!("watcher stopped: {}", e);
            }
        });

        Ok(Self {
            batch_rx,
            shutdown,
            debounce_ms,
            _thread: thread,
        })
    }

    /// Next debounced batch, or `None` after shutdown.
    pub async fn recv_batch(&self) -> Option<WatchBatch> {
        self.batch_rx.recv().await.ok()
    }

    pub fn debounce_ms(&self) -> u64 {
        self.debounce_ms
    }

    /// Signal the watcher thread to exit after its next poll.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.batch_rx.close();
    }
}

/// Debouncer thread: collect, filter, sort, emit.
fn run_watcher(
    root: PathBuf,
    tx: async_channel::Sender<WatchBatch>,
    filter: ScanFilter,
    debounce_ms: u64,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    let watch_root = root.clone();
    let mut debouncer = new_debouncer(
        Duration::from_millis(debounce_ms),
        move |result: notify_debouncer_mini::DebounceEventResult| match result {
            Ok(events) => {
                let mut dirty = BTreeSet::new();
                for event in &events {
                    let path = &event.path;
                    if path.is_dir() {
                        continue;
                    }
                    let relative = path.strip_prefix(&root).unwrap_or(path);
                    // Deletions must pass through: the glob check still
                    // applies so excluded paths never surface.
                    if !filter.matches(relative) {
                        continue;
                    }
                    dirty.insert(path.to_string_lossy().to_string());
                }
                if !dirty.is_empty() {
                    let _ = tx.send_blocking(WatchBatch::from_set(dirty));
                }
            }
            Err(error) => warn!("watch error: {:?}", error),
        },
    )?;

    debouncer
        .watcher()
        .watch(&watch_root, RecursiveMode::Recursive)?;

    while !shutdown.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(200));
    }
    Ok(())
}

/// Drive reconciliation from watch batches until the watcher shuts down.
///
/// Each path in a batch is reconciled individually; PageRank is recomputed
/// after every processed batch. Processed paths accumulate and are emitted
/// to `grouped_tx` (when given) once the stream has been quiet for twice
/// the debounce window.
pub async fn run_watch_loop(
    indexer: &Indexer,
    watcher: &FileSystemWatcher,
    grouped_tx: Option<async_channel::Sender<WatchBatch>>,
) -> Result<()> {
    let group_window = Duration::from_millis(watcher.debounce_ms() * 2);
    let mut pending: BTreeSet<String> = BTreeSet::new();

    loop {
        let next = tokio::time::timeout(group_window, watcher.recv_batch()).await;
        match next {
            Ok(Some(batch)) => {
                for path in batch.paths {
                    match indexer.reconcile_file(&path).await {
                        Ok(ReconcileOutcome::Unchanged) => {
                            debug!(path, "unchanged, skipped");
                        }
                        Ok(ReconcileOutcome::Failed(error)) => {
                            warn!(path = %error.path, "reconcile failed: {}", error.message);
                            pending.insert(path);
                        }
                        Ok(_) => {
                            pending.insert(path);
                        }
                        Err(e) => return Err(e), // store failure is fatal
                    }
                }
                let analytics = GraphAnalytics::new(indexer.store());
                analytics.compute_pagerank(indexer.pagerank_config()).await?;
            }
            Ok(None) => break, // watcher shut down
            Err(_) => {
                // Quiet for a full group window: flush the grouped batch.
                if !pending.is_empty() {
                    if let Some(tx) = &grouped_tx {
                        let _ = tx.send(WatchBatch::from_set(pending.clone())).await;
                    }
                    pending.clear();
                }
            }
        }
    }
    if !pending.is_empty() {
        if let Some(tx) = &grouped_tx {
            let _ = tx.send(WatchBatch::from_set(pending)).await;
        }
    }
    Ok(())
}
