//! Watch-loop integration: debounced events drive per-file reconciliation
//! and grouped batches reach subscribers.

use std::sync::Arc;
use std::time::Duration;

use sextant::{
    run_watch_loop, Config, FileSystemWatcher, GraphStore, IndexOptions, Indexer, MemoryBackend,
};

fn test_config() -> Config {
    let mut config = Config::default();
    config.git.enabled = false;
    config.watcher.enabled = true;
    config.watcher.debounce_ms = 50;
    config
}

#[tokio::test]
async fn watch_loop_reconciles_and_groups() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("seed.ts"), "export class Seed {}\n").unwrap();

    let config = test_config();
    let store = Arc::new(GraphStore::new(Arc::new(MemoryBackend::new()), "sextant"));
    let indexer = Arc::new(Indexer::new(store, config.clone()));

    indexer
        .index_project(dir.path(), IndexOptions::default(), None)
        .await
        .unwrap();

    let watcher = Arc::new(
        FileSystemWatcher::new(dir.path().to_path_buf(), &config.watcher, &config.indexer)
            .unwrap(),
    );
    let (grouped_tx, grouped_rx) = async_channel::unbounded();

    let loop_indexer = Arc::clone(&indexer);
    let loop_watcher = Arc::clone(&watcher);
    let loop_handle = tokio::spawn(async move {
        run_watch_loop(&loop_indexer, &loop_watcher, Some(grouped_tx)).await
    });

    // Let the watcher arm, then create a file.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let fresh = dir.path().join("fresh.ts");
    std::fs::write(&fresh, "export class Fresh {}\n").unwrap();
    let fresh_str = fresh.to_string_lossy().to_string();

    let grouped = tokio::time::timeout(Duration::from_secs(10), grouped_rx.recv())
        .await
        .expect("grouped batch within timeout")
        .expect("loop alive");
    assert!(grouped.paths.iter().any(|p| p.ends_with("fresh.ts")));

    // The reconcile path stored the new file's symbols and tracking.
    assert!(!indexer
        .store()
        .symbols_in_file(&fresh_str)
        .await
        .unwrap()
        .is_empty());
    assert!(indexer
        .store()
        .file_tracking(&fresh_str)
        .await
        .unwrap()
        .is_some());

    // Deleting the file cleans it back out.
    std::fs::remove_file(&fresh).unwrap();
    let grouped = tokio::time::timeout(Duration::from_secs(10), grouped_rx.recv())
        .await
        .expect("deletion batch within timeout")
        .expect("loop alive");
    assert!(grouped.paths.iter().any(|p| p.ends_with("fresh.ts")));
    assert!(indexer
        .store()
        .symbols_in_file(&fresh_str)
        .await
        .unwrap()
        .is_empty());

    watcher.shutdown();
    tokio::time::timeout(Duration::from_secs(5), loop_handle)
        .await
        .expect("loop exits after shutdown")
        .expect("loop task join")
        .expect("loop result");
}
