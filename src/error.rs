//! Error kinds for indexing, storage, and configuration failures.
//!
//! Per-file parse failures are recorded and skipped, never fatal. Store
//! write failures are fatal to the current batch and re-raised. Lock
//! contention and configuration problems surface as typed errors so the CLI
//! can print actionable messages.

use thiserror::Error;

/// Typed failure kinds surfaced by the indexing engine.
#[derive(Debug, Error)]
pub enum SextantError {
    /// A single file could not be parsed. Recorded into stats and skipped.
    #[error("failed to parse {path}: {message}")]
    ParseFailure { path: String, message: String },

    /// A store read or write failed. Fatal to the current batch.
    #[error("store I/O failure: {0}")]
    StoreIo(String),

    /// The named project lock is already held by another writer.
    #[error("lock '{0}' is held; another indexing run is in progress")]
    LockContention(String),

    /// The configuration file is missing or malformed. Fatal at startup.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The storage backend did not answer the initial ping. Fatal at startup.
    #[error("storage backend unreachable at {url}: {message}\n{hint}")]
    BackendUnreachable {
        url: String,
        message: String,
        hint: String,
    },
}

/// Platform-specific hint printed when the backend ping fails.
pub fn backend_install_hint() -> &'static str {
    if cfg!(target_os = "macos") {
        "Start Redis with: brew install redis && brew services start redis"
    } else if cfg!(target_os = "windows") {
        "Start Redis with: docker run -d -p 6379:6379 redis:7-alpine"
    } else {
        "Start Redis with: sudo apt install redis-server && sudo systemctl start redis-server\n(or: docker run -d -p 6379:6379 redis:7-alpine)"
    }
}
