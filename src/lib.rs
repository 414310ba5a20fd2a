//! Sextant: a queryable, persistent knowledge graph of a source tree.
//!
//! Sextant scans a project, extracts symbols and typed dependencies from
//! concrete-syntax trees across seven languages, persists them to a
//! namespaced graph store, keeps them current under filesystem mutation,
//! and scores the graph for structural importance.

pub mod config;
pub mod error;
pub mod extractor;
pub mod git;
pub mod graph;
pub mod indexer;
pub mod ingest;
pub mod model;
pub mod query;
pub mod resolver;
pub mod scanner;
pub mod store;
pub mod watcher;

pub use config::Config;
pub use error::SextantError;
pub use extractor::{ExtractProgress, ExtractionResult, Extractor, FileError};
pub use git::GitProvider;
pub use graph::GraphAnalytics;
pub use indexer::{IndexOptions, IndexStats, Indexer, ReconcileOutcome};
pub use ingest::{EdgeKind, Language, SymbolKind};
pub use model::{Edge, FileTracking, GitMetadata, ProjectMetadata, ProjectStats, Span, Symbol};
pub use query::{DependentsOptions, QueryService, SearchFilter, SymbolFilter};
pub use resolver::{DependencyReport, Resolver};
pub use scanner::{scan_project, ScanOutcome};
pub use store::{GraphStore, MemoryBackend, RedisBackend, StoreBackend};
pub use watcher::{run_watch_loop, FileSystemWatcher, WatchBatch};
