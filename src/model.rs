//! Core record types persisted to the graph store.
//!
//! Pure data structures shared by the extractor, resolver, store, and query
//! layers. No behavior beyond identity and (de)serialization helpers.

use serde::{Deserialize, Serialize};

use crate::ingest::{EdgeKind, SymbolKind};

/// A point in a source file.
///
/// Lines are 1-based, columns are 0-based (byte columns), matching the
/// conventions of editor protocols.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Point {
    pub line: usize,
    pub column: usize,
}

/// A source span from `start` to `end`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Span {
    pub start: Point,
    pub end: Point,
}

impl Span {
    pub fn new(start_line: usize, start_col: usize, end_line: usize, end_col: usize) -> Self {
        Self {
            start: Point {
                line: start_line,
                column: start_col,
            },
            end: Point {
                line: end_line,
                column: end_col,
            },
        }
    }
}

/// A named program entity extracted from source.
///
/// Identity is the canonical ID `"<filepath>:<name>:<row>"` where `<row>` is
/// the 0-based start row of the defining syntax node. Two same-named
/// declarations on different lines are distinct symbols.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Symbol {
    pub id: String,
    pub name: String,
    pub kind: SymbolKind,
    pub filepath: String,
    pub location: Span,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    /// ID of the lexically enclosing symbol, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// IDs of directly enclosed symbols.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    pub exported: bool,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitMetadata>,
    #[serde(rename = "pageRank", skip_serializing_if = "Option::is_none")]
    pub page_rank: Option<f64>,
}

impl Symbol {
    /// Build the canonical symbol ID from its parts.
    pub fn canonical_id(filepath: &str, name: &str, start_row: usize) -> String {
        format!("{}:{}:{}", filepath, name, start_row)
    }
}

/// A typed directed relation between two symbols.
///
/// For `imports` edges as emitted by parsers, `from` is a filepath and `to`
/// is the raw import specifier as written; every other kind connects two
/// symbol IDs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Span>,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind,
            location: None,
        }
    }

    /// Dedup key: two edges are the same when endpoints and kind agree.
    pub fn dedup_key(&self) -> (String, String, EdgeKind) {
        (self.from.clone(), self.to.clone(), self.kind)
    }
}

/// Per-file change-tracking record.
///
/// `hash` is a SHA-256 content digest for files under the hashing threshold
/// and a metadata digest (path, mtime, size) above it; either form is a
/// stable string suitable for change detection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileTracking {
    /// Modification time in milliseconds since the epoch.
    pub mtime: i64,
    pub hash: String,
}

/// Counts written into project metadata at the end of an indexing run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectStats {
    pub files: u64,
    pub symbols: u64,
    pub edges: u64,
}

/// Project-level metadata, overwritten at the end of each indexing run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectMetadata {
    pub root: String,
    pub indexed_at: chrono::DateTime<chrono::Utc>,
    pub stats: ProjectStats,
}

/// Git-derived metadata for one file. Opaque to the indexing core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GitMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_commit_sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_commit_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub churn_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_contributors: Vec<String>,
    /// `1 / (1 + churn_count)`; 1.0 for a file with no recorded churn.
    pub stability_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freshness_days: Option<i64>,
    pub ownership_confidence: f64,
}

impl GitMetadata {
    /// Stability from churn: `1 / (1 + churn)`.
    pub fn stability_from_churn(churn: u32) -> f64 {
        1.0 / (1.0 + churn as f64)
    }
}
