//! Store key layout and project namespacing.
//!
//! Every key is prefixed `<app>:<project>:` where `project` is a
//! deterministic sanitisation of the absolute project root. Key suffixes:
//!
//! - `symbol:<id>` — hash of the symbol record
//! - `idx:file:<path>` / `idx:name:<n>` / `idx:kind:<k>` — sets of IDs
//! - `deps:from:<id>` / `deps:to:<id>` — sets of counterpart IDs
//! - `edge:from:<from>:to:<to>` — hash of the edge record
//! - `pagerank` — sorted set of IDs by score
//! - `file:<path>` — hash `{mtime, hash}`
//! - `root`, `indexed_at`, `stats` — scalars
//! - `lock:<name>` — string with TTL

/// Sanitise an absolute project root into a key-safe project name:
/// every non-alphanumeric byte becomes `_`.
pub fn project_name(root: &str) -> String {
    root.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

pub fn symbol_key(id: &str) -> String {
    format!("symbol:{}", id)
}

pub fn file_index_key(path: &str) -> String {
    format!("idx:file:{}", path)
}

pub fn name_index_key(name: &str) -> String {
    format!("idx:name:{}", name)
}

pub fn kind_index_key(kind: &str) -> String {
    format!("idx:kind:{}", kind)
}

pub fn deps_from_key(id: &str) -> String {
    format!("deps:from:{}", id)
}

pub fn deps_to_key(id: &str) -> String {
    format!("deps:to:{}", id)
}

pub fn edge_key(from: &str, to: &str) -> String {
    format!("edge:from:{}:to:{}", from, to)
}

pub fn tracking_key(path: &str) -> String {
    format!("file:{}", path)
}

pub fn lock_key(name: &str) -> String {
    format!("lock:{}", name)
}

pub const PAGERANK_KEY: &str = "pagerank";
pub const ROOT_KEY: &str = "root";
pub const INDEXED_AT_KEY: &str = "indexed_at";
pub const STATS_KEY: &str = "stats";
