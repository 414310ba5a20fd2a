//! Batch extraction: routes files to parsers and normalises their facts.
//!
//! The extractor turns per-file walker output into store-ready records:
//! canonical IDs, ID-based parent/child links, deduplicated symbols and
//! edges. Files are processed concurrently up to `max_concurrency` within
//! batches of `batch_size`; batches complete in submission order and a
//! progress signal is emitted after each one.

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::ingest::{self, EdgeKind, FileFacts, Language};
use crate::model::{Edge, Symbol};

/// Per-file extraction failure, recorded and skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileError {
    pub path: String,
    pub message: String,
}

/// Progress snapshot emitted after every batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractProgress {
    pub files_processed: usize,
    pub total_files: usize,
    pub symbols_found: usize,
    pub dependencies_found: usize,
    pub errors: usize,
}

/// Callback invoked after each completed batch.
pub type ProgressFn<'a> = &'a (dyn Fn(&ExtractProgress) + Send + Sync);

/// Everything extracted from one batch of files.
#[derive(Debug, Default)]
pub struct ExtractionResult {
    pub symbols: Vec<Symbol>,
    pub dependencies: Vec<Edge>,
    pub errors: Vec<FileError>,
}

/// Orchestrates parsers over batches of files.
pub struct Extractor {
    max_concurrency: usize,
    batch_size: usize,
}

impl Extractor {
    pub fn new(max_concurrency: usize, batch_size: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            batch_size: batch_size.max(1),
        }
    }

    /// Extract symbols and dependencies from `files`.
    ///
    /// Files with unknown extensions yield no parser invocation. Read and
    /// parse failures become [`FileError`] records; they never abort the
    /// batch.
    pub async fn extract_batch(
        &self,
        files: &[String],
        progress: Option<ProgressFn<'_>>,
    ) -> ExtractionResult {
        let total = files.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));

        let mut symbols_by_id: HashMap<String, Symbol> = HashMap::new();
        let mut edge_keys: HashSet<(String, String, EdgeKind)> = HashSet::new();
        let mut dependencies: Vec<Edge> = Vec::new();
        let mut errors: Vec<FileError> = Vec::new();
        let mut processed = 0usize;

        for batch in files.chunks(self.batch_size) {
            let mut handles = Vec::with_capacity(batch.len());
            for path in batch {
                let Some(language) = Language::from_path(path) else {
                    continue; // unknown extension: no result
                };
                let path = path.clone();
                let semaphore = Arc::clone(&semaphore);
                handles.push(tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .expect("extraction semaphore closed");
                    extract_file(path, language).await
                }));
            }

            for joined in futures::future::join_all(handles).await {
                match joined {
                    Ok(Ok((file_symbols, file_edges))) => {
                        for symbol in file_symbols {
                            symbols_by_id.entry(symbol.id.clone()).or_insert(symbol);
                        }
                        for edge in file_edges {
                            if edge_keys.insert(edge.dedup_key()) {
                                dependencies.push(edge);
                            }
                        }
                    }
                    Ok(Err(error)) => {
                        warn!(path = %error.path, "extraction failed: {}", error.message);
                        errors.push(error);
                    }
                    Err(join_error) => {
                        errors.push(FileError {
                            path: String::new(),
                            message: format!("extraction task failed: {}", join_error),
                        });
                    }
                }
            }

            processed += batch.len();
            if let Some(callback) = progress {
                callback(&ExtractProgress {
                    files_processed: processed,
                    total_files: total,
                    symbols_found: symbols_by_id.len(),
                    dependencies_found: dependencies.len(),
                    errors: errors.len(),
                });
            }
        }

        let mut symbols: Vec<Symbol> = symbols_by_id.into_values().collect();
        symbols.sort_by(|a, b| a.id.cmp(&b.id));
        dependencies.sort_by(|a, b| {
            (&a.from, &a.to, a.kind.as_str()).cmp(&(&b.from, &b.to, b.kind.as_str()))
        });

        debug!(
            symbols = symbols.len(),
            dependencies = dependencies.len(),
            errors = errors.len(),
            "extraction finished"
        );
        ExtractionResult {
            symbols,
            dependencies,
            errors,
        }
    }
}

/// Read, parse, and normalise one file.
async fn extract_file(
    path: String,
    language: Language,
) -> Result<(Vec<Symbol>, Vec<Edge>), FileError> {
    let source = tokio::fs::read(&path).await.map_err(|e| FileError {
        path: path.clone(),
        message: e.to_string(),
    })?;

    // CPU-bound parse runs on the blocking pool, where the thread-local
    // parser pool amortises parser construction.
    let result = tokio::task::spawn_blocking(move || {
        let facts = ingest::parse_source(language, &path, &source);
        normalise_file(&path, language, facts)
    })
    .await;

    result.map_err(|e| FileError {
        path: String::new(),
        message: format!("parser task failed: {}", e),
    })
}

/// Two-pass normalisation of one file's facts.
///
/// Pass one assigns canonical IDs. Pass two resolves name-based parent
/// references to IDs (populating the parent's `children`) and rewrites edge
/// endpoints: imports stay file→specifier; for all other kinds a bare `from`
/// name becomes a local ID when one matches (synthesised `<path>:<name>:1`
/// otherwise), and `to` is rewritten only when it names a local symbol.
fn normalise_file(
    filepath: &str,
    language: Language,
    facts: FileFacts,
) -> (Vec<Symbol>, Vec<Edge>) {
    let mut symbols: Vec<Symbol> = Vec::with_capacity(facts.symbols.len());
    let mut by_name: HashMap<String, String> = HashMap::new();

    for raw in &facts.symbols {
        let id = Symbol::canonical_id(filepath, &raw.name, raw.start_row);
        by_name.entry(raw.name.clone()).or_insert_with(|| id.clone());
        symbols.push(Symbol {
            id,
            name: raw.name.clone(),
            kind: raw.kind,
            filepath: filepath.to_string(),
            location: raw.location,
            signature: raw.signature.clone(),
            docstring: raw.docstring.clone(),
            parent: raw.parent.clone(), // name for now, ID below
            children: Vec::new(),
            exported: raw.exported,
            language: language.as_str().to_string(),
            git: None,
            page_rank: None,
        });
    }

    // Resolve parents from names to IDs and collect children.
    let mut children_of: HashMap<String, Vec<String>> = HashMap::new();
    for symbol in &mut symbols {
        let Some(parent_name) = symbol.parent.take() else {
            continue;
        };
        let Some(parent_id) = by_name.get(&parent_name) else {
            continue; // parent not extracted; leave the symbol top-level
        };
        if parent_id == &symbol.id {
            continue;
        }
        symbol.parent = Some(parent_id.clone());
        children_of
            .entry(parent_id.clone())
            .or_default()
            .push(symbol.id.clone());
    }
    for symbol in &mut symbols {
        if let Some(children) = children_of.remove(&symbol.id) {
            symbol.children = children;
        }
    }

    let edges = facts
        .edges
        .into_iter()
        .map(|raw| {
            if raw.kind == EdgeKind::Imports {
                return Edge {
                    from: raw.from,
                    to: raw.to,
                    kind: raw.kind,
                    location: raw.location,
                };
            }
            let from = by_name
                .get(&raw.from)
                .cloned()
                .unwrap_or_else(|| format!("{}:{}:1", filepath, raw.from));
            let to = by_name.get(&raw.to).cloned().unwrap_or(raw.to);
            Edge {
                from,
                to,
                kind: raw.kind,
                location: raw.location,
            }
        })
        .collect();

    (symbols, edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::SymbolKind;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn write(dir: &std::path::Path, name: &str, content: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path.to_string_lossy().to_string()
    }

    #[tokio::test]
    async fn extracts_symbols_with_canonical_ids() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write(dir.path(), "a.ts", "export class A {}\n");

        let extractor = Extractor::new(4, 10);
        let result = extractor.extract_batch(&[path.clone()], None).await;

        assert_eq!(result.symbols.len(), 1);
        assert_eq!(result.symbols[0].id, format!("{}:A:0", path));
        assert_eq!(result.symbols[0].language, "typescript");
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn parent_names_resolve_to_ids_with_children() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "a.ts",
            "class Engine {\n  start() {}\n  stop() {}\n}\n",
        );

        let extractor = Extractor::new(4, 10);
        let result = extractor.extract_batch(&[path.clone()], None).await;

        let engine = result
            .symbols
            .iter()
            .find(|s| s.name == "Engine")
            .unwrap();
        let start = result.symbols.iter().find(|s| s.name == "start").unwrap();

        assert_eq!(start.parent.as_deref(), Some(engine.id.as_str()));
        assert_eq!(engine.children.len(), 2);
        assert!(engine.children.contains(&start.id));
    }

    #[tokio::test]
    async fn import_edges_stay_file_to_specifier() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write(dir.path(), "b.ts", "import { A } from \"./a\";\n");

        let extractor = Extractor::new(4, 10);
        let result = extractor.extract_batch(&[path.clone()], None).await;

        assert_eq!(result.dependencies.len(), 1);
        let edge = &result.dependencies[0];
        assert_eq!(edge.kind, EdgeKind::Imports);
        assert_eq!(edge.from, path);
        assert_eq!(edge.to, "./a");
    }

    #[tokio::test]
    async fn symbolic_edges_rewrite_local_names_to_ids() {
        let dir = tempfile::TempDir::new().unwrap();
        // Python walker emits an extends edge by name.
        let path = write(
            dir.path(),
            "m.py",
            "class Base:\n    pass\n\nclass Child(Base):\n    pass\n",
        );

        let extractor = Extractor::new(4, 10);
        let result = extractor.extract_batch(&[path.clone()], None).await;

        let extends: Vec<&Edge> = result
            .dependencies
            .iter()
            .filter(|e| e.kind == EdgeKind::Extends)
            .collect();
        assert_eq!(extends.len(), 1);
        assert_eq!(extends[0].from, format!("{}:Child:3", path));
        assert_eq!(extends[0].to, format!("{}:Base:0", path));
    }

    #[tokio::test]
    async fn unknown_extensions_yield_no_result() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write(dir.path(), "notes.txt", "just text");

        let extractor = Extractor::new(4, 10);
        let result = extractor.extract_batch(&[path], None).await;

        assert!(result.symbols.is_empty());
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_an_error_record_not_a_crash() {
        let extractor = Extractor::new(4, 10);
        let result = extractor
            .extract_batch(&["/nonexistent/gone.ts".to_string()], None)
            .await;

        assert!(result.symbols.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "/nonexistent/gone.ts");
    }

    #[tokio::test]
    async fn progress_fires_once_per_batch_in_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let files: Vec<String> = (0..5)
            .map(|i| write(dir.path(), &format!("f{}.ts", i), "export class X {}\n"))
            .collect();

        let calls = AtomicUsize::new(0);
        let extractor = Extractor::new(2, 2);
        let result = extractor
            .extract_batch(
                &files,
                Some(&|p: &ExtractProgress| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    assert!(p.files_processed <= p.total_files);
                    assert_eq!(p.total_files, 5);
                }),
            )
            .await;

        // 5 files in batches of 2 → 3 batches.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Same class name in every file, distinct IDs per file.
        assert_eq!(result.symbols.len(), 5);
    }

    #[tokio::test]
    async fn duplicate_edges_are_deduplicated() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "a.ts",
            "import { A } from \"./a\";\nimport { B } from \"./a\";\n",
        );

        let extractor = Extractor::new(4, 10);
        let result = extractor.extract_batch(&[path], None).await;

        // Two import statements with the same (from, to, kind) collapse.
        assert_eq!(result.dependencies.len(), 1);
    }

    #[tokio::test]
    async fn parsing_same_source_twice_is_identical() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "a.py",
            "class A:\n    def run(self):\n        pass\n",
        );

        let extractor = Extractor::new(4, 10);
        let first = extractor.extract_batch(&[path.clone()], None).await;
        let second = extractor.extract_batch(&[path], None).await;

        assert_eq!(first.symbols, second.symbols);
        assert_eq!(first.dependencies, second.dependencies);
    }

    #[test]
    fn mixed_kind_symbols_keep_kinds() {
        let facts = ingest::parse_source(
            Language::TypeScript,
            "/p/x.ts",
            b"export const LIMIT = 1;\nexport function go() {}\n",
        );
        let (symbols, _) = normalise_file("/p/x.ts", Language::TypeScript, facts);
        let limit = symbols.iter().find(|s| s.name == "LIMIT").unwrap();
        assert_eq!(limit.kind, SymbolKind::Constant);
        let go = symbols.iter().find(|s| s.name == "go").unwrap();
        assert_eq!(go.kind, SymbolKind::Function);
    }
}
