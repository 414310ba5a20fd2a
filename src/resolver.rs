//! Dependency resolution.
//!
//! Two duties. Cross-file: turn file→specifier import edges into
//! symbol→symbol edges by resolving the specifier to an indexed file and
//! linking a representative symbol of the importer to the target's exported
//! top-level symbols; unresolved imports are kept as file→specifier edges.
//! Intra-file: derive `extends`/`implements`/`instantiates`/`calls`/`uses`
//! edges by matching local symbol names against signatures with whole-word
//! boundaries. Textual matching is a deliberate, cheap approximation.

use anyhow::Result;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

use crate::ingest::EdgeKind;
use crate::model::{Edge, Symbol};
use crate::store::GraphStore;

/// Source extensions probed when resolving an import specifier.
const RESOLVE_EXTENSIONS: &[&str] = &[
    ".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs", ".py", ".go", ".rs", ".java", ".c", ".h",
    ".cpp", ".cc", ".cxx", ".hpp", ".hxx",
];

/// Direct and transitive neighbours of a symbol.
#[derive(Debug, Default, Clone, PartialEq, serde::Serialize)]
pub struct DependencyReport {
    pub direct: Vec<Edge>,
    pub transitive: Vec<String>,
    pub impact_count: usize,
}

/// Store-backed resolver. Reads symbols the indexer has already persisted.
pub struct Resolver<'a> {
    store: &'a GraphStore,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a GraphStore) -> Self {
        Self { store }
    }

    // -----------------------------------------------------------------------
    // Cross-file import resolution
    // -----------------------------------------------------------------------

    /// Resolve a batch of file→specifier import edges.
    ///
    /// Returns `(resolved, unresolved)`: symbol-level `imports` edges for
    /// every specifier that maps to an indexed file, and the untouched
    /// file→specifier edges for the rest. Never fabricates a symbol ID.
    pub async fn resolve_imports(&self, imports: &[Edge]) -> Result<(Vec<Edge>, Vec<Edge>)> {
        let mut resolved = Vec::new();
        let mut unresolved = Vec::new();

        for edge in imports {
            match self.resolve_one_import(edge).await? {
                Some(mut symbol_edges) => resolved.append(&mut symbol_edges),
                None => unresolved.push(edge.clone()),
            }
        }
        debug!(
            resolved = resolved.len(),
            unresolved = unresolved.len(),
            "import resolution finished"
        );
        Ok((resolved, unresolved))
    }

    async fn resolve_one_import(&self, edge: &Edge) -> Result<Option<Vec<Edge>>> {
        let Some(target_file) = self.resolve_specifier(&edge.from, &edge.to).await? else {
            return Ok(None);
        };

        let Some(representative) = self.representative_symbol(&edge.from).await? else {
            return Ok(None);
        };
        let targets = self.exported_top_level(&target_file).await?;
        if targets.is_empty() {
            return Ok(None);
        }

        Ok(Some(
            targets
                .into_iter()
                .map(|target| Edge {
                    from: representative.clone(),
                    to: target,
                    kind: EdgeKind::Imports,
                    location: edge.location,
                })
                .collect(),
        ))
    }

    /// Map a specifier to an indexed file by probing known extensions and
    /// `index.<ext>` in a target directory.
    async fn resolve_specifier(&self, importer: &str, specifier: &str) -> Result<Option<String>> {
        let base = if specifier.starts_with('.') {
            let dir = parent_dir(importer);
            normalize_path(&format!("{}/{}", dir, specifier))
        } else {
            specifier.to_string()
        };

        let mut candidates = Vec::with_capacity(2 + RESOLVE_EXTENSIONS.len() * 2);
        candidates.push(base.clone());
        for ext in RESOLVE_EXTENSIONS {
            candidates.push(format!("{}{}", base, ext));
        }
        for ext in RESOLVE_EXTENSIONS {
            candidates.push(format!("{}/index{}", base, ext));
        }

        for candidate in candidates {
            if !self.store.symbols_in_file(&candidate).await?.is_empty() {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// First top-level symbol of a file, by source position.
    async fn representative_symbol(&self, file: &str) -> Result<Option<String>> {
        let symbols = self.file_symbols(file).await?;
        Ok(symbols
            .iter()
            .filter(|s| s.parent.is_none())
            .min_by_key(|s| s.location.start.line)
            .map(|s| s.id.clone()))
    }

    async fn exported_top_level(&self, file: &str) -> Result<Vec<String>> {
        let symbols = self.file_symbols(file).await?;
        let mut ids: Vec<String> = symbols
            .iter()
            .filter(|s| s.exported && s.parent.is_none())
            .map(|s| s.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn file_symbols(&self, file: &str) -> Result<Vec<Symbol>> {
        let mut symbols = Vec::new();
        for id in self.store.symbols_in_file(file).await? {
            if let Some(symbol) = self.store.get_symbol(&id).await? {
                symbols.push(symbol);
            }
        }
        Ok(symbols)
    }

    /// Symbols reachable through the file's resolved import edges.
    async fn imported_symbols(&self, file_symbols: &[Symbol]) -> Result<Vec<Symbol>> {
        let mut imported = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for symbol in file_symbols {
            for counterpart in self.store.dependencies_of(&symbol.id).await? {
                if !seen.insert(counterpart.clone()) {
                    continue;
                }
                let Some(edge) = self.store.edge_between(&symbol.id, &counterpart).await? else {
                    continue;
                };
                if edge.kind != EdgeKind::Imports {
                    continue;
                }
                if let Some(target) = self.store.get_symbol(&counterpart).await? {
                    imported.push(target);
                }
            }
        }
        Ok(imported)
    }

    // -----------------------------------------------------------------------
    // Intra-file symbolic edges
    // -----------------------------------------------------------------------

    /// Derive symbolic edges for one file from signature text.
    ///
    /// Candidate names are the file's own symbols plus symbols already
    /// linked into the file through resolved import edges, so
    /// `class B extends A` matches an imported `A`.
    pub async fn resolve_symbolic(&self, file: &str) -> Result<Vec<Edge>> {
        let symbols = self.file_symbols(file).await?;
        let imported = self.imported_symbols(&symbols).await?;

        let mut by_name: HashMap<&str, Vec<&Symbol>> = HashMap::new();
        for symbol in symbols.iter().chain(imported.iter()) {
            by_name.entry(symbol.name.as_str()).or_default().push(symbol);
        }

        let mut edges = Vec::new();
        let mut seen: HashSet<(String, String, EdgeKind)> = HashSet::new();
        for symbol in &symbols {
            let Some(signature) = symbol.signature.as_deref() else {
                continue;
            };
            for (name, targets) in &by_name {
                if *name == symbol.name {
                    continue;
                }
                let Some(kind) = classify_reference(signature, name) else {
                    continue;
                };
                for target in targets {
                    if target.id == symbol.id {
                        continue;
                    }
                    if seen.insert((symbol.id.clone(), target.id.clone(), kind)) {
                        edges.push(Edge {
                            from: symbol.id.clone(),
                            to: target.id.clone(),
                            kind,
                            location: Some(symbol.location),
                        });
                    }
                }
            }
        }
        edges.sort_by(|a, b| {
            (&a.from, &a.to, a.kind.as_str()).cmp(&(&b.from, &b.to, b.kind.as_str()))
        });
        Ok(edges)
    }

    // -----------------------------------------------------------------------
    // Transitive helpers
    // -----------------------------------------------------------------------

    /// DFS closure over outgoing dependency sets.
    pub async fn transitive_dependencies(&self, id: &str) -> Result<Vec<String>> {
        self.transitive_closure(id, Direction::Out).await
    }

    /// DFS closure over incoming dependency sets.
    pub async fn transitive_dependents(&self, id: &str) -> Result<Vec<String>> {
        self.transitive_closure(id, Direction::In).await
    }

    async fn transitive_closure(&self, start: &str, direction: Direction) -> Result<Vec<String>> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut stack = vec![start.to_string()];
        while let Some(current) = stack.pop() {
            let neighbours = match direction {
                Direction::Out => self.store.dependencies_of(&current).await?,
                Direction::In => self.store.dependents_of(&current).await?,
            };
            for next in neighbours {
                if next != start && visited.insert(next.clone()) {
                    stack.push(next);
                }
            }
        }
        let mut result: Vec<String> = visited.into_iter().collect();
        result.sort();
        Ok(result)
    }

    /// Direct edges plus the transitive closure up to `depth`, honouring an
    /// optional set of allowed edge kinds.
    pub async fn get_dependencies(
        &self,
        target: &str,
        depth: usize,
        kinds: Option<&[EdgeKind]>,
    ) -> Result<DependencyReport> {
        self.bounded_traversal(target, depth, kinds, Direction::Out)
            .await
    }

    pub async fn get_dependents(&self, target: &str, depth: usize) -> Result<DependencyReport> {
        self.bounded_traversal(target, depth, None, Direction::In)
            .await
    }

    async fn bounded_traversal(
        &self,
        target: &str,
        depth: usize,
        kinds: Option<&[EdgeKind]>,
        direction: Direction,
    ) -> Result<DependencyReport> {
        let mut report = DependencyReport::default();
        if depth == 0 {
            return Ok(report);
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((target.to_string(), 0));
        visited.insert(target.to_string());

        while let Some((current, level)) = queue.pop_front() {
            if level == depth {
                continue;
            }
            let neighbours = match direction {
                Direction::Out => self.store.dependencies_of(&current).await?,
                Direction::In => self.store.dependents_of(&current).await?,
            };
            for next in neighbours {
                let (edge_from, edge_to) = match direction {
                    Direction::Out => (current.as_str(), next.as_str()),
                    Direction::In => (next.as_str(), current.as_str()),
                };
                let Some(edge) = self.store.edge_between(edge_from, edge_to).await? else {
                    continue; // deleted during traversal: skip, continue
                };
                if let Some(allowed) = kinds {
                    if !allowed.contains(&edge.kind) {
                        continue;
                    }
                }
                if !visited.insert(next.clone()) {
                    continue;
                }
                if level == 0 {
                    report.direct.push(edge);
                } else {
                    report.transitive.push(next.clone());
                }
                queue.push_back((next, level + 1));
            }
        }

        report
            .direct
            .sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));
        report.transitive.sort();
        report.impact_count = report.direct.len() + report.transitive.len();
        Ok(report)
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Out,
    In,
}

// ---------------------------------------------------------------------------
// Textual classification
// ---------------------------------------------------------------------------

/// Classify how `signature` references `name`, if at all.
///
/// Precedence: extends, implements, instantiates (`new Name(`), calls
/// (`Name(`), then a plain whole-word mention as `uses`.
pub(crate) fn classify_reference(signature: &str, name: &str) -> Option<EdgeKind> {
    let first = find_word(signature, name)?;

    if let Some(extends_at) = find_word(signature, "extends") {
        if in_clause(signature, extends_at + "extends".len(), name) {
            return Some(EdgeKind::Extends);
        }
    }
    if let Some(implements_at) = find_word(signature, "implements") {
        if in_clause(signature, implements_at + "implements".len(), name) {
            return Some(EdgeKind::Implements);
        }
    }

    let after = &signature[first + name.len()..];
    let called = after.trim_start().starts_with('(');
    let preceded_by_new = signature[..first]
        .trim_end()
        .rsplit(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .next()
        .map(|w| w == "new")
        .unwrap_or(false);

    if called && preceded_by_new {
        return Some(EdgeKind::Instantiates);
    }
    if called {
        return Some(EdgeKind::Calls);
    }
    if preceded_by_new {
        // `new Name` without parens (e.g. `new Name;`) still instantiates.
        return Some(EdgeKind::Instantiates);
    }
    Some(EdgeKind::Uses)
}

/// Whole-word occurrence of `name` between a clause keyword and the next
/// clause or body opener.
fn in_clause(signature: &str, clause_start: usize, name: &str) -> bool {
    let rest = &signature[clause_start..];
    let end = [rest.find('{'), find_word(rest, "implements")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(rest.len());
    find_word(&rest[..end], name).is_some()
}

/// First whole-word occurrence of `needle` in `haystack`.
fn find_word(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    let mut search_from = 0;
    while let Some(relative) = haystack[search_from..].find(needle) {
        let start = search_from + relative;
        let end = start + needle.len();
        let before_ok = start == 0
            || !haystack[..start]
                .chars()
                .next_back()
                .map(is_word_char)
                .unwrap_or(false);
        let after_ok = end == haystack.len()
            || !haystack[end..].chars().next().map(is_word_char).unwrap_or(false);
        if before_ok && after_ok {
            return Some(start);
        }
        search_from = end;
    }
    None
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}


// ---------------------------------------------------------------------------
// Path text helpers (no filesystem access)
// ---------------------------------------------------------------------------

fn parent_dir(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    }
}

/// Collapse `.` and `..` components textually.
fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    if absolute {
        format!("/{}", parts.join("/"))
    } else {
        parts.join("/")
    }
}

#[cfg(test)]
mod path_tests {
    use super::*;

    #[test]
    fn normalize_collapses_dots() {
        assert_eq!(normalize_path("/p/./a"), "/p/a");
        assert_eq!(normalize_path("/p/sub/../a"), "/p/a");
        assert_eq!(normalize_path("/p/a/b/../../c"), "/p/c");
        assert_eq!(normalize_path("rel/./x"), "rel/x");
    }

    #[test]
    fn parent_dir_strips_last_component() {
        assert_eq!(parent_dir("/p/src/a.ts"), "/p/src");
        assert_eq!(parent_dir("file.ts"), "");
    }
}
