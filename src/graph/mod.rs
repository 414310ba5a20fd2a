//! Graph analytics over the persistent store.
//!
//! All operations read from the store on demand; nothing caches adjacency
//! between calls. Edges whose endpoints are not stored symbols (unresolved
//! file→specifier imports, dropped names) are ignored by every algorithm.
//!
//! - [`pagerank`]: weighted PageRank persisted back into the store
//! - [`paths`]: BFS shortest paths and Dijkstra critical paths
//! - [`structure`]: connected components, cycles, bottlenecks, dead code
//! - [`similarity`]: kind/language/name/file-weighted similar symbols
//! - [`impact`]: reverse-reachability impact analysis with risk scoring

pub mod impact;
pub mod pagerank;
pub mod paths;
pub mod similarity;
pub mod structure;

use ahash::AHashMap;
use anyhow::Result;

use crate::ingest::EdgeKind;
use crate::model::Symbol;
use crate::store::GraphStore;

/// Analytics handle borrowing the store.
pub struct GraphAnalytics<'a> {
    store: &'a GraphStore,
}

impl<'a> GraphAnalytics<'a> {
    pub fn new(store: &'a GraphStore) -> Self {
        Self { store }
    }

    pub(crate) fn store(&self) -> &GraphStore {
        self.store
    }

    /// Materialise the symbol-level graph for one algorithm run.
    pub(crate) async fn load_view(&self) -> Result<GraphView> {
        let mut symbols = AHashMap::new();
        for id in self.store.all_symbol_ids().await? {
            if let Some(symbol) = self.store.get_symbol(&id).await? {
                symbols.insert(id, symbol);
            }
        }

        let mut out: AHashMap<String, Vec<(String, EdgeKind)>> = AHashMap::new();
        let mut incoming: AHashMap<String, Vec<(String, EdgeKind)>> = AHashMap::new();
        for edge in self.store.all_edges().await? {
            // Symbol-level view only.
            if !symbols.contains_key(&edge.from) || !symbols.contains_key(&edge.to) {
                continue;
            }
            out.entry(edge.from.clone())
                .or_default()
                .push((edge.to.clone(), edge.kind));
            incoming
                .entry(edge.to)
                .or_default()
                .push((edge.from, edge.kind));
        }
        for neighbours in out.values_mut().chain(incoming.values_mut()) {
            neighbours.sort_by(|a, b| (a.1.priority(), &a.0).cmp(&(b.1.priority(), &b.0)));
        }

        Ok(GraphView {
            symbols,
            out,
            incoming,
        })
    }
}

/// One-shot adjacency snapshot used within a single algorithm call.
pub(crate) struct GraphView {
    pub symbols: AHashMap<String, Symbol>,
    pub out: AHashMap<String, Vec<(String, EdgeKind)>>,
    pub incoming: AHashMap<String, Vec<(String, EdgeKind)>>,
}

impl GraphView {
    pub fn out_degree(&self, id: &str) -> usize {
        self.out.get(id).map(Vec::len).unwrap_or(0)
    }

    pub fn in_degree(&self, id: &str) -> usize {
        self.incoming.get(id).map(Vec::len).unwrap_or(0)
    }
}

/// Conventional program entry files score higher and are never dead code.
pub(crate) fn is_entry_point(path: &str) -> bool {
    let basename = path.rsplit('/').next().unwrap_or(path);
    matches!(
        basename,
        "index.ts" | "index.js" | "index.py" | "main.ts" | "main.js" | "main.py"
    ) || path.contains("/bin/")
        || path.contains("/src/main/")
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::ingest::SymbolKind;
    use crate::model::Span;
    use crate::store::{GraphStore, MemoryBackend};

    use super::*;

    pub fn symbol(id: &str, name: &str, file: &str, exported: bool) -> Symbol {
        Symbol {
            id: id.to_string(),
            name: name.to_string(),
            kind: SymbolKind::Class,
            filepath: file.to_string(),
            location: Span::new(1, 0, 1, 10),
            signature: None,
            docstring: None,
            parent: None,
            children: Vec::new(),
            exported,
            language: "typescript".to_string(),
            git: None,
            page_rank: None,
        }
    }

    pub async fn store_with_symbols(symbols: &[Symbol]) -> GraphStore {
        let store = GraphStore::new(Arc::new(MemoryBackend::new()), "sextant");
        store.set_project_context("/p").await;
        store.add_symbols(symbols).await.unwrap();
        store
    }

    #[tokio::test]
    async fn view_ignores_edges_with_missing_endpoints() {
        let store = store_with_symbols(&[
            symbol("a", "A", "/p/a.ts", true),
            symbol("b", "B", "/p/b.ts", true),
        ])
        .await;
        store
            .add_edge(&crate::model::Edge::new("a", "b", EdgeKind::Calls))
            .await
            .unwrap();
        // Unresolved import: one endpoint is a filepath, not a symbol.
        store
            .add_edge(&crate::model::Edge::new("/p/a.ts", "react", EdgeKind::Imports))
            .await
            .unwrap();

        let analytics = GraphAnalytics::new(&store);
        let view = analytics.load_view().await.unwrap();
        assert_eq!(view.symbols.len(), 2);
        assert_eq!(view.out_degree("a"), 1);
        assert_eq!(view.in_degree("b"), 1);
        assert_eq!(view.out_degree("/p/a.ts"), 0);
    }

    #[test]
    fn entry_point_patterns() {
        assert!(is_entry_point("/p/src/index.ts"));
        assert!(is_entry_point("/p/main.py"));
        assert!(is_entry_point("/p/bin/tool.rs"));
        assert!(is_entry_point("/p/src/main/java/App.java"));
        assert!(!is_entry_point("/p/src/util.ts"));
    }
}
