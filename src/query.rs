//! Query surface exposed to external collaborators.
//!
//! Thin, read-mostly operations over the store and analytics: symbol
//! lookup and search, file structure, project overview, dependency and
//! impact queries, git history, and similarity. Indexing is delegated to
//! [`crate::indexer::Indexer`]; everything here reads.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::git::GitProvider;
use crate::graph::impact::ImpactReport;
use crate::graph::similarity::SimilarSymbol;
use crate::graph::GraphAnalytics;
use crate::ingest::{EdgeKind, SymbolKind};
use crate::model::{GitMetadata, ProjectMetadata, Symbol};
use crate::resolver::{DependencyReport, Resolver};
use crate::store::GraphStore;

const DEFAULT_LIMIT: usize = 20;

/// Filters for [`QueryService::get_symbol`].
#[derive(Debug, Clone, Default)]
pub struct SymbolFilter {
    pub filepath: Option<String>,
    pub kind: Option<SymbolKind>,
    pub limit: Option<usize>,
}

/// Filters for [`QueryService::search_symbols`].
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub kind: Option<SymbolKind>,
    pub exported_only: bool,
    pub limit: Option<usize>,
}

/// Options for [`QueryService::get_dependents`] and
/// [`QueryService::get_impact`].
#[derive(Debug, Clone)]
pub struct DependentsOptions {
    /// Keep only symbols whose files look churn-prone.
    pub unstable_only: bool,
    /// Stability below this counts as unstable.
    pub stability_threshold: f64,
    pub include_git: bool,
}

impl Default for DependentsOptions {
    fn default() -> Self {
        Self {
            unstable_only: false,
            stability_threshold: 0.5,
            include_git: false,
        }
    }
}

/// One fuzzy-search hit with its immediate neighbourhood.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolMatch {
    pub symbol: Symbol,
    /// IDs this symbol depends on or is depended on by, one hop.
    pub related: Vec<String>,
}

/// Nested symbol tree of one file.
#[derive(Debug, Clone, Serialize)]
pub struct StructureNode {
    pub symbol: Symbol,
    pub children: Vec<StructureNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileStructure {
    pub path: String,
    pub symbols: Vec<StructureNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedSymbol {
    pub symbol: Symbol,
    pub rank: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectOverview {
    pub metadata: Option<ProjectMetadata>,
    pub top_symbols: Vec<RankedSymbol>,
}

/// Read-side service over one store handle.
pub struct QueryService {
    store: Arc<GraphStore>,
    git: GitProvider,
}

impl QueryService {
    pub fn new(store: Arc<GraphStore>, config: &Config) -> Self {
        Self {
            store,
            git: GitProvider::new(config.git.clone()),
        }
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    /// Fuzzy symbol lookup by name.
    ///
    /// Exact name-index hits come first; otherwise every stored symbol is
    /// scored by name similarity. Results are ordered by PageRank within
    /// equal match quality and carry one hop of related IDs.
    pub async fn get_symbol(&self, name: &str, filter: &SymbolFilter) -> Result<Vec<SymbolMatch>> {
        let limit = filter.limit.unwrap_or(DEFAULT_LIMIT);

        let mut candidates: Vec<Symbol> = Vec::new();
        for id in self.store.ids_by_name(name).await? {
            if let Some(symbol) = self.store.get_symbol(&id).await? {
                candidates.push(symbol);
            }
        }
        if candidates.is_empty() {
            // Fuzzy fallback over the whole store.
            for id in self.store.all_symbol_ids().await? {
                let Some(symbol) = self.store.get_symbol(&id).await? else {
                    continue;
                };
                let a = symbol.name.to_ascii_lowercase();
                let b = name.to_ascii_lowercase();
                let close = a.contains(&b)
                    || b.contains(&a)
                    || strsim::levenshtein(&a, &b) <= a.len().max(b.len()) / 3;
                if close {
                    candidates.push(symbol);
                }
            }
        }

        candidates.retain(|s| {
            filter
                .filepath
                .as_deref()
                .map(|f| s.filepath == f)
                .unwrap_or(true)
                && filter.kind.map(|k| s.kind == k).unwrap_or(true)
        });
        sort_by_rank(&mut candidates);
        candidates.truncate(limit);

        let mut matches = Vec::with_capacity(candidates.len());
        for symbol in candidates {
            let mut related = self.store.dependencies_of(&symbol.id).await?;
            related.extend(self.store.dependents_of(&symbol.id).await?);
            related.sort();
            related.dedup();
            matches.push(SymbolMatch { symbol, related });
        }
        Ok(matches)
    }

    /// Wildcard search over symbol names (`*` any run, `?` one character;
    /// a bare pattern matches as a case-insensitive substring).
    pub async fn search_symbols(
        &self,
        pattern: &str,
        filter: &SearchFilter,
    ) -> Result<Vec<Symbol>> {
        let limit = filter.limit.unwrap_or(DEFAULT_LIMIT);
        let mut hits = Vec::new();
        for id in self.store.all_symbol_ids().await? {
            let Some(symbol) = self.store.get_symbol(&id).await? else {
                continue;
            };
            if !wildcard_match(pattern, &symbol.name) {
                continue;
            }
            if filter.exported_only && !symbol.exported {
                continue;
            }
            if let Some(kind) = filter.kind {
                if symbol.kind != kind {
                    continue;
                }
            }
            hits.push(symbol);
        }
        sort_by_rank(&mut hits);
        hits.truncate(limit);
        Ok(hits)
    }

    /// Nested symbol tree of one file, honouring parent/child links.
    pub async fn get_file_structure(
        &self,
        path: &str,
        include_private: bool,
    ) -> Result<FileStructure> {
        let mut symbols: Vec<Symbol> = Vec::new();
        for id in self.store.symbols_in_file(path).await? {
            if let Some(symbol) = self.store.get_symbol(&id).await? {
                symbols.push(symbol);
            }
        }
        symbols.sort_by_key(|s| (s.location.start.line, s.location.start.column));

        let roots: Vec<Symbol> = symbols
            .iter()
            .filter(|s| s.parent.is_none())
            .filter(|s| include_private || s.exported)
            .cloned()
            .collect();
        let by_id: HashMap<&str, &Symbol> =
            symbols.iter().map(|s| (s.id.as_str(), s)).collect();

        fn build(symbol: &Symbol, by_id: &HashMap<&str, &Symbol>) -> StructureNode {
            let children = symbol
                .children
                .iter()
                .filter_map(|child_id| by_id.get(child_id.as_str()))
                .map(|child| build(child, by_id))
                .collect();
            StructureNode {
                symbol: symbol.clone(),
                children,
            }
        }

        Ok(FileStructure {
            path: path.to_string(),
            symbols: roots.iter().map(|root| build(root, &by_id)).collect(),
        })
    }

    /// Project metadata plus the top-ranked symbols.
    pub async fn get_project_overview(
        &self,
        top_n: usize,
        include_git: bool,
    ) -> Result<ProjectOverview> {
        let metadata = self.store.project_metadata().await?;
        let mut top_symbols = Vec::new();
        for (id, rank) in self.store.top_ranked(top_n).await? {
            if let Some(mut symbol) = self.store.get_symbol(&id).await? {
                if !include_git {
                    symbol.git = None;
                }
                top_symbols.push(RankedSymbol { symbol, rank });
            }
        }
        Ok(ProjectOverview {
            metadata,
            top_symbols,
        })
    }

    /// Outgoing dependencies of a symbol or name, up to `depth`.
    pub async fn get_dependencies(
        &self,
        target: &str,
        depth: usize,
        kinds: Option<&[EdgeKind]>,
    ) -> Result<DependencyReport> {
        let Some(id) = self.resolve_target(target).await? else {
            return Ok(DependencyReport::default());
        };
        Resolver::new(&self.store)
            .get_dependencies(&id, depth, kinds)
            .await
    }

    /// Incoming dependents of a symbol or name, up to `depth`, optionally
    /// restricted to symbols in unstable (churn-heavy) files.
    pub async fn get_dependents(
        &self,
        target: &str,
        depth: usize,
        options: &DependentsOptions,
    ) -> Result<DependencyReport> {
        let Some(id) = self.resolve_target(target).await? else {
            return Ok(DependencyReport::default());
        };
        let mut report = Resolver::new(&self.store).get_dependents(&id, depth).await?;

        if options.unstable_only {
            let mut keep = Vec::new();
            for edge in report.direct {
                if self
                    .stability_of(&edge.from, options.include_git)
                    .await?
                    .map(|s| s < options.stability_threshold)
                    .unwrap_or(false)
                {
                    keep.push(edge);
                }
            }
            report.direct = keep;

            let mut transitive = Vec::new();
            for id in report.transitive {
                if self
                    .stability_of(&id, options.include_git)
                    .await?
                    .map(|s| s < options.stability_threshold)
                    .unwrap_or(false)
                {
                    transitive.push(id);
                }
            }
            report.transitive = transitive;
            report.impact_count = report.direct.len() + report.transitive.len();
        }
        Ok(report)
    }

    /// Blast radius of editing `files`: the edited set is every symbol in
    /// them.
    pub async fn get_impact(
        &self,
        files: &[String],
        options: &DependentsOptions,
    ) -> Result<ImpactReport> {
        let mut seeds = Vec::new();
        for file in files {
            seeds.extend(self.store.symbols_in_file(file).await?);
        }
        let analytics = GraphAnalytics::new(&self.store);
        let mut report = analytics.analyze_impact(&seeds).await?;

        if options.unstable_only {
            let mut high_risk = Vec::new();
            for entry in report.high_risk {
                if self
                    .stability_of(&entry.id, options.include_git)
                    .await?
                    .map(|s| s < options.stability_threshold)
                    .unwrap_or(true)
                {
                    high_risk.push(entry);
                }
            }
            report.high_risk = high_risk;
        }
        Ok(report)
    }

    /// Git history metadata for a symbol or file.
    pub async fn get_symbol_history(
        &self,
        target: &str,
        refresh: bool,
    ) -> Result<Option<GitMetadata>> {
        let filepath = if let Some(id) = self.resolve_target(target).await? {
            self.store
                .get_symbol(&id)
                .await?
                .map(|s| s.filepath)
                .unwrap_or_else(|| target.to_string())
        } else {
            target.to_string()
        };

        if refresh {
            self.git.invalidate(&filepath);
        }
        let hash = self
            .store
            .file_tracking(&filepath)
            .await?
            .map(|t| t.hash);
        Ok(self.git.metadata_for(&filepath, hash.as_deref()).await)
    }

    /// Symbols similar to a free-text description.
    pub async fn find_similar(
        &self,
        description: &str,
        kind: Option<SymbolKind>,
        limit: Option<usize>,
    ) -> Result<Vec<SimilarSymbol>> {
        let analytics = GraphAnalytics::new(&self.store);
        analytics
            .find_similar_by_description(description, kind, limit.unwrap_or(DEFAULT_LIMIT))
            .await
    }

    /// Resolve a target that may be a full ID or a bare name.
    async fn resolve_target(&self, target: &str) -> Result<Option<String>> {
        if self.store.get_symbol(target).await?.is_some() {
            return Ok(Some(target.to_string()));
        }
        Ok(self.store.ids_by_name(target).await?.into_iter().next())
    }

    /// Stability of the file containing `id`, from the symbol's attached
    /// metadata or (optionally) a fresh git lookup.
    async fn stability_of(&self, id: &str, allow_lookup: bool) -> Result<Option<f64>> {
        let Some(symbol) = self.store.get_symbol(id).await? else {
            return Ok(None);
        };
        if let Some(git) = &symbol.git {
            return Ok(Some(git.stability_score));
        }
        if allow_lookup {
            return Ok(self
                .git
                .metadata_for(&symbol.filepath, None)
                .await
                .map(|m| m.stability_score));
        }
        Ok(None)
    }
}

fn sort_by_rank(symbols: &mut [Symbol]) {
    symbols.sort_by(|a, b| {
        b.page_rank
            .unwrap_or(0.0)
            .partial_cmp(&a.page_rank.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// `*` matches any run, `?` one character; a pattern without wildcards
/// matches as a case-insensitive substring.
fn wildcard_match(pattern: &str, name: &str) -> bool {
    if !pattern.contains('*') && !pattern.contains('?') {
        return name
            .to_ascii_lowercase()
            .contains(&pattern.to_ascii_lowercase());
    }
    let pattern: Vec<char> = pattern.to_ascii_lowercase().chars().collect();
    let name: Vec<char> = name.to_ascii_lowercase().chars().collect();

    // Iterative glob match with a single backtrack point.
    let (mut p, mut n) = (0usize, 0usize);
    let (mut star, mut star_n) = (None::<usize>, 0usize);
    while n < name.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == name[n]) {
            p += 1;
            n += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            star_n = n;
            p += 1;
        } else if let Some(star_p) = star {
            p = star_p + 1;
            star_n += 1;
            n = star_n;
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}
