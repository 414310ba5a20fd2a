//! Weighted PageRank.
//!
//! Ranks are seeded by structural weight (exported symbols, entry-point
//! files, type-like kinds score higher), iterated with the standard damped
//! update, normalised to sum 1, and persisted into the store's sorted set
//! with a mirror on each symbol hash.

use anyhow::Result;
use std::collections::HashMap;
use tracing::debug;

use crate::config::PagerankConfig;
use crate::ingest::SymbolKind;
use crate::model::Symbol;

use super::{is_entry_point, GraphAnalytics};

impl GraphAnalytics<'_> {
    /// Compute PageRank over every stored symbol and persist the scores.
    ///
    /// Returns the computed map. An empty store yields an empty map and
    /// writes nothing.
    pub async fn compute_pagerank(
        &self,
        config: &PagerankConfig,
    ) -> Result<HashMap<String, f64>> {
        let view = self.load_view().await?;
        let count = view.symbols.len();
        if count == 0 {
            return Ok(HashMap::new());
        }

        let damping = config.damping;
        let base = 1.0 / count as f64;

        let mut ranks: HashMap<String, f64> = view
            .symbols
            .iter()
            .map(|(id, symbol)| (id.clone(), base * seed_multiplier(symbol)))
            .collect();

        for iteration in 0..config.iterations {
            let mut next: HashMap<String, f64> = HashMap::with_capacity(count);
            let mut max_delta: f64 = 0.0;

            for id in view.symbols.keys() {
                let mut inbound_sum = 0.0;
                if let Some(sources) = view.incoming.get(id) {
                    for (source, _) in sources {
                        let out_degree = view.out_degree(source);
                        if out_degree > 0 {
                            inbound_sum += ranks.get(source).copied().unwrap_or(0.0)
                                / out_degree as f64;
                        }
                    }
                }
                let updated = (1.0 - damping) / count as f64 + damping * inbound_sum;
                max_delta = max_delta.max((updated - ranks.get(id).copied().unwrap_or(0.0)).abs());
                next.insert(id.clone(), updated);
            }

            ranks = next;
            if max_delta < config.tolerance {
                debug!(iteration, max_delta, "pagerank converged");
                break;
            }
        }

        // Normalise so the scores sum to 1.
        let total: f64 = ranks.values().sum();
        if total > 0.0 {
            for score in ranks.values_mut() {
                *score /= total;
            }
        }

        self.store().set_page_ranks(&ranks).await?;
        Ok(ranks)
    }

    /// Highest-ranked symbols with their scores.
    pub async fn top_symbols(&self, limit: usize) -> Result<Vec<(Symbol, f64)>> {
        let ranked = self.store().top_ranked(limit).await?;
        let mut out = Vec::with_capacity(ranked.len());
        for (id, score) in ranked {
            if let Some(symbol) = self.store().get_symbol(&id).await? {
                out.push((symbol, score));
            }
        }
        Ok(out)
    }
}

/// Structural seed weight: exported × entry-point-file × kind.
fn seed_multiplier(symbol: &Symbol) -> f64 {
    let mut multiplier = 1.0;
    if symbol.exported {
        multiplier *= 1.5;
    }
    if is_entry_point(&symbol.filepath) {
        multiplier *= 2.0;
    }
    multiplier *= match symbol.kind {
        SymbolKind::Class | SymbolKind::Interface => 1.2,
        SymbolKind::Function | SymbolKind::Method => 1.1,
        _ => 1.0,
    };
    multiplier
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{store_with_symbols, symbol};
    use super::super::GraphAnalytics;
    use super::*;
    use crate::ingest::EdgeKind;
    use crate::model::Edge;

    #[tokio::test]
    async fn empty_store_yields_empty_ranks() {
        let store = store_with_symbols(&[]).await;
        let analytics = GraphAnalytics::new(&store);
        let ranks = analytics
            .compute_pagerank(&PagerankConfig::default())
            .await
            .unwrap();
        assert!(ranks.is_empty());
    }

    #[tokio::test]
    async fn ranks_sum_to_one() {
        let store = store_with_symbols(&[
            symbol("a", "A", "/p/a.ts", true),
            symbol("b", "B", "/p/b.ts", false),
            symbol("c", "C", "/p/c.ts", false),
        ])
        .await;
        store
            .add_edge(&Edge::new("b", "a", EdgeKind::Calls))
            .await
            .unwrap();
        store
            .add_edge(&Edge::new("c", "a", EdgeKind::Calls))
            .await
            .unwrap();

        let analytics = GraphAnalytics::new(&store);
        let ranks = analytics
            .compute_pagerank(&PagerankConfig::default())
            .await
            .unwrap();

        let sum: f64 = ranks.values().sum();
        assert!((sum - 1.0).abs() < 1e-9, "sum was {}", sum);
    }

    #[tokio::test]
    async fn referenced_symbol_outranks_leaf() {
        // `core` referenced by many, `leaf` by none; both exported.
        let mut symbols = vec![symbol("core", "Core", "/p/core.ts", true)];
        symbols.push(symbol("leaf", "Leaf", "/p/leaf.ts", true));
        for i in 0..20 {
            symbols.push(symbol(&format!("user{}", i), "User", "/p/users.ts", false));
        }
        let store = store_with_symbols(&symbols).await;
        for i in 0..20 {
            store
                .add_edge(&Edge::new(format!("user{}", i), "core", EdgeKind::Uses))
                .await
                .unwrap();
        }

        let analytics = GraphAnalytics::new(&store);
        let ranks = analytics
            .compute_pagerank(&PagerankConfig::default())
            .await
            .unwrap();

        assert!(ranks["core"] > ranks["leaf"]);
        let top = analytics.top_symbols(1).await.unwrap();
        assert_eq!(top[0].0.id, "core");
    }

    #[tokio::test]
    async fn scores_are_mirrored_into_symbols() {
        let store = store_with_symbols(&[symbol("a", "A", "/p/a.ts", true)]).await;
        let analytics = GraphAnalytics::new(&store);
        let ranks = analytics
            .compute_pagerank(&PagerankConfig::default())
            .await
            .unwrap();

        let stored = store.get_symbol("a").await.unwrap().unwrap();
        assert_eq!(stored.page_rank, Some(ranks["a"]));
        assert_eq!(store.page_rank_of("a").await.unwrap(), Some(ranks["a"]));
    }

    #[tokio::test]
    async fn recomputation_is_stable_without_changes() {
        let store = store_with_symbols(&[
            symbol("a", "A", "/p/a.ts", true),
            symbol("b", "B", "/p/b.ts", false),
        ])
        .await;
        store
            .add_edge(&Edge::new("b", "a", EdgeKind::Calls))
            .await
            .unwrap();

        let analytics = GraphAnalytics::new(&store);
        let config = PagerankConfig::default();
        let first = analytics.compute_pagerank(&config).await.unwrap();
        let second = analytics.compute_pagerank(&config).await.unwrap();

        for (id, score) in &first {
            assert!((score - second[id]).abs() < 1e-9);
        }
    }

    #[test]
    fn seed_multiplier_composition() {
        let exported_class = symbol("x", "X", "/p/index.ts", true);
        // exported (1.5) × entry point (2.0) × class (1.2)
        assert!((seed_multiplier(&exported_class) - 3.6).abs() < 1e-12);

        let plain = symbol("y", "Y", "/p/util.ts", false);
        assert!((seed_multiplier(&plain) - 1.2).abs() < 1e-12); // class kind only
    }
}
