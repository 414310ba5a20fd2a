//! Similar-symbol ranking.
//!
//! Scores every other symbol against a target by kind, language, name
//! similarity (normalised Levenshtein), and file locality, keeping scores
//! above a floor. Each hit carries a human-readable reason string.

use anyhow::Result;

use crate::ingest::SymbolKind;
use crate::model::Symbol;

use super::GraphAnalytics;

/// Minimum composite score to keep a candidate.
const SCORE_FLOOR: f64 = 0.3;

/// Name similarity below this contributes nothing.
const NAME_SIMILARITY_FLOOR: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SimilarSymbol {
    pub symbol: Symbol,
    pub score: f64,
    pub reason: String,
}

impl GraphAnalytics<'_> {
    /// Rank stored symbols by similarity to `target_id`, best first.
    pub async fn find_similar(&self, target_id: &str, limit: usize) -> Result<Vec<SimilarSymbol>> {
        let Some(target) = self.store().get_symbol(target_id).await? else {
            return Ok(Vec::new());
        };
        let view = self.load_view().await?;

        let mut hits: Vec<SimilarSymbol> = view
            .symbols
            .values()
            .filter(|candidate| candidate.id != target.id)
            .filter_map(|candidate| score_pair(&target, candidate))
            .collect();

        sort_and_truncate(&mut hits, limit);
        Ok(hits)
    }

    /// Rank stored symbols against a free-text description.
    pub async fn find_similar_by_description(
        &self,
        description: &str,
        kind: Option<SymbolKind>,
        limit: usize,
    ) -> Result<Vec<SimilarSymbol>> {
        let view = self.load_view().await?;

        let mut hits: Vec<SimilarSymbol> = view
            .symbols
            .values()
            .filter(|candidate| kind.map(|k| candidate.kind == k).unwrap_or(true))
            .filter_map(|candidate| score_description(description, candidate))
            .collect();

        sort_and_truncate(&mut hits, limit);
        Ok(hits)
    }
}

fn sort_and_truncate(hits: &mut Vec<SimilarSymbol>, limit: usize) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.symbol.id.cmp(&b.symbol.id))
    });
    hits.truncate(limit);
}

/// Composite similarity of one candidate against the target symbol.
fn score_pair(target: &Symbol, candidate: &Symbol) -> Option<SimilarSymbol> {
    let mut score = 0.0;
    let mut reasons: Vec<String> = Vec::new();

    if candidate.kind == target.kind {
        score += 0.3;
        reasons.push(format!("same kind ({})", candidate.kind.as_str()));
    }
    if candidate.language == target.language {
        score += 0.2;
        reasons.push(format!("same language ({})", candidate.language));
    }
    let name_sim = name_similarity(&target.name, &candidate.name);
    if name_sim > NAME_SIMILARITY_FLOOR {
        score += name_sim * 0.3;
        reasons.push(format!("similar name ({:.0}%)", name_sim * 100.0));
    }
    if candidate.filepath == target.filepath {
        score += 0.2;
        reasons.push("same file".to_string());
    }

    if score <= SCORE_FLOOR {
        return None;
    }
    Some(SimilarSymbol {
        symbol: candidate.clone(),
        score,
        reason: reasons.join(", "),
    })
}

/// Similarity of a candidate name against a free-text description: the best
/// match between the whole description and any of its words.
fn score_description(description: &str, candidate: &Symbol) -> Option<SimilarSymbol> {
    let whole = name_similarity(description, &candidate.name);
    let by_word = description
        .split_whitespace()
        .map(|word| name_similarity(word, &candidate.name))
        .fold(0.0f64, f64::max);
    let name_sim = whole.max(by_word);

    let mentioned = candidate
        .docstring
        .as_deref()
        .map(|doc| {
            let doc = doc.to_ascii_lowercase();
            description
                .split_whitespace()
                .any(|w| w.len() > 3 && doc.contains(&w.to_ascii_lowercase()))
        })
        .unwrap_or(false);

    let mut score = name_sim * 0.6;
    let mut reasons = Vec::new();
    if name_sim > NAME_SIMILARITY_FLOOR {
        reasons.push(format!("name matches ({:.0}%)", name_sim * 100.0));
    }
    if mentioned {
        score += 0.2;
        reasons.push("mentioned in docs".to_string());
    }

    if score <= SCORE_FLOOR {
        return None;
    }
    Some(SimilarSymbol {
        symbol: candidate.clone(),
        score,
        reason: reasons.join(", "),
    })
}

/// `1 − levenshtein/max_len`, case-insensitive.
fn name_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a = a.to_ascii_lowercase();
    let b = b.to_ascii_lowercase();
    if a == b {
        return 1.0;
    }
    let distance = strsim::levenshtein(&a, &b);
    let max_len = a.chars().count().max(b.chars().count());
    1.0 - distance as f64 / max_len as f64
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{store_with_symbols, symbol};
    use super::super::GraphAnalytics;
    use super::*;

    #[test]
    fn name_similarity_bounds() {
        assert_eq!(name_similarity("Parser", "parser"), 1.0);
        assert!(name_similarity("Parser", "Parsers") > 0.8);
        assert!(name_similarity("Parser", "Renderer") < 0.5);
        assert_eq!(name_similarity("", "x"), 0.0);
    }

    #[tokio::test]
    async fn similar_symbols_rank_by_composite_score() {
        let store = store_with_symbols(&[
            symbol("t", "UserService", "/p/user.ts", true),
            symbol("close", "UserServices", "/p/user.ts", true),
            symbol("far", "Billing", "/p/billing.ts", true),
        ])
        .await;

        let analytics = GraphAnalytics::new(&store);
        let similar = analytics.find_similar("t", 10).await.unwrap();

        // Same kind + language + near-identical name + same file.
        assert_eq!(similar[0].symbol.id, "close");
        assert!(similar[0].score > 0.9);
        assert!(similar[0].reason.contains("similar name"));

        // `Billing` shares kind and language only: 0.5 composite.
        let far = similar.iter().find(|s| s.symbol.id == "far").unwrap();
        assert!((far.score - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn missing_target_yields_empty() {
        let store = store_with_symbols(&[]).await;
        let analytics = GraphAnalytics::new(&store);
        assert!(analytics.find_similar("ghost", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn description_search_matches_names() {
        let store = store_with_symbols(&[
            symbol("a", "ConfigLoader", "/p/config.ts", true),
            symbol("b", "Renderer", "/p/render.ts", true),
        ])
        .await;

        let analytics = GraphAnalytics::new(&store);
        let hits = analytics
            .find_similar_by_description("configloader", None, 5)
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].symbol.id, "a");
    }

    #[tokio::test]
    async fn description_search_honours_kind_filter() {
        let store = store_with_symbols(&[symbol("a", "ConfigLoader", "/p/config.ts", true)]).await;
        let analytics = GraphAnalytics::new(&store);
        let hits = analytics
            .find_similar_by_description("configloader", Some(SymbolKind::Function), 5)
            .await
            .unwrap();
        assert!(hits.is_empty()); // stored symbol is a class
    }
}
