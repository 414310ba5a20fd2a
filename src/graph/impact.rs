//! Impact analysis: what is affected when a set of symbols changes.
//!
//! Reverse breadth-first search over incoming edges gathers the affected
//! set and one impact path per (seed, node) pair. Each affected symbol gets
//! a risk score from its rank, visibility, entry-point locality, dependent
//! count, and path count, bucketed into severity levels. The suggested fix
//! order is a Kahn topological sort over the edges internal to the affected
//! set, dependencies first.

use anyhow::Result;
use std::collections::{HashMap, HashSet, VecDeque};

use super::{is_entry_point, GraphAnalytics, GraphView};

// Risk-score weights and bucket thresholds.
const RANK_WEIGHT: f64 = 100.0;
const HIGH_RANK_CUTOFF: f64 = 0.01;
const HIGH_RANK_BONUS: f64 = 200.0;
const ENTRY_POINT_BONUS: f64 = 50.0;
const EXPORTED_BONUS: f64 = 30.0;
const DEPENDENT_WEIGHT: f64 = 5.0;
const DEPENDENT_CUTOFF: usize = 5;
const PATH_WEIGHT: f64 = 2.0;
const PATH_CUTOFF: usize = 10;
const CRITICAL_THRESHOLD: f64 = 100.0;
const HIGH_THRESHOLD: f64 = 50.0;
const MEDIUM_THRESHOLD: f64 = 20.0;

/// Impact paths longer than this count as critical chains.
const CRITICAL_PATH_LENGTH: usize = 3;

/// Severity bucket for one affected symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl RiskLevel {
    fn from_score(score: f64) -> RiskLevel {
        if score > CRITICAL_THRESHOLD {
            RiskLevel::Critical
        } else if score > HIGH_THRESHOLD {
            RiskLevel::High
        } else if score > MEDIUM_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "critical",
            RiskLevel::High => "high",
            RiskLevel::Medium => "medium",
            RiskLevel::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RiskEntry {
    pub id: String,
    pub score: f64,
    pub level: RiskLevel,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ImpactSummary {
    pub total_affected: usize,
    /// Longest impact chains (length > 3), one per terminal node.
    pub critical_paths: Vec<Vec<String>>,
    /// Affected files with how many affected symbols each contains,
    /// most-affected first.
    pub affected_files: Vec<(String, usize)>,
    pub risk_distribution: HashMap<String, usize>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ImpactReport {
    pub directly_affected: Vec<String>,
    pub transitively_affected: Vec<String>,
    /// Safe change order: dependencies before their dependents.
    pub suggested_order: Vec<String>,
    /// Critical and high entries, highest score first.
    pub high_risk: Vec<RiskEntry>,
    pub impact_summary: ImpactSummary,
}

impl GraphAnalytics<'_> {
    /// Analyse the blast radius of editing `seeds`.
    pub async fn analyze_impact(&self, seeds: &[String]) -> Result<ImpactReport> {
        let view = self.load_view().await?;

        let seed_set: HashSet<&str> = seeds
            .iter()
            .map(String::as_str)
            .filter(|id| view.symbols.contains_key(*id))
            .collect();
        if seed_set.is_empty() {
            return Ok(ImpactReport::default());
        }

        // Reverse BFS from every seed, collecting one path per (seed, node).
        let mut directly: HashSet<String> = HashSet::new();
        let mut affected: HashSet<String> = HashSet::new();
        let mut paths_to: HashMap<String, Vec<Vec<String>>> = HashMap::new();

        for seed in &seed_set {
            let mut visited: HashSet<&str> = HashSet::new();
            visited.insert(seed);
            let mut queue: VecDeque<(String, Vec<String>)> = VecDeque::new();
            queue.push_back((seed.to_string(), vec![seed.to_string()]));

            while let Some((current, path)) = queue.pop_front() {
                if let Some(dependents) = view.incoming.get(&current) {
                    for (dependent, _) in dependents {
                        if seed_set.contains(dependent.as_str())
                            || !visited.insert(dependent.as_str())
                        {
                            continue;
                        }
                        let mut next_path = path.clone();
                        next_path.push(dependent.clone());
                        if path.len() == 1 {
                            directly.insert(dependent.clone());
                        }
                        affected.insert(dependent.clone());
                        paths_to
                            .entry(dependent.clone())
                            .or_default()
                            .push(next_path.clone());
                        queue.push_back((dependent.clone(), next_path));
                    }
                }
            }
        }

        // Risk scoring.
        let mut risks: Vec<RiskEntry> = Vec::with_capacity(affected.len());
        let mut distribution: HashMap<String, usize> = HashMap::new();
        for id in &affected {
            let symbol = view.symbols.get(id).expect("affected symbols exist in view");
            let rank = symbol.page_rank.unwrap_or(0.0);
            let dependent_count = view.in_degree(id);
            let path_count = paths_to.get(id).map(Vec::len).unwrap_or(0);

            let mut score = rank * RANK_WEIGHT;
            if rank > HIGH_RANK_CUTOFF {
                score += rank * HIGH_RANK_BONUS;
            }
            if is_entry_point(&symbol.filepath) {
                score += ENTRY_POINT_BONUS;
            }
            if symbol.exported {
                score += EXPORTED_BONUS;
            }
            if dependent_count > DEPENDENT_CUTOFF {
                score += DEPENDENT_WEIGHT * dependent_count as f64;
            }
            if path_count > PATH_CUTOFF {
                score += PATH_WEIGHT * path_count as f64;
            }

            let level = RiskLevel::from_score(score);
            *distribution.entry(level.as_str().to_string()).or_insert(0) += 1;
            risks.push(RiskEntry {
                id: id.clone(),
                score,
                level,
            });
        }

        let mut high_risk: Vec<RiskEntry> = risks
            .iter()
            .filter(|r| matches!(r.level, RiskLevel::Critical | RiskLevel::High))
            .cloned()
            .collect();
        high_risk.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        // Suggested order: Kahn over the union of seeds and affected,
        // emitting dependencies before dependents.
        let scope: HashSet<String> = affected
            .iter()
            .cloned()
            .chain(seed_set.iter().map(|s| s.to_string()))
            .collect();
        let suggested_order = kahn_dependencies_first(&view, &scope);

        // Files grouped by affected-symbol count.
        let mut file_counts: HashMap<String, usize> = HashMap::new();
        for id in &affected {
            if let Some(symbol) = view.symbols.get(id) {
                *file_counts.entry(symbol.filepath.clone()).or_insert(0) += 1;
            }
        }
        let mut affected_files: Vec<(String, usize)> = file_counts.into_iter().collect();
        affected_files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        // Longest chain per terminal node, above the length floor.
        let mut critical_paths: Vec<Vec<String>> = paths_to
            .values()
            .filter_map(|paths| paths.iter().max_by_key(|p| p.len()))
            .filter(|p| p.len() > CRITICAL_PATH_LENGTH)
            .cloned()
            .collect();
        critical_paths.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let mut directly_affected: Vec<String> = directly.into_iter().collect();
        directly_affected.sort();
        let mut transitively_affected: Vec<String> = affected
            .iter()
            .filter(|id| !directly_affected.contains(id))
            .cloned()
            .collect();
        transitively_affected.sort();

        Ok(ImpactReport {
            directly_affected,
            transitively_affected,
            suggested_order,
            high_risk,
            impact_summary: ImpactSummary {
                total_affected: affected.len(),
                critical_paths,
                affected_files,
                risk_distribution: distribution,
            },
        })
    }
}

/// Kahn topological sort over edges internal to `scope`, ordered so that a
/// symbol's dependencies appear before the symbol itself. Cycles fall back
/// to lexicographic order for the remainder.
fn kahn_dependencies_first(view: &GraphView, scope: &HashSet<String>) -> Vec<String> {
    // out_in_scope[u] = deps of u within scope; indegree counts dependents.
    let mut pending_deps: HashMap<&str, usize> = HashMap::new();
    let mut dependents_of: HashMap<&str, Vec<&str>> = HashMap::new();

    for id in scope {
        pending_deps.entry(id.as_str()).or_insert(0);
    }
    for from in scope {
        if let Some(neighbours) = view.out.get(from.as_str()) {
            for (to, _) in neighbours {
                if !scope.contains(to) || to == from {
                    continue;
                }
                *pending_deps.entry(from.as_str()).or_insert(0) += 1;
                dependents_of.entry(to.as_str()).or_default().push(from);
            }
        }
    }

    let mut ready: Vec<&str> = pending_deps
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();
    ready.sort_unstable();

    let mut order: Vec<String> = Vec::with_capacity(scope.len());
    let mut emitted: HashSet<&str> = HashSet::new();
    while let Some(next) = ready.first().copied() {
        ready.remove(0);
        if !emitted.insert(next) {
            continue;
        }
        order.push(next.to_string());
        if let Some(dependents) = dependents_of.get(next) {
            for dependent in dependents.clone() {
                let count = pending_deps
                    .get_mut(dependent)
                    .expect("scope nodes initialised");
                *count = count.saturating_sub(1);
                if *count == 0 {
                    ready.push(dependent);
                    ready.sort_unstable();
                }
            }
        }
    }

    // Cycle remainder, deterministic.
    let mut rest: Vec<&str> = scope
        .iter()
        .map(String::as_str)
        .filter(|id| !emitted.contains(*id))
        .collect();
    rest.sort_unstable();
    order.extend(rest.into_iter().map(|s| s.to_string()));
    order
}
