//! Structural analyses: connected components, cycles, bottlenecks, dead
//! code.
//!
//! Cycle detection colours nodes with an explicit stack so pathological
//! chains cannot overflow the call stack. Components treat the graph as
//! undirected.

use anyhow::Result;
use std::collections::{HashMap, HashSet};

use crate::model::Symbol;

use super::{is_entry_point, GraphAnalytics, GraphView};

/// Symbols below this rank with no dependents are dead-code candidates.
const DEAD_CODE_RANK_THRESHOLD: f64 = 1e-4;

/// Bottleneck score cut-off: `sqrt(in · out)` must exceed this.
const BOTTLENECK_THRESHOLD: f64 = 4.0;

/// A symbol bridging much of the graph.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Bottleneck {
    pub id: String,
    pub score: f64,
    pub in_degree: usize,
    pub out_degree: usize,
}

impl GraphAnalytics<'_> {
    /// Groups of symbols connected by edges in either direction, largest
    /// first.
    pub async fn connected_components(&self) -> Result<Vec<Vec<String>>> {
        let view = self.load_view().await?;

        let mut undirected: HashMap<&str, Vec<&str>> = HashMap::new();
        for (from, neighbours) in &view.out {
            for (to, _) in neighbours {
                undirected.entry(from).or_default().push(to);
                undirected.entry(to).or_default().push(from);
            }
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut components = Vec::new();
        let mut ids: Vec<&str> = view.symbols.keys().map(String::as_str).collect();
        ids.sort_unstable();

        for start in ids {
            if visited.contains(start) {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![start];
            visited.insert(start);
            while let Some(current) = stack.pop() {
                component.push(current.to_string());
                if let Some(neighbours) = undirected.get(current) {
                    for next in neighbours {
                        if visited.insert(next) {
                            stack.push(next);
                        }
                    }
                }
            }
            component.sort();
            components.push(component);
        }

        components.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Ok(components)
    }

    /// Dependency cycles, each returned as the node sequence closing the
    /// back edge.
    pub async fn find_cycles(&self) -> Result<Vec<Vec<String>>> {
        let view = self.load_view().await?;
        Ok(find_cycles_in(&view))
    }

    /// Symbols with both heavy fan-in and fan-out, sorted by score
    /// descending.
    pub async fn find_bottlenecks(&self) -> Result<Vec<Bottleneck>> {
        let view = self.load_view().await?;
        let mut bottlenecks: Vec<Bottleneck> = view
            .symbols
            .keys()
            .filter_map(|id| {
                let in_degree = view.in_degree(id);
                let out_degree = view.out_degree(id);
                let score = ((in_degree * out_degree) as f64).sqrt();
                (score > BOTTLENECK_THRESHOLD).then(|| Bottleneck {
                    id: id.clone(),
                    score,
                    in_degree,
                    out_degree,
                })
            })
            .collect();
        bottlenecks.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(bottlenecks)
    }

    /// Non-entry-point, non-exported symbols with negligible rank and no
    /// dependents.
    pub async fn find_dead_code(&self) -> Result<Vec<Symbol>> {
        let view = self.load_view().await?;
        let mut dead: Vec<Symbol> = view
            .symbols
            .values()
            .filter(|symbol| {
                !symbol.exported
                    && !is_entry_point(&symbol.filepath)
                    && symbol.page_rank.unwrap_or(0.0) < DEAD_CODE_RANK_THRESHOLD
                    && view.in_degree(&symbol.id) == 0
            })
            .cloned()
            .collect();
        dead.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(dead)
    }
}

/// Iterative DFS with recursion-stack colouring.
fn find_cycles_in(view: &GraphView) -> Vec<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Colour {
        White,
        Grey,
        Black,
    }

    let mut colour: HashMap<&str, Colour> = view
        .symbols
        .keys()
        .map(|id| (id.as_str(), Colour::White))
        .collect();
    let mut cycles = Vec::new();

    let mut roots: Vec<&str> = view.symbols.keys().map(String::as_str).collect();
    roots.sort_unstable();

    for root in roots {
        if colour.get(root) != Some(&Colour::White) {
            continue;
        }
        // (node, next child index) frames instead of recursion.
        let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
        let mut path: Vec<&str> = vec![root];
        colour.insert(root, Colour::Grey);

        while !stack.is_empty() {
            let (node, child_index) = {
                let frame = stack.last_mut().expect("stack checked non-empty");
                let snapshot = (frame.0, frame.1);
                frame.1 += 1;
                snapshot
            };
            let neighbours = view.out.get(node).map(Vec::as_slice).unwrap_or(&[]);
            if child_index >= neighbours.len() {
                colour.insert(node, Colour::Black);
                path.pop();
                stack.pop();
                continue;
            }
            let next = neighbours[child_index].0.as_str();
            match colour.get(next).copied().unwrap_or(Colour::Black) {
                Colour::White => {
                    colour.insert(next, Colour::Grey);
                    path.push(next);
                    stack.push((next, 0));
                }
                Colour::Grey => {
                    // Back edge: the cycle is the path suffix from `next`.
                    if let Some(start) = path.iter().position(|n| *n == next) {
                        let mut cycle: Vec<String> =
                            path[start..].iter().map(|s| s.to_string()).collect();
                        cycle.push(next.to_string());
                        cycles.push(cycle);
                    }
                }
                Colour::Black => {}
            }
        }
    }

    cycles.sort();
    cycles.dedup();
    cycles
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{store_with_symbols, symbol};
    use super::super::GraphAnalytics;
    use super::*;
    use crate::ingest::EdgeKind;
    use crate::model::Edge;
    use std::collections::HashMap as StdHashMap;

    #[tokio::test]
    async fn components_group_connected_symbols() {
        let store = store_with_symbols(&[
            symbol("a", "A", "/p/a.ts", true),
            symbol("b", "B", "/p/b.ts", true),
            symbol("lonely", "L", "/p/l.ts", true),
        ])
        .await;
        store
            .add_edge(&Edge::new("a", "b", EdgeKind::Calls))
            .await
            .unwrap();

        let analytics = GraphAnalytics::new(&store);
        let components = analytics.connected_components().await.unwrap();

        assert_eq!(components.len(), 2);
        assert_eq!(components[0], vec!["a".to_string(), "b".to_string()]);
        assert_eq!(components[1], vec!["lonely".to_string()]);
    }

    #[tokio::test]
    async fn two_node_cycle_is_found() {
        let store = store_with_symbols(&[
            symbol("f", "f", "/p/m.ts", false),
            symbol("g", "g", "/p/m.ts", false),
        ])
        .await;
        store
            .add_edge(&Edge::new("f", "g", EdgeKind::Calls))
            .await
            .unwrap();
        store
            .add_edge(&Edge::new("g", "f", EdgeKind::Calls))
            .await
            .unwrap();

        let analytics = GraphAnalytics::new(&store);
        let cycles = analytics.find_cycles().await.unwrap();

        assert_eq!(cycles.len(), 1);
        let cycle = &cycles[0];
        assert!(cycle.contains(&"f".to_string()));
        assert!(cycle.contains(&"g".to_string()));
        // The sequence closes on its starting node.
        assert_eq!(cycle.first(), cycle.last());
    }

    #[tokio::test]
    async fn acyclic_graph_has_no_cycles() {
        let store = store_with_symbols(&[
            symbol("a", "A", "/p/a.ts", true),
            symbol("b", "B", "/p/b.ts", true),
            symbol("c", "C", "/p/c.ts", true),
        ])
        .await;
        store
            .add_edge(&Edge::new("a", "b", EdgeKind::Calls))
            .await
            .unwrap();
        store
            .add_edge(&Edge::new("a", "c", EdgeKind::Calls))
            .await
            .unwrap();
        store
            .add_edge(&Edge::new("b", "c", EdgeKind::Calls))
            .await
            .unwrap();

        let analytics = GraphAnalytics::new(&store);
        assert!(analytics.find_cycles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bottleneck_requires_fan_in_and_fan_out() {
        let mut symbols = vec![symbol("hub", "Hub", "/p/hub.ts", true)];
        for i in 0..5 {
            symbols.push(symbol(&format!("in{}", i), "In", "/p/in.ts", false));
            symbols.push(symbol(&format!("out{}", i), "Out", "/p/out.ts", false));
        }
        let store = store_with_symbols(&symbols).await;
        for i in 0..5 {
            store
                .add_edge(&Edge::new(format!("in{}", i), "hub", EdgeKind::Calls))
                .await
                .unwrap();
            store
                .add_edge(&Edge::new("hub", format!("out{}", i), EdgeKind::Calls))
                .await
                .unwrap();
        }

        let analytics = GraphAnalytics::new(&store);
        let bottlenecks = analytics.find_bottlenecks().await.unwrap();

        // sqrt(5·5) = 5 > 4 for the hub; spokes score 0.
        assert_eq!(bottlenecks.len(), 1);
        assert_eq!(bottlenecks[0].id, "hub");
        assert!((bottlenecks[0].score - 5.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn dead_code_excludes_exported_and_referenced() {
        let store = store_with_symbols(&[
            symbol("used", "Used", "/p/a.ts", false),
            symbol("user", "User", "/p/a.ts", false),
            symbol("dead", "Dead", "/p/a.ts", false),
            symbol("public", "Public", "/p/a.ts", true),
            symbol("entry", "Entry", "/p/index.ts", false),
        ])
        .await;
        store
            .add_edge(&Edge::new("user", "used", EdgeKind::Calls))
            .await
            .unwrap();
        store
            .set_page_ranks(&StdHashMap::from([
                ("used".to_string(), 1e-5),
                ("user".to_string(), 1e-5),
                ("dead".to_string(), 1e-5),
                ("public".to_string(), 1e-5),
                ("entry".to_string(), 1e-5),
            ]))
            .await
            .unwrap();

        let analytics = GraphAnalytics::new(&store);
        let dead = analytics.find_dead_code().await.unwrap();
        let ids: Vec<&str> = dead.iter().map(|s| s.id.as_str()).collect();

        assert!(ids.contains(&"dead"));
        assert!(ids.contains(&"user")); // nothing depends on it either
        assert!(!ids.contains(&"used")); // has a dependent
        assert!(!ids.contains(&"public")); // exported
        assert!(!ids.contains(&"entry")); // entry-point file
    }
}
