//! Path search over the dependency graph.
//!
//! BFS for hop-count shortest paths, with neighbours expanded in edge-kind
//! priority order (imports before extends before implements before
//! instantiates, calls, uses), and Dijkstra for the weighted critical path
//! where traversing into a high-PageRank symbol is cheap.

use anyhow::Result;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};

use super::{GraphAnalytics, GraphView};

/// Cost floor so zero-ranked nodes stay finite.
const COST_EPSILON: f64 = 1e-6;

/// A reconstructed chain of symbols. `distance` is the breadth distance
/// (hops) from the start.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct GraphPath {
    pub nodes: Vec<String>,
    pub distance: usize,
}

impl GraphAnalytics<'_> {
    /// Breadth-first shortest path from `from` to `to`, or `None` when
    /// unreachable.
    pub async fn find_path(&self, from: &str, to: &str) -> Result<Option<GraphPath>> {
        let view = self.load_view().await?;
        Ok(bfs_path(&view, from, to))
    }

    /// Shortest path to every node reachable from `from`.
    pub async fn find_shortest_paths(&self, from: &str) -> Result<HashMap<String, GraphPath>> {
        let view = self.load_view().await?;
        let mut paths = HashMap::new();
        let mut parents: HashMap<String, String> = HashMap::new();
        let mut queue = VecDeque::new();
        queue.push_back((from.to_string(), 0usize));

        while let Some((current, distance)) = queue.pop_front() {
            if let Some(neighbours) = view.out.get(&current) {
                for (next, _) in neighbours {
                    if next == from || parents.contains_key(next) {
                        continue;
                    }
                    parents.insert(next.clone(), current.clone());
                    paths.insert(
                        next.clone(),
                        GraphPath {
                            nodes: reconstruct(&parents, from, next),
                            distance: distance + 1,
                        },
                    );
                    queue.push_back((next.clone(), distance + 1));
                }
            }
        }
        Ok(paths)
    }

    /// Dijkstra path where each step into `v` costs `1/(1000·PR(v)+ε)`,
    /// preferring chains through structurally important symbols.
    pub async fn find_critical_path(&self, from: &str, to: &str) -> Result<Option<GraphPath>> {
        let view = self.load_view().await?;

        let mut best: HashMap<String, f64> = HashMap::new();
        let mut parents: HashMap<String, String> = HashMap::new();
        let mut heap = BinaryHeap::new();
        best.insert(from.to_string(), 0.0);
        heap.push(HeapEntry {
            cost: 0.0,
            id: from.to_string(),
        });

        while let Some(HeapEntry { cost, id }) = heap.pop() {
            if id == to {
                let nodes = reconstruct(&parents, from, to);
                return Ok(Some(GraphPath {
                    distance: nodes.len().saturating_sub(1),
                    nodes,
                }));
            }
            if cost > best.get(&id).copied().unwrap_or(f64::INFINITY) {
                continue;
            }
            if let Some(neighbours) = view.out.get(&id) {
                for (next, _) in neighbours {
                    let rank = view
                        .symbols
                        .get(next)
                        .and_then(|s| s.page_rank)
                        .unwrap_or(0.0);
                    let step = 1.0 / (1000.0 * rank + COST_EPSILON);
                    let candidate = cost + step;
                    if candidate < best.get(next).copied().unwrap_or(f64::INFINITY) {
                        best.insert(next.clone(), candidate);
                        parents.insert(next.clone(), id.clone());
                        heap.push(HeapEntry {
                            cost: candidate,
                            id: next.clone(),
                        });
                    }
                }
            }
        }
        Ok(None)
    }
}

fn bfs_path(view: &GraphView, from: &str, to: &str) -> Option<GraphPath> {
    if from == to {
        return Some(GraphPath {
            nodes: vec![from.to_string()],
            distance: 0,
        });
    }
    let mut parents: HashMap<String, String> = HashMap::new();
    let mut queue = VecDeque::new();
    queue.push_back(from.to_string());

    while let Some(current) = queue.pop_front() {
        // Neighbours are pre-sorted by edge-kind priority in the view.
        if let Some(neighbours) = view.out.get(&current) {
            for (next, _) in neighbours {
                if next == from || parents.contains_key(next) {
                    continue;
                }
                parents.insert(next.clone(), current.clone());
                if next == to {
                    let nodes = reconstruct(&parents, from, to);
                    return Some(GraphPath {
                        distance: nodes.len() - 1,
                        nodes,
                    });
                }
                queue.push_back(next.clone());
            }
        }
    }
    None
}

fn reconstruct(parents: &HashMap<String, String>, from: &str, to: &str) -> Vec<String> {
    let mut nodes = vec![to.to_string()];
    let mut current = to;
    while current != from {
        match parents.get(current) {
            Some(parent) => {
                nodes.push(parent.clone());
                current = parent;
            }
            None => break,
        }
    }
    nodes.reverse();
    nodes
}

/// Min-heap entry ordered by cost.
struct HeapEntry {
    cost: f64,
    id: String,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.id == other.id
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; ties broken by ID for determinism.
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.id.cmp(&self.id))
    }
}
