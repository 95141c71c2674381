// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Composite graph - aggregated edges and size scores for one snapshot

use crate::aggregate::{aggregate, AggregatedEdge};
use crate::config::WeightConfig;
use crate::score::{score_nodes, DirectoryRollup};
use crate::types::{NodeKind, Position, Snapshot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

/// Aggregated graph with petgraph backing for degree queries
#[derive(Debug, Clone, Default)]
pub struct CompositeGraph {
    /// The underlying directed graph; edge payload is the aggregated weight
    graph: DiGraph<String, f64>,
    /// Map from node id to node index
    node_indices: HashMap<String, NodeIndex>,
    /// Node kinds by id
    kinds: BTreeMap<String, NodeKind>,
    /// Aggregated edges, sorted by (source, target)
    edges: Vec<AggregatedEdge>,
}

impl CompositeGraph {
    /// Create a new empty graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a snapshot's nodes and already aggregated edges
    #[must_use]
    pub fn build(snapshot: &Snapshot, edges: Vec<AggregatedEdge>) -> Self {
        let mut composite = Self::new();

        for node in &snapshot.nodes {
            if composite.node_indices.contains_key(&node.id) {
                continue;
            }
            let idx = composite.graph.add_node(node.id.clone());
            composite.node_indices.insert(node.id.clone(), idx);
            composite.kinds.insert(node.id.clone(), node.kind);
        }

        for edge in &edges {
            if let (Some(&from_idx), Some(&to_idx)) = (
                composite.node_indices.get(&edge.source),
                composite.node_indices.get(&edge.target),
            ) {
                composite.graph.add_edge(from_idx, to_idx, edge.weight);
            }
        }

        composite.edges = edges;
        composite
    }

    /// Number of aggregated edges touching a node, in either direction
    #[must_use]
    pub fn degree(&self, id: &str) -> usize {
        self.node_indices.get(id).map_or(0, |&idx| {
            self.graph.edges_directed(idx, Direction::Outgoing).count()
                + self.graph.edges_directed(idx, Direction::Incoming).count()
        })
    }

    /// Ids of nodes connected to `id` by an aggregated edge
    #[must_use]
    pub fn neighbors(&self, id: &str) -> Vec<&str> {
        self.node_indices.get(id).map_or_else(Vec::new, |&idx| {
            let mut ids: Vec<&str> = self
                .graph
                .neighbors_undirected(idx)
                .map(|n| self.graph[n].as_str())
                .collect();
            ids.sort_unstable();
            ids.dedup();
            ids
        })
    }

    /// Get all aggregated edges
    #[must_use]
    pub fn edges(&self) -> &[AggregatedEdge] {
        &self.edges
    }

    /// Aggregated weight of an ordered pair, if present
    #[must_use]
    pub fn weight(&self, source: &str, target: &str) -> Option<f64> {
        self.edges
            .binary_search_by(|e| (e.source.as_str(), e.target.as_str()).cmp(&(source, target)))
            .ok()
            .map(|i| self.edges[i].weight)
    }

    /// Heaviest aggregated weight, or 0 for an edgeless graph
    #[must_use]
    pub fn max_weight(&self) -> f64 {
        self.edges.iter().map(|e| e.weight).fold(0.0, f64::max)
    }

    /// Kind of a node
    #[must_use]
    pub fn kind(&self, id: &str) -> Option<NodeKind> {
        self.kinds.get(id).copied()
    }

    /// Get node count
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get edge count
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Check if the graph is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

/// Derived graph state for the active snapshot and weights; never persisted
#[derive(Debug, Clone, Default)]
pub struct GraphComposition {
    /// Aggregated edges with petgraph backing
    pub graph: CompositeGraph,
    /// Composite size score per node id, in `0..=1`
    pub scores: BTreeMap<String, f64>,
}

impl GraphComposition {
    /// Aggregate edges and score nodes for one snapshot
    #[must_use]
    pub fn compose(snapshot: &Snapshot, rollup: &DirectoryRollup, weights: &WeightConfig) -> Self {
        let edges = aggregate(snapshot, &weights.relationships);
        let graph = CompositeGraph::build(snapshot, edges);
        let scores = score_nodes(snapshot, rollup, &graph, &weights.sizing);
        tracing::debug!(
            "Composed {} node(s), {} aggregated edge(s)",
            graph.node_count(),
            graph.edge_count()
        );
        Self { graph, scores }
    }

    /// Score of a node; 0.5 for unknown ids
    #[must_use]
    pub fn score(&self, id: &str) -> f64 {
        self.scores.get(id).copied().unwrap_or(0.5)
    }

    /// Export to DOT format for Graphviz
    ///
    /// Node width follows the composite score and edge pen width the
    /// aggregated weight relative to the heaviest edge. Nodes found in
    /// `positions` are pinned there.
    #[must_use]
    pub fn to_dot(&self, positions: &BTreeMap<String, Position>) -> String {
        let mut dot = String::from("digraph repository {\n");
        dot.push_str("  layout=neato;\n");
        dot.push_str("  node [style=filled, fillcolor=\"#e8eef7\"];\n\n");

        for (id, score) in &self.scores {
            let shape = match self.graph.kind(id) {
                Some(NodeKind::Directory) => "folder",
                _ => "ellipse",
            };
            let pin = positions
                .get(id)
                .map(|p| format!(", pos=\"{:.2},{:.2}!\"", p.x, p.y))
                .unwrap_or_default();
            let _ = writeln!(
                dot,
                "  \"{}\" [shape={}, width={:.3}{}];",
                escape(id),
                shape,
                0.3 + score,
                pin
            );
        }

        dot.push('\n');

        let max = self.graph.max_weight();
        for edge in self.graph.edges() {
            let pen = if max > 0.0 { 0.5 + 3.5 * edge.weight / max } else { 1.0 };
            let _ = writeln!(
                dot,
                "  \"{}\" -> \"{}\" [penwidth={:.2}, label=\"{}\"];",
                escape(&edge.source),
                escape(&edge.target),
                pen,
                edge.dominant.as_str()
            );
        }

        dot.push_str("}\n");
        dot
    }
}

fn escape(id: &str) -> String {
    id.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelationshipWeights;
    use crate::types::{RelationshipEdge, RelationshipKind, RepositoryNode};

    fn make_test_snapshot() -> Snapshot {
        Snapshot::new(
            vec![
                RepositoryNode::directory("src"),
                RepositoryNode::file("src/a.rs").with_parent("src"),
                RepositoryNode::file("src/b.rs").with_parent("src"),
            ],
            vec![
                RelationshipEdge::new("src", "src/a.rs", RelationshipKind::Filesystem),
                RelationshipEdge::new("src", "src/b.rs", RelationshipKind::Filesystem),
                RelationshipEdge::new("src/a.rs", "src/b.rs", RelationshipKind::Reference),
            ],
        )
    }

    #[test]
    fn test_degree_counts_both_directions() {
        let snapshot = make_test_snapshot();
        let edges = aggregate(&snapshot, &RelationshipWeights::new(100.0, 100.0, 100.0));
        let graph = CompositeGraph::build(&snapshot, edges);

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.degree("src/a.rs"), 2);
        assert_eq!(graph.degree("src"), 2);
        assert_eq!(graph.degree("missing"), 0);
        assert_eq!(graph.neighbors("src/b.rs"), vec!["src", "src/a.rs"]);
    }

    #[test]
    fn test_weight_lookup() {
        let snapshot = make_test_snapshot();
        let edges = aggregate(&snapshot, &RelationshipWeights::new(40.0, 0.0, 0.0));
        let graph = CompositeGraph::build(&snapshot, edges);

        assert_eq!(graph.edge_count(), 1);
        assert!((graph.weight("src/a.rs", "src/b.rs").unwrap() - 0.4).abs() < 1e-12);
        assert!(graph.weight("src/b.rs", "src/a.rs").is_none());
    }

    #[test]
    fn test_to_dot() {
        let snapshot = make_test_snapshot();
        let composition = GraphComposition::compose(
            &snapshot,
            &DirectoryRollup::compute(&snapshot),
            &WeightConfig::default(),
        );

        let mut positions = BTreeMap::new();
        positions.insert("src".to_string(), Position::new(1.0, -2.5));
        let dot = composition.to_dot(&positions);

        assert!(dot.contains("digraph repository"));
        assert!(dot.contains("\"src\" [shape=folder"));
        assert!(dot.contains("pos=\"1.00,-2.50!\""));
        assert!(dot.contains("\"src/a.rs\" -> \"src/b.rs\""));
    }
}
