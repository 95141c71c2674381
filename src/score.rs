// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Node scoring - composite, normalized size from several raw metrics

use crate::config::SizingWeights;
use crate::graph::CompositeGraph;
use crate::types::{RepositoryNode, Snapshot};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Score every node gets when all sizing weights are zero
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Metrics in scoring order; the order matches [`SizingWeights::as_array`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Size in bytes (directory: rolled up)
    FileSize,
    /// Commits touching the node
    CommitCount,
    /// Days since last commit, inverted so recent is large
    Recency,
    /// Top-level identifiers (directory: rolled up)
    Identifiers,
    /// Aggregated in/out degree
    References,
}

impl Metric {
    /// All metrics, in weight order
    pub const ALL: [Self; 5] = [
        Self::FileSize,
        Self::CommitCount,
        Self::Recency,
        Self::Identifiers,
        Self::References,
    ];

    fn inverted(self) -> bool {
        self == Self::Recency
    }
}

/// Size and identifier totals for every node of one snapshot
///
/// Files report their own values. A directory reports the sum over its
/// direct children, where child directories contribute their own rollup.
/// Depends only on tree membership, so it is computed once per snapshot and
/// reused across reweighting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectoryRollup {
    totals: HashMap<String, (f64, f64)>,
}

impl DirectoryRollup {
    /// Compute rollups bottom-up for a snapshot
    #[must_use]
    pub fn compute(snapshot: &Snapshot) -> Self {
        let by_id: HashMap<&str, &RepositoryNode> =
            snapshot.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for node in &snapshot.nodes {
            if let Some(parent) = node.parent.as_deref() {
                if parent != node.id && by_id.contains_key(parent) {
                    children.entry(parent).or_default().push(node.id.as_str());
                }
            }
        }

        let mut rollup = Self::default();
        let mut visiting = HashSet::new();
        for node in &snapshot.nodes {
            rollup.resolve(node.id.as_str(), &by_id, &children, &mut visiting);
        }
        rollup
    }

    fn resolve<'a>(
        &mut self,
        id: &'a str,
        by_id: &HashMap<&'a str, &'a RepositoryNode>,
        children: &HashMap<&'a str, Vec<&'a str>>,
        visiting: &mut HashSet<&'a str>,
    ) -> (f64, f64) {
        if let Some(&totals) = self.totals.get(id) {
            return totals;
        }
        let Some(node) = by_id.get(id) else {
            return (0.0, 0.0);
        };

        let totals = if node.is_directory() {
            // A parent cycle contributes nothing rather than recursing forever
            if !visiting.insert(id) {
                return (0.0, 0.0);
            }
            let mut sum = (0.0, 0.0);
            for &child in children.get(id).map(Vec::as_slice).unwrap_or_default() {
                let (size, identifiers) = self.resolve(child, by_id, children, visiting);
                sum.0 += size;
                sum.1 += identifiers;
            }
            visiting.remove(id);
            sum
        } else {
            (
                finite_or_zero(node.metrics.size_bytes),
                finite_or_zero(node.metrics.identifier_count),
            )
        };

        self.totals.insert(id.to_string(), totals);
        totals
    }

    /// Effective size of a node
    #[must_use]
    pub fn size(&self, id: &str) -> f64 {
        self.totals.get(id).map_or(0.0, |t| t.0)
    }

    /// Effective identifier count of a node
    #[must_use]
    pub fn identifiers(&self, id: &str) -> f64 {
        self.totals.get(id).map_or(0.0, |t| t.1)
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Min-max normalize a column; a constant or single-value column maps to 1.0
#[must_use]
pub fn normalize(values: &[f64], inverted: bool) -> Vec<f64> {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = max - min;

    values
        .iter()
        .map(|&v| {
            if span <= f64::EPSILON * max.abs().max(1.0) {
                1.0
            } else if inverted {
                (max - v) / span
            } else {
                (v - min) / span
            }
        })
        .collect()
}

/// Raw value of one metric for one node
fn raw_metric(
    metric: Metric,
    node: &RepositoryNode,
    rollup: &DirectoryRollup,
    graph: &CompositeGraph,
) -> f64 {
    match metric {
        Metric::FileSize => rollup.size(&node.id),
        Metric::CommitCount => finite_or_zero(node.metrics.commit_count),
        Metric::Recency => finite_or_zero(node.metrics.recency_days),
        Metric::Identifiers => rollup.identifiers(&node.id),
        Metric::References => graph.degree(&node.id) as f64,
    }
}

/// Composite score per node id, each in `0..=1`
///
/// `Σ(weight × normalized) / Σ(weight)`, or [`NEUTRAL_SCORE`] for every node
/// when all weights are zero.
#[must_use]
pub fn score_nodes(
    snapshot: &Snapshot,
    rollup: &DirectoryRollup,
    graph: &CompositeGraph,
    weights: &SizingWeights,
) -> BTreeMap<String, f64> {
    let weights = weights.as_array();
    let total: f64 = weights.iter().map(|w| w.value()).sum();

    if total <= 0.0 {
        return snapshot
            .nodes
            .iter()
            .map(|n| (n.id.clone(), NEUTRAL_SCORE))
            .collect();
    }

    let mut sums = vec![0.0; snapshot.nodes.len()];
    for (metric, weight) in Metric::ALL.into_iter().zip(weights) {
        if weight.is_zero() {
            continue;
        }
        let column: Vec<f64> = snapshot
            .nodes
            .iter()
            .map(|n| raw_metric(metric, n, rollup, graph))
            .collect();
        for (sum, value) in sums.iter_mut().zip(normalize(&column, metric.inverted())) {
            *sum += weight.value() * value;
        }
    }

    snapshot
        .nodes
        .iter()
        .zip(sums)
        .map(|(node, sum)| (node.id.clone(), (sum / total).clamp(0.0, 1.0)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeMetrics;

    fn sized(id: &str, size: f64) -> RepositoryNode {
        RepositoryNode::file(id).with_metrics(NodeMetrics {
            size_bytes: size,
            ..NodeMetrics::default()
        })
    }

    fn scores_for(snapshot: &Snapshot, weights: &SizingWeights) -> BTreeMap<String, f64> {
        let rollup = DirectoryRollup::compute(snapshot);
        let graph = CompositeGraph::build(snapshot, Vec::new());
        score_nodes(snapshot, &rollup, &graph, weights)
    }

    #[test]
    fn test_size_only_scores() {
        let snapshot = Snapshot::new(vec![sized("a", 10.0), sized("b", 20.0), sized("c", 30.0)], vec![]);

        let scores = scores_for(&snapshot, &SizingWeights::new(100.0, 0.0, 0.0, 0.0, 0.0));

        assert!((scores["a"] - 0.0).abs() < 1e-12);
        assert!((scores["b"] - 0.5).abs() < 1e-12);
        assert!((scores["c"] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_zero_weights_give_neutral() {
        let snapshot = Snapshot::new(vec![sized("a", 10.0), sized("b", 99.0)], vec![]);

        let scores = scores_for(&snapshot, &SizingWeights::new(0.0, 0.0, 0.0, 0.0, 0.0));

        assert!(scores.values().all(|&s| (s - NEUTRAL_SCORE).abs() < f64::EPSILON));
    }

    #[test]
    fn test_constant_and_single_normalize_to_one() {
        assert_eq!(normalize(&[7.0], false), vec![1.0]);
        assert_eq!(normalize(&[3.0, 3.0, 3.0], true), vec![1.0, 1.0, 1.0]);
        assert!(normalize(&[], false).is_empty());
    }

    #[test]
    fn test_recency_is_inverted() {
        let fresh = RepositoryNode::file("fresh").with_metrics(NodeMetrics {
            recency_days: 1.0,
            ..NodeMetrics::default()
        });
        let stale = RepositoryNode::file("stale").with_metrics(NodeMetrics {
            recency_days: 300.0,
            ..NodeMetrics::default()
        });
        let snapshot = Snapshot::new(vec![fresh, stale], vec![]);

        let scores = scores_for(&snapshot, &SizingWeights::new(0.0, 0.0, 100.0, 0.0, 0.0));

        assert!((scores["fresh"] - 1.0).abs() < 1e-12);
        assert!((scores["stale"] - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_weights_are_renormalized() {
        // size favours b, commits favour a; equal weights average the two
        let a = RepositoryNode::file("a").with_metrics(NodeMetrics {
            size_bytes: 0.0,
            commit_count: 10.0,
            ..NodeMetrics::default()
        });
        let b = RepositoryNode::file("b").with_metrics(NodeMetrics {
            size_bytes: 50.0,
            commit_count: 0.0,
            ..NodeMetrics::default()
        });
        let snapshot = Snapshot::new(vec![a, b], vec![]);

        let scores = scores_for(&snapshot, &SizingWeights::new(30.0, 30.0, 0.0, 0.0, 0.0));

        assert!((scores["a"] - 0.5).abs() < 1e-12);
        assert!((scores["b"] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_directory_rollup_is_bottom_up() {
        let snapshot = Snapshot::new(
            vec![
                RepositoryNode::directory("src"),
                RepositoryNode::directory("src/util").with_parent("src"),
                sized("src/main.rs", 100.0).with_parent("src"),
                sized("src/util/io.rs", 40.0).with_parent("src/util"),
                sized("src/util/fmt.rs", 60.0).with_parent("src/util"),
            ],
            vec![],
        );

        let rollup = DirectoryRollup::compute(&snapshot);

        assert!((rollup.size("src/util") - 100.0).abs() < 1e-12);
        assert!((rollup.size("src") - 200.0).abs() < 1e-12);
        assert!((rollup.size("src/main.rs") - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_parent_cycle_terminates() {
        let snapshot = Snapshot::new(
            vec![
                RepositoryNode::directory("x").with_parent("y"),
                RepositoryNode::directory("y").with_parent("x"),
            ],
            vec![],
        );

        let rollup = DirectoryRollup::compute(&snapshot);

        assert_eq!(rollup.size("x"), 0.0);
        assert_eq!(rollup.size("y"), 0.0);
    }

    #[test]
    fn test_empty_snapshot_scores_nothing() {
        let scores = scores_for(&Snapshot::default(), &SizingWeights::default());
        assert!(scores.is_empty());
    }
}
