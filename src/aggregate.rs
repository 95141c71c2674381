// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Relationship aggregation - folds weighted relationship kinds into one weight per pair
//!
//! Each raw edge contributes `strength * weight / 100`. Contributions sharing an
//! ordered `(source, target)` pair are summed, so a pair linked by several kinds
//! is always heavier than by any one of them. Pairs that end up at zero are left
//! out of the result.

use crate::config::RelationshipWeights;
use crate::types::{RelationshipEdge, RelationshipKind, Snapshot};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, trace};

/// One rendered edge: the summed contribution of every raw edge of a pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedEdge {
    /// Source node id
    pub source: String,
    /// Target node id
    pub target: String,
    /// Summed weighted contribution, always positive
    pub weight: f64,
    /// Kind with the largest share of the weight
    pub dominant: RelationshipKind,
}

#[derive(Default)]
struct PairTotals {
    per_kind: [f64; 3],
}

impl PairTotals {
    fn add(&mut self, kind: RelationshipKind, amount: f64) {
        self.per_kind[kind_slot(kind)] += amount;
    }

    fn total(&self) -> f64 {
        self.per_kind.iter().sum()
    }

    fn dominant(&self) -> RelationshipKind {
        let mut best = RelationshipKind::ALL[0];
        for kind in RelationshipKind::ALL {
            if self.per_kind[kind_slot(kind)] > self.per_kind[kind_slot(best)] {
                best = kind;
            }
        }
        best
    }
}

fn kind_slot(kind: RelationshipKind) -> usize {
    match kind {
        RelationshipKind::Reference => 0,
        RelationshipKind::Filesystem => 1,
        RelationshipKind::Semantic => 2,
    }
}

/// Weighted contribution of a single raw edge
#[must_use]
pub fn contribution(edge: &RelationshipEdge, weights: &RelationshipWeights) -> f64 {
    edge.effective_strength() * weights.get(edge.kind).fraction()
}

/// Aggregate the edges of a snapshot under the given weights
///
/// Output is sorted by `(source, target)`; identical inputs give identical
/// output regardless of the order of the raw edges.
#[must_use]
pub fn aggregate(snapshot: &Snapshot, weights: &RelationshipWeights) -> Vec<AggregatedEdge> {
    let present: HashSet<&str> = snapshot.nodes.iter().map(|n| n.id.as_str()).collect();
    aggregate_edges(&snapshot.edges, &present, weights)
}

/// Aggregate raw edges restricted to a node set
#[must_use]
pub fn aggregate_edges(
    edges: &[RelationshipEdge],
    present: &HashSet<&str>,
    weights: &RelationshipWeights,
) -> Vec<AggregatedEdge> {
    let mut pairs: BTreeMap<(&str, &str), PairTotals> = BTreeMap::new();
    let mut dangling = 0usize;

    for edge in edges {
        if !present.contains(edge.source.as_str()) || !present.contains(edge.target.as_str()) {
            dangling += 1;
            continue;
        }
        if edge.source == edge.target {
            trace!("Skipping self-loop on {}", edge.source);
            continue;
        }

        let amount = contribution(edge, weights);
        if amount > 0.0 {
            pairs
                .entry((edge.source.as_str(), edge.target.as_str()))
                .or_default()
                .add(edge.kind, amount);
        }
    }

    if dangling > 0 {
        debug!("Dropped {} edge(s) with endpoints outside the node set", dangling);
    }

    pairs
        .into_iter()
        .filter_map(|((source, target), totals)| {
            let weight = totals.total();
            (weight > 0.0).then(|| AggregatedEdge {
                source: source.to_string(),
                target: target.to_string(),
                weight,
                dominant: totals.dominant(),
            })
        })
        .collect()
}
