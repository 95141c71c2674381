// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Invariant tests for graph composition and history replay
//!
//! These tests verify critical invariants:
//! 1. Aggregation - weighted sums per ordered pair, zero weights contribute nothing
//! 2. Scoring - composite scores stay in `0..=1` and never go NaN
//! 3. Layout - bounded steps, reweighting keeps positions
//! 4. Timeline - seeking is idempotent, playback and branch switches are well-defined

use proptest::prelude::*;
use repograph::aggregate::aggregate;
use repograph::config::{FrameBudget, LayoutParams, PlaybackConfig};
use repograph::document::{Metadata, RepositoryDocument};
use repograph::graph::CompositeGraph;
use repograph::layout::ForceLayout;
use repograph::prelude::*;
use repograph::score::{score_nodes, DirectoryRollup, NEUTRAL_SCORE};
use repograph::timeline::{BranchSwitch, PlaybackState, TimelineController};
use std::collections::BTreeMap;

// =============================================================================
// Test Helpers
// =============================================================================

const IDS: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

fn make_edge(source: usize, target: usize, kind: u8, strength: f64) -> RelationshipEdge {
    let kind = RelationshipKind::ALL[usize::from(kind) % 3];
    RelationshipEdge::new(IDS[source], IDS[target], kind).with_strength(strength)
}

fn make_snapshot(present: &[bool], edges: &[(usize, usize, u8, f64)]) -> Snapshot {
    let nodes = IDS
        .iter()
        .zip(present)
        .filter(|&(_, &keep)| keep)
        .map(|(id, _)| RepositoryNode::file(id))
        .collect();
    let edges = edges
        .iter()
        .map(|&(s, t, k, w)| make_edge(s, t, k, w))
        .collect();
    Snapshot::new(nodes, edges)
}

fn make_point(commit: &str, snapshot: Snapshot) -> TimelinePoint {
    TimelinePoint {
        commit_id: commit.into(),
        timestamp: String::new(),
        message: String::new(),
        author: None,
        lifecycle: FileLifecycle::default(),
        snapshot,
    }
}

fn make_document(branches: Vec<Branch>) -> RepositoryDocument {
    RepositoryDocument {
        snapshot: Snapshot::default(),
        branches,
        metadata: Metadata::default(),
    }
}

fn make_renamed_point(commit: &str, snapshot: Snapshot, from: &str, to: &str) -> TimelinePoint {
    let mut point = make_point(commit, snapshot);
    point.lifecycle.renamed.push(Rename {
        from: from.into(),
        to: to.into(),
    });
    point
}

fn min_pairwise(layout: &ForceLayout) -> f64 {
    let positions: Vec<Position> = layout.positions().into_values().collect();
    let mut best = f64::INFINITY;
    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            best = best.min(positions[i].distance(&positions[j]));
        }
    }
    best
}

fn arb_edges() -> impl Strategy<Value = Vec<(usize, usize, u8, f64)>> {
    prop::collection::vec((0..6usize, 0..6usize, 0..3u8, 0.0..5.0f64), 0..24)
}

fn arb_weight() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), Just(100.0), 0.0..=100.0f64]
}

// =============================================================================
// Aggregation
// =============================================================================

proptest! {
    #[test]
    fn prop_aggregated_weight_is_weighted_sum(
        edges in arb_edges(),
        reference in arb_weight(),
        filesystem in arb_weight(),
        semantic in arb_weight(),
    ) {
        let snapshot = make_snapshot(&[true; 6], &edges);
        let weights = RelationshipWeights::new(reference, filesystem, semantic);

        let mut expected: BTreeMap<(String, String), f64> = BTreeMap::new();
        for edge in &snapshot.edges {
            if edge.source == edge.target {
                continue;
            }
            let amount = edge.strength * weights.get(edge.kind).value() / 100.0;
            if amount > 0.0 {
                *expected.entry((edge.source.clone(), edge.target.clone())).or_default() += amount;
            }
        }

        let aggregated = aggregate(&snapshot, &weights);

        prop_assert_eq!(aggregated.len(), expected.len());
        for edge in &aggregated {
            let want = expected[&(edge.source.clone(), edge.target.clone())];
            prop_assert!(edge.weight > 0.0);
            prop_assert!((edge.weight - want).abs() <= 1e-9 * want.max(1.0));
        }
        prop_assert!(aggregated
            .windows(2)
            .all(|w| (&w[0].source, &w[0].target) < (&w[1].source, &w[1].target)));
    }

    #[test]
    fn prop_zero_weight_kind_contributes_nothing(edges in arb_edges()) {
        let snapshot = make_snapshot(&[true; 6], &edges);
        let only_reference = RelationshipWeights::new(100.0, 0.0, 0.0);

        let aggregated = aggregate(&snapshot, &only_reference);

        for edge in &aggregated {
            prop_assert_eq!(edge.dominant, RelationshipKind::Reference);
        }
    }

    #[test]
    fn prop_dangling_edges_are_dropped(
        present in prop::collection::vec(any::<bool>(), 6),
        edges in arb_edges(),
    ) {
        let snapshot = make_snapshot(&present, &edges);
        let ids = snapshot.node_ids();

        for edge in aggregate(&snapshot, &RelationshipWeights::default()) {
            prop_assert!(ids.contains(&edge.source));
            prop_assert!(ids.contains(&edge.target));
        }
    }
}

// =============================================================================
// Scoring
// =============================================================================

proptest! {
    #[test]
    fn prop_scores_are_bounded(
        metrics in prop::collection::vec((0.0..1e6f64, 0.0..500.0f64, 0.0..3650.0f64, 0.0..200.0f64), 1..7),
        weights in prop::array::uniform5(arb_weight()),
        edges in arb_edges(),
    ) {
        let nodes: Vec<RepositoryNode> = metrics
            .iter()
            .enumerate()
            .map(|(i, &(size, commits, recency, identifiers))| {
                RepositoryNode::file(IDS[i % 6]).with_metrics(NodeMetrics {
                    size_bytes: size,
                    commit_count: commits,
                    recency_days: recency,
                    identifier_count: identifiers,
                })
            })
            .collect();
        let snapshot = Snapshot::new(nodes, make_snapshot(&[true; 6], &edges).edges);
        let sizing = SizingWeights::new(weights[0], weights[1], weights[2], weights[3], weights[4]);
        let rollup = DirectoryRollup::compute(&snapshot);
        let graph = CompositeGraph::build(&snapshot, aggregate(&snapshot, &RelationshipWeights::default()));

        let scores = score_nodes(&snapshot, &rollup, &graph, &sizing);

        for score in scores.values() {
            prop_assert!(score.is_finite());
            prop_assert!((0.0..=1.0).contains(score));
        }
        if weights.iter().all(|&w| w == 0.0) {
            prop_assert!(scores.values().all(|&s| s == NEUTRAL_SCORE));
        }
    }
}

#[test]
fn test_scenario_sizes_normalize_linearly() {
    let snapshot = Snapshot::new(
        [("a", 10.0), ("b", 20.0), ("c", 30.0)]
            .iter()
            .map(|&(id, size)| {
                RepositoryNode::file(id).with_metrics(NodeMetrics {
                    size_bytes: size,
                    ..NodeMetrics::default()
                })
            })
            .collect(),
        vec![],
    );
    let rollup = DirectoryRollup::compute(&snapshot);
    let graph = CompositeGraph::build(&snapshot, vec![]);

    let scores = score_nodes(
        &snapshot,
        &rollup,
        &graph,
        &SizingWeights::new(100.0, 0.0, 0.0, 0.0, 0.0),
    );

    assert!((scores["a"] - 0.0).abs() < 1e-12);
    assert!((scores["b"] - 0.5).abs() < 1e-12);
    assert!((scores["c"] - 1.0).abs() < 1e-12);
}

#[test]
fn test_scenario_overlapping_kinds_are_summed() {
    let snapshot = Snapshot::new(
        vec![RepositoryNode::file("A"), RepositoryNode::file("B")],
        vec![
            RelationshipEdge::new("A", "B", RelationshipKind::Reference).with_strength(2.0),
            RelationshipEdge::new("A", "B", RelationshipKind::Filesystem),
        ],
    );

    let aggregated = aggregate(&snapshot, &RelationshipWeights::new(50.0, 100.0, 0.0));

    assert_eq!(aggregated.len(), 1);
    assert!((aggregated[0].weight - 2.0).abs() < 1e-12);
}

// =============================================================================
// Layout
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_step_displacement_is_bounded(
        present in prop::collection::vec(any::<bool>(), 6),
        edges in arb_edges(),
    ) {
        let snapshot = make_snapshot(&present, &edges);
        let aggregated = aggregate(&snapshot, &RelationshipWeights::default());
        let params = LayoutParams::default();
        let mut layout = ForceLayout::new(params);
        layout.reset(&snapshot.nodes, &aggregated);
        prop_assert!(min_pairwise(&layout) >= params.min_distance - 1e-6);

        for _ in 0..30 {
            let before = layout.positions();
            layout.step();
            for (id, after) in layout.positions() {
                let moved = before[&id].distance(&after);
                prop_assert!(moved <= params.step_limit() + 1e-6, "{} moved {}", id, moved);
            }
            prop_assert!(min_pairwise(&layout) >= params.min_distance - 1e-6);
        }
    }

    #[test]
    fn prop_reweighting_keeps_positions(
        edges in arb_edges(),
        reference in arb_weight(),
        filesystem in arb_weight(),
        semantic in arb_weight(),
    ) {
        let snapshot = make_snapshot(&[true; 6], &edges);
        let mut engine = Engine::new(EngineConfig::default());
        engine.load_snapshot(snapshot);
        engine.settle();
        let before: Vec<Option<Position>> = IDS.iter().map(|id| engine.position(id)).collect();

        engine.set_relationship_weights(RelationshipWeights::new(reference, filesystem, semantic));
        engine.frame(&FrameBudget::iterations(0));

        let after: Vec<Option<Position>> = IDS.iter().map(|id| engine.position(id)).collect();
        prop_assert_eq!(before, after);
    }
}

#[test]
fn test_scenario_crowded_directory_never_overlaps() {
    let params = LayoutParams::default();
    let mut nodes = vec![RepositoryNode::directory("src")];
    nodes.extend((0..150).map(|i| RepositoryNode::file(&format!("src/m{}.py", i)).with_parent("src")));
    let mut layout = ForceLayout::new(params);

    layout.reset(&nodes, &[]);
    assert!(min_pairwise(&layout) >= params.min_distance - 1e-6);
    for _ in 0..10 {
        layout.step();
        assert!(min_pairwise(&layout) >= params.min_distance - 1e-6);
    }
}

#[test]
fn test_empty_graph_is_valid() {
    let mut engine = Engine::new(EngineConfig::default());
    engine.load_snapshot(Snapshot::default());

    let status = engine.settle();
    let frame = engine.frame(&FrameBudget::default());

    assert!(status.converged);
    assert!(frame.nodes.is_empty());
    assert!(frame.edges.is_empty());
}

// =============================================================================
// Timeline
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_seek_twice_is_idempotent(
        points in prop::collection::vec(
            (prop::collection::vec(any::<bool>(), 6), arb_edges()),
            1..6,
        ),
        index in 0..8usize,
    ) {
        let points = points
            .iter()
            .enumerate()
            .map(|(i, (present, edges))| make_point(&format!("c{}", i), make_snapshot(present, edges)))
            .collect();
        let document = make_document(vec![Branch { name: "main".into(), points }]);
        let mut engine = Engine::from_document(document, EngineConfig::default());

        let first = engine.seek(index);
        let edges = engine.composition().graph.edges().to_vec();
        let active = engine.snapshot().node_ids();
        let second = engine.seek(index);

        prop_assert!(second.is_empty());
        prop_assert_eq!(engine.composition().graph.edges(), edges.as_slice());
        prop_assert_eq!(engine.snapshot().node_ids(), active);
        for id in &first.added {
            prop_assert!(engine.position(id).is_some());
        }
    }
}

#[test]
fn test_scenario_scrubbing_across_rename_keeps_node() {
    let points = vec![
        make_point("c0", make_snapshot(&[true, true, false, false, false, false], &[])),
        make_renamed_point("c1", make_snapshot(&[true, false, true, false, false, false], &[]), "b", "c"),
        make_point("c2", make_snapshot(&[true, false, true, true, false, false], &[])),
    ];
    let document = make_document(vec![Branch { name: "main".into(), points }]);
    let mut engine = Engine::from_document(document, EngineConfig::default());
    engine.settle();
    let start = engine.position("b").unwrap();

    let forward = engine.seek(2);
    assert_eq!(forward.renamed.len(), 1);
    assert_eq!(forward.added, vec!["d".to_string()]);
    assert_eq!(engine.position("c"), Some(start));

    let backward = engine.seek(0);
    assert_eq!(backward.renamed[0].from, "c");
    assert_eq!(backward.renamed[0].to, "b");
    assert_eq!(backward.removed, vec!["d".to_string()]);
    assert!(backward.added.is_empty());
    assert_eq!(engine.position("b"), Some(start));
}

#[test]
fn test_scenario_playback_ends_paused() {
    let points = (0..3)
        .map(|i| make_point(&format!("c{}", i), Snapshot::default()))
        .collect();
    let mut timeline = TimelineController::new(
        vec![Branch {
            name: "main".into(),
            points,
        }],
        "main",
        PlaybackConfig::default(),
    );
    let interval = timeline.interval();

    assert_eq!(timeline.index(), 0);
    timeline.play();
    let mut visited = vec![timeline.index()];
    for _ in 0..3 {
        visited.extend(timeline.advance(interval));
    }

    assert_eq!(visited, vec![0, 1, 2]);
    assert_eq!(timeline.state(), PlaybackState::Paused);
}

#[test]
fn test_scenario_branch_switch_mid_playback() {
    let main = Branch {
        name: "main".into(),
        points: (0..4)
            .map(|i| make_point(&format!("m{}", i), make_snapshot(&[true, true, false, false, false, false], &[])))
            .collect(),
    };
    let feature = Branch {
        name: "feature".into(),
        points: vec![
            make_point("f0", make_snapshot(&[false, false, true, true, false, false], &[])),
            make_point("f1", make_snapshot(&[false, false, true, true, true, false], &[])),
        ],
    };
    let mut engine = Engine::from_document(make_document(vec![main, feature]), EngineConfig::default());
    engine.play();
    engine.advance(engine.timeline().interval() * 2);
    assert_eq!(engine.timeline().index(), 2);

    assert_eq!(engine.change_branch("feature"), BranchSwitch::Switched);

    assert_eq!(engine.timeline().index(), 0);
    assert_eq!(engine.timeline().state(), PlaybackState::Paused);
    assert_eq!(engine.timeline().current().unwrap().commit_id, "f0");
    assert!(engine.position("c").is_some());
    assert!(engine.position("a").is_none());
}
