// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Engine facade - owns one snapshot, its composition, the layout and the timeline
//!
//! Requests mutate state immediately except weight changes, which are
//! coalesced and applied at the next [`Engine::frame`]. Layout iterations only
//! happen inside `frame` (bounded by a [`FrameBudget`]) or [`Engine::settle`].

use crate::config::{
    EngineConfig, FrameBudget, LayoutParams, RelationshipWeights, SizingWeights, WeightConfig,
};
use crate::document::RepositoryDocument;
use crate::graph::GraphComposition;
use crate::layout::{ForceLayout, LayoutStatus};
use crate::score::DirectoryRollup;
use crate::timeline::{BranchSwitch, PlaybackState, TimelineController};
use crate::types::{LifecycleDiff, NodeKind, Position, Rename, Snapshot};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::mem;
use std::time::Duration;
use tracing::debug;

// =============================================================================
// Frame output
// =============================================================================

/// One node as it should be drawn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePlacement {
    /// Node id
    pub id: String,
    /// File or directory
    pub kind: NodeKind,
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Composite size score in `0..=1`
    pub size_score: f64,
}

/// One aggregated edge as it should be drawn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeWeight {
    /// Source node id
    pub source: String,
    /// Target node id
    pub target: String,
    /// Aggregated weight
    pub weight: f64,
}

/// A node that left the graph since the previous frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitingNode {
    /// Node id
    pub id: String,
    /// Last known position
    pub x: f64,
    /// Last known position
    pub y: f64,
}

/// Timeline position as shown to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineStatus {
    /// Playback state
    pub state: PlaybackState,
    /// Current index on the active branch
    pub index: usize,
    /// Number of points on the active branch
    pub len: usize,
    /// Active branch, if there is history
    pub branch: Option<String>,
    /// Commit at the current index
    pub commit_id: Option<String>,
    /// Fraction of the playback interval already elapsed
    pub progress: f64,
}

/// Everything a renderer needs for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    /// Every node of the active snapshot
    pub nodes: Vec<NodePlacement>,
    /// Every aggregated edge, ordered by (source, target)
    pub edges: Vec<EdgeWeight>,
    /// Node set changes since the previous frame
    pub diff: LifecycleDiff,
    /// Nodes removed since the previous frame
    pub exiting: Vec<ExitingNode>,
    /// Layout progress
    pub layout: LayoutStatus,
    /// Timeline progress
    pub timeline: TimelineStatus,
}

/// One automatic timeline step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    /// Index advanced to
    pub index: usize,
    /// Commit at that index
    pub commit_id: String,
    /// Node set changes of the step
    pub diff: LifecycleDiff,
}

// =============================================================================
// Engine
// =============================================================================

/// Graph composition and history replay engine
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    /// Weights the composition was built with
    applied: WeightConfig,
    /// Latest requested weights not yet applied
    pending: Option<WeightConfig>,
    /// Snapshot shown when there is no history
    base: Snapshot,
    snapshot: Snapshot,
    rollup: DirectoryRollup,
    composition: GraphComposition,
    layout: ForceLayout,
    timeline: TimelineController,
    active: BTreeSet<String>,
    /// Node ids of the last emitted frame
    emitted: BTreeSet<String>,
    renames: Vec<Rename>,
    exiting: BTreeMap<String, Position>,
}

impl Engine {
    /// Create an engine with an empty graph and no history
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let mut timeline = TimelineController::idle();
        timeline.set_speed(config.playback.speed);
        Self {
            config,
            applied: config.weights,
            pending: None,
            base: Snapshot::default(),
            snapshot: Snapshot::default(),
            rollup: DirectoryRollup::default(),
            composition: GraphComposition::default(),
            layout: ForceLayout::new(config.layout),
            timeline,
            active: BTreeSet::new(),
            emitted: BTreeSet::new(),
            renames: Vec::new(),
            exiting: BTreeMap::new(),
        }
    }

    /// Create an engine showing a document
    ///
    /// With history, the first point of the default branch is active;
    /// otherwise the document's own snapshot is.
    #[must_use]
    pub fn from_document(document: RepositoryDocument, config: EngineConfig) -> Self {
        let default_branch = document.default_branch().to_string();
        let mut engine = Self::new(config);
        engine.timeline =
            TimelineController::new(document.branches, &default_branch, config.playback);
        engine.base = document.snapshot;

        let initial = engine
            .timeline
            .current()
            .map_or_else(|| engine.base.clone(), |p| p.snapshot.clone());
        engine.install(initial, &[], true);
        engine
    }

    /// Replace the whole graph with a snapshot and reset the layout
    pub fn load_snapshot(&mut self, snapshot: Snapshot) -> LifecycleDiff {
        self.base = snapshot.clone();
        self.timeline = TimelineController::idle();
        self.timeline.set_speed(self.config.playback.speed);
        self.install(snapshot, &[], true)
    }

    // =========================================================================
    // Weights and parameters
    // =========================================================================

    /// Request new weights; applied at the next frame
    pub fn set_weights(&mut self, weights: WeightConfig) {
        self.pending = Some(weights);
    }

    /// Request new relationship weights; applied at the next frame
    pub fn set_relationship_weights(&mut self, relationships: RelationshipWeights) {
        let mut weights = self.weights();
        weights.relationships = relationships;
        self.pending = Some(weights);
    }

    /// Request new sizing weights; applied at the next frame
    pub fn set_sizing_weights(&mut self, sizing: SizingWeights) {
        let mut weights = self.weights();
        weights.sizing = sizing;
        self.pending = Some(weights);
    }

    /// Latest requested weights, applied or not
    #[must_use]
    pub fn weights(&self) -> WeightConfig {
        self.pending.unwrap_or(self.applied)
    }

    /// Replace force simulation parameters, continuing from current positions
    pub fn set_layout_params(&mut self, params: LayoutParams) {
        self.config.layout = params;
        self.layout.set_params(params);
    }

    fn apply_pending(&mut self) {
        let Some(weights) = self.pending.take() else {
            return;
        };
        if weights == self.applied {
            return;
        }
        self.applied = weights;
        self.composition = GraphComposition::compose(&self.snapshot, &self.rollup, &self.applied);
        self.layout.set_edges(self.composition.graph.edges());
        debug!("Applied new weights");
    }

    // =========================================================================
    // Timeline
    // =========================================================================

    /// Jump to a timeline index; returns the node set change of the jump
    pub fn seek(&mut self, index: usize) -> LifecycleDiff {
        let from = self.timeline.index();
        let Some(point) = self.timeline.seek(index) else {
            return LifecycleDiff::default();
        };
        if point.snapshot == self.snapshot {
            return LifecycleDiff::default();
        }
        let snapshot = point.snapshot.clone();
        let renamed = self.renames_between(from, self.timeline.index());
        self.install(snapshot, &renamed, false)
    }

    /// Start playback
    pub fn play(&mut self) -> bool {
        self.timeline.play()
    }

    /// Pause playback
    pub fn pause(&mut self) -> bool {
        self.timeline.pause()
    }

    /// Set the playback speed multiplier
    pub fn set_speed(&mut self, speed: f64) {
        self.timeline.set_speed(speed);
        self.config.playback.speed = self.timeline.speed();
    }

    /// Let wall-clock time pass and apply every automatic step it covers
    pub fn advance(&mut self, elapsed: Duration) -> Vec<Transition> {
        let mut from = self.timeline.index();
        let reached = self.timeline.advance(elapsed);
        let mut transitions = Vec::with_capacity(reached.len());

        for index in reached {
            let Some(point) = self.timeline.point(index) else {
                continue;
            };
            let commit_id = point.commit_id.clone();
            let snapshot = point.snapshot.clone();
            let renamed = self.renames_between(from, index);
            from = index;
            let diff = self.install(snapshot, &renamed, false);
            transitions.push(Transition {
                index,
                commit_id,
                diff,
            });
        }
        transitions
    }

    /// Switch branch; a known branch replaces the whole graph
    pub fn change_branch(&mut self, name: &str) -> BranchSwitch {
        let outcome = self.timeline.change_branch(name);
        if outcome == BranchSwitch::Switched {
            let snapshot = self
                .timeline
                .current()
                .map_or_else(|| self.base.clone(), |p| p.snapshot.clone());
            self.install(snapshot, &[], true);
        }
        outcome
    }

    /// Renames declared between two indices of the active branch, chained
    ///
    /// Going backward every rename is inverted and replayed newest first.
    fn renames_between(&self, from: usize, to: usize) -> Vec<Rename> {
        let mut chained = Vec::new();
        if to > from {
            for point in ((from + 1)..=to).filter_map(|i| self.timeline.point(i)) {
                for rename in &point.lifecycle.renamed {
                    chain_rename(&mut chained, rename);
                }
            }
        } else {
            for point in ((to + 1)..=from).rev().filter_map(|i| self.timeline.point(i)) {
                for rename in point.lifecycle.renamed.iter().rev() {
                    let inverted = Rename {
                        from: rename.to.clone(),
                        to: rename.from.clone(),
                    };
                    chain_rename(&mut chained, &inverted);
                }
            }
        }
        chained
    }

    /// Timeline controller, read-only
    #[must_use]
    pub fn timeline(&self) -> &TimelineController {
        &self.timeline
    }

    // =========================================================================
    // Composition
    // =========================================================================

    /// Make `snapshot` active and return the node set change
    fn install(&mut self, snapshot: Snapshot, declared: &[Rename], reset: bool) -> LifecycleDiff {
        if let Some(weights) = self.pending.take() {
            self.applied = weights;
        }

        let after = snapshot.node_ids();
        let diff = LifecycleDiff::between(&self.active, &after, declared);

        self.snapshot = snapshot;
        self.rollup = DirectoryRollup::compute(&self.snapshot);
        self.composition = GraphComposition::compose(&self.snapshot, &self.rollup, &self.applied);

        let edges = self.composition.graph.edges();
        if reset {
            for id in &diff.removed {
                if let Some(position) = self.layout.position(id) {
                    self.exiting.insert(id.clone(), position);
                }
            }
            self.layout.reset(&self.snapshot.nodes, edges);
        } else {
            let removed = self.layout.sync_nodes(&self.snapshot.nodes, edges, &diff.renamed);
            self.exiting.extend(removed);
        }
        for id in &diff.added {
            self.exiting.remove(id);
        }
        for rename in &diff.renamed {
            self.record_rename(rename);
        }

        self.active = after;
        debug!(
            "Active snapshot: {} node(s), +{} -{} ~{}",
            self.active.len(),
            diff.added.len(),
            diff.removed.len(),
            diff.renamed.len()
        );
        diff
    }

    /// Remember a rename until the next frame, collapsing chains
    fn record_rename(&mut self, rename: &Rename) {
        chain_rename(&mut self.renames, rename);
    }

    /// Active snapshot
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Composition of the active snapshot under the applied weights
    #[must_use]
    pub fn composition(&self) -> &GraphComposition {
        &self.composition
    }

    /// Current position of a node
    #[must_use]
    pub fn position(&self, id: &str) -> Option<Position> {
        self.layout.position(id)
    }

    /// Graphviz rendering of the active composition at the current positions
    #[must_use]
    pub fn to_dot(&self) -> String {
        self.composition.to_dot(&self.layout.positions())
    }

    /// Apply pending weights and run the layout to convergence
    pub fn settle(&mut self) -> LayoutStatus {
        self.apply_pending();
        self.layout.settle()
    }

    /// Apply pending weights, advance the layout within `budget` and describe the result
    pub fn frame(&mut self, budget: &FrameBudget) -> Frame {
        self.apply_pending();
        let layout = self.layout.run(budget);

        let renames = mem::take(&mut self.renames);
        let diff = LifecycleDiff::between(&self.emitted, &self.active, &renames);
        let exiting = mem::take(&mut self.exiting)
            .into_iter()
            .filter(|(id, _)| diff.removed.contains(id))
            .map(|(id, p)| ExitingNode { id, x: p.x, y: p.y })
            .collect();
        self.emitted.clone_from(&self.active);

        let nodes = self
            .snapshot
            .nodes
            .iter()
            .map(|node| {
                let position = self.layout.position(&node.id).unwrap_or_default();
                NodePlacement {
                    id: node.id.clone(),
                    kind: node.kind,
                    x: position.x,
                    y: position.y,
                    size_score: self.composition.score(&node.id),
                }
            })
            .collect();
        let edges = self
            .composition
            .graph
            .edges()
            .iter()
            .map(|e| EdgeWeight {
                source: e.source.clone(),
                target: e.target.clone(),
                weight: e.weight,
            })
            .collect();

        Frame {
            nodes,
            edges,
            diff,
            exiting,
            layout,
            timeline: self.timeline_status(),
        }
    }

    fn timeline_status(&self) -> TimelineStatus {
        TimelineStatus {
            state: self.timeline.state(),
            index: self.timeline.index(),
            len: self.timeline.len(),
            branch: self.timeline.branch().map(str::to_string),
            commit_id: self.timeline.current().map(|p| p.commit_id.clone()),
            progress: self.timeline.transition_progress(),
        }
    }
}

/// Append `rename`, folding it into an earlier rename that ends at its source
fn chain_rename(renames: &mut Vec<Rename>, rename: &Rename) {
    match renames.iter_mut().find(|r| r.to == rename.from) {
        Some(existing) => existing.to.clone_from(&rename.to),
        None => renames.push(rename.clone()),
    }
    renames.retain(|r| r.from != r.to);
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
