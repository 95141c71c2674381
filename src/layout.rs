// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Force-directed layout
//!
//! Forces per iteration:
//! - repulsion between every pair, `repulsion / d²` with `d` floored at `min_distance`
//! - springs along aggregated edges; with `s = weight / heaviest weight` the
//!   stiffness scales by `s` and the rest length by `2 - s`, so heavier edges
//!   hold their endpoints closer
//! - a hierarchy pull from each node toward its parent directory, independent
//!   of any relationship weight
//! - a mild pull toward the origin
//!
//! The simulation only ever continues from the current positions. Reweighting
//! swaps the springs, node set changes add or drop bodies in place, and only
//! [`ForceLayout::reset`] reseeds everything.

use crate::aggregate::AggregatedEdge;
use crate::config::{FrameBudget, LayoutParams};
use crate::types::{Position, Rename, RepositoryNode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::f64::consts::TAU;
use std::time::Instant;
use tracing::trace;

/// Passes of the minimum-distance correction per iteration
const SEPARATION_PASSES: usize = 4;

/// Slack allowed on the minimum distance for floating point error
const FLOOR_TOLERANCE: f64 = 1e-9;

/// Angle between successive points of a sunflower spiral, `π(3 - √5)`
const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;

/// Progress of the simulation since the last disturbance
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutStatus {
    /// Iterations since the last reset, reweight or node set change
    pub iterations: usize,
    /// Kinetic energy after the last iteration
    pub energy: f64,
    /// Whether kinetic energy fell below the threshold
    pub converged: bool,
    /// Whether the iteration budget ran out before convergence
    pub exhausted: bool,
}

impl LayoutStatus {
    /// Whether the simulation has stopped, converged or not
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.converged || self.exhausted
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Body {
    position: Position,
    velocity: Position,
}

#[derive(Debug, Clone)]
struct Spring {
    source: String,
    target: String,
    /// Weight relative to the heaviest edge, in `(0, 1]`
    stiffness: f64,
}

/// Force simulation state for one engine
#[derive(Debug, Clone)]
pub struct ForceLayout {
    params: LayoutParams,
    bodies: BTreeMap<String, Body>,
    parents: BTreeMap<String, String>,
    springs: Vec<Spring>,
    status: LayoutStatus,
}

impl ForceLayout {
    /// Create an empty layout
    #[must_use]
    pub fn new(params: LayoutParams) -> Self {
        Self {
            params,
            bodies: BTreeMap::new(),
            parents: BTreeMap::new(),
            springs: Vec::new(),
            status: LayoutStatus {
                converged: true,
                ..LayoutStatus::default()
            },
        }
    }

    /// Current parameters
    #[must_use]
    pub fn params(&self) -> &LayoutParams {
        &self.params
    }

    /// Replace parameters and continue from the current positions
    ///
    /// A larger `min_distance` is worked out by the separation pass over the
    /// following iterations.
    pub fn set_params(&mut self, params: LayoutParams) {
        self.params = params;
        self.disturb();
    }

    // =========================================================================
    // Node set and springs
    // =========================================================================

    /// Discard every body and seed a fresh layout
    ///
    /// Top-level nodes go on a ring, everything else next to its parent.
    pub fn reset(&mut self, nodes: &[RepositoryNode], edges: &[AggregatedEdge]) {
        self.bodies.clear();
        self.parents.clear();

        let ordered = by_depth(nodes);
        let roots: Vec<&str> = ordered
            .iter()
            .filter(|n| !has_present_parent(n, nodes))
            .map(|n| n.id.as_str())
            .collect();

        for (i, id) in roots.iter().enumerate() {
            let angle = (i as f64) * TAU / roots.len() as f64;
            let ring = Position::new(
                self.params.seed_radius * angle.cos(),
                self.params.seed_radius * angle.sin(),
            );
            self.insert_body(id, ring);
        }
        for node in ordered {
            if self.bodies.contains_key(&node.id) {
                continue;
            }
            let anchor = node
                .parent
                .as_deref()
                .and_then(|p| self.position(p))
                .unwrap_or_else(|| self.ring_point(&node.id));
            self.insert_body(&node.id, anchor);
        }

        self.set_parents(nodes);
        self.set_edges(edges);
        trace!("Layout reset with {} bodies", self.bodies.len());
    }

    /// Bring the body set in line with `nodes` without touching survivors
    ///
    /// Renamed nodes keep their body. New nodes start at their parent, else at
    /// their most strongly connected surviving neighbor, else on the seeding
    /// ring, plus a small deterministic jitter. Returns the removed bodies with
    /// their last positions.
    pub fn sync_nodes(
        &mut self,
        nodes: &[RepositoryNode],
        edges: &[AggregatedEdge],
        renames: &[Rename],
    ) -> Vec<(String, Position)> {
        let wanted: HashMap<&str, &RepositoryNode> =
            nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        for rename in renames {
            if wanted.contains_key(rename.to.as_str())
                && !wanted.contains_key(rename.from.as_str())
                && !self.bodies.contains_key(&rename.to)
            {
                if let Some(body) = self.bodies.remove(&rename.from) {
                    self.bodies.insert(rename.to.clone(), body);
                }
            }
        }

        let stale: Vec<String> = self
            .bodies
            .keys()
            .filter(|id| !wanted.contains_key(id.as_str()))
            .cloned()
            .collect();
        let removed: Vec<(String, Position)> = stale
            .into_iter()
            .filter_map(|id| self.bodies.remove(&id).map(|b| (id, b.position)))
            .collect();

        let mut added = 0usize;
        for node in by_depth(nodes) {
            if self.bodies.contains_key(&node.id) {
                continue;
            }
            let anchor = node
                .parent
                .as_deref()
                .and_then(|p| self.position(p))
                .or_else(|| self.strongest_neighbor(&node.id, edges))
                .unwrap_or_else(|| self.ring_point(&node.id));
            self.insert_body(&node.id, anchor);
            added += 1;
        }

        self.set_parents(nodes);
        self.set_edges(edges);
        trace!(
            "Layout sync: {} added, {} removed, {} bodies",
            added,
            removed.len(),
            self.bodies.len()
        );
        removed
    }

    /// Replace the springs, keeping every position and velocity
    pub fn set_edges(&mut self, edges: &[AggregatedEdge]) {
        let max = edges.iter().map(|e| e.weight).fold(0.0, f64::max);
        self.springs = edges
            .iter()
            .filter(|e| e.weight > 0.0 && e.source != e.target)
            .filter(|e| self.bodies.contains_key(&e.source) && self.bodies.contains_key(&e.target))
            .map(|e| Spring {
                source: e.source.clone(),
                target: e.target.clone(),
                stiffness: e.weight / max,
            })
            .collect();
        self.disturb();
    }

    /// Move a node, e.g. while the user drags it
    pub fn set_position(&mut self, id: &str, position: Position) {
        if let Some(body) = self.bodies.get_mut(id) {
            body.position = position;
            body.velocity = Position::default();
            self.disturb();
        }
    }

    fn set_parents(&mut self, nodes: &[RepositoryNode]) {
        self.parents = nodes
            .iter()
            .filter_map(|n| {
                let parent = n.parent.as_ref()?;
                (parent != &n.id && self.bodies.contains_key(parent))
                    .then(|| (n.id.clone(), parent.clone()))
            })
            .collect();
    }

    fn insert_body(&mut self, id: &str, anchor: Position) {
        let position = self.free_spot(id, anchor);
        self.bodies.insert(
            id.to_string(),
            Body {
                position,
                velocity: Position::default(),
            },
        );
    }

    /// Jittered spot near `anchor` at least `min_distance` from every body
    ///
    /// Tries the jittered anchor first, then walks a sunflower spiral outward.
    /// Past the spiral the spot goes just beyond the farthest body.
    fn free_spot(&self, id: &str, anchor: Position) -> Position {
        let (angle, radius) = hash_pair(id, "");
        let reach = self.params.jitter * (0.5 + 0.5 * radius);
        let heading = angle * TAU;
        let floor = self.params.min_distance;
        let at = |r: f64, theta: f64| {
            Position::new(anchor.x + r * theta.cos(), anchor.y + r * theta.sin())
        };

        let first = at(reach, heading);
        if floor.is_nan() || floor <= 0.0 || self.is_clear(&first, floor) {
            return first;
        }

        let attempts = 4 * self.bodies.len() + 16;
        for k in 1..=attempts {
            let k = k as f64;
            let spot = at(reach + floor * k.sqrt(), heading + k * GOLDEN_ANGLE);
            if self.is_clear(&spot, floor) {
                return spot;
            }
        }

        let farthest = self
            .bodies
            .values()
            .map(|b| b.position.distance(&anchor))
            .fold(0.0, f64::max);
        at(farthest + floor, heading)
    }

    fn is_clear(&self, spot: &Position, floor: f64) -> bool {
        self.bodies
            .values()
            .all(|b| b.position.distance(spot) >= floor)
    }

    fn strongest_neighbor(&self, id: &str, edges: &[AggregatedEdge]) -> Option<Position> {
        edges
            .iter()
            .filter_map(|e| {
                let other = if e.source == id {
                    &e.target
                } else if e.target == id {
                    &e.source
                } else {
                    return None;
                };
                self.bodies.get(other).map(|b| (e.weight, other, b.position))
            })
            .max_by(|a, b| a.0.total_cmp(&b.0).then_with(|| b.1.cmp(a.1)))
            .map(|(_, _, position)| position)
    }

    fn ring_point(&self, id: &str) -> Position {
        let (angle, _) = hash_pair(id, "ring");
        let center = self.centroid();
        Position::new(
            center.x + self.params.seed_radius * (angle * TAU).cos(),
            center.y + self.params.seed_radius * (angle * TAU).sin(),
        )
    }

    fn centroid(&self) -> Position {
        if self.bodies.is_empty() {
            return Position::default();
        }
        let n = self.bodies.len() as f64;
        let (x, y) = self
            .bodies
            .values()
            .fold((0.0, 0.0), |(x, y), b| (x + b.position.x, y + b.position.y));
        Position::new(x / n, y / n)
    }

    fn disturb(&mut self) {
        self.status.iterations = 0;
        self.status.converged = false;
        self.status.exhausted = false;
    }

    // =========================================================================
    // Simulation
    // =========================================================================

    /// Run one iteration and return the resulting kinetic energy
    pub fn step(&mut self) -> f64 {
        if self.bodies.is_empty() {
            self.status = LayoutStatus {
                iterations: self.status.iterations,
                energy: 0.0,
                converged: true,
                exhausted: false,
            };
            return 0.0;
        }

        let p = self.params;
        let ids: Vec<String> = self.bodies.keys().cloned().collect();
        let index: HashMap<&str, usize> =
            ids.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();
        let mut positions: Vec<Position> = self.bodies.values().map(|b| b.position).collect();
        let before = positions.clone();
        let mut forces = vec![Position::default(); ids.len()];
        let floor = p.min_distance.max(1e-3);

        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let (ux, uy, d) = direction(&positions[j], &positions[i], &ids[i], &ids[j]);
                let magnitude = p.repulsion / d.max(floor).powi(2);
                forces[i].x += ux * magnitude;
                forces[i].y += uy * magnitude;
                forces[j].x -= ux * magnitude;
                forces[j].y -= uy * magnitude;
            }
        }

        for spring in &self.springs {
            if let (Some(&s), Some(&t)) = (
                index.get(spring.source.as_str()),
                index.get(spring.target.as_str()),
            ) {
                let pull = p.spring * spring.stiffness;
                let rest = p.link_distance * (2.0 - spring.stiffness);
                apply_spring(&mut forces, &positions, s, t, pull, rest, false);
            }
        }

        for (child, parent) in &self.parents {
            if let (Some(&c), Some(&q)) = (index.get(child.as_str()), index.get(parent.as_str())) {
                apply_spring(&mut forces, &positions, c, q, p.hierarchy, p.link_distance * 0.5, true);
            }
        }

        let mut energy = 0.0;
        for (i, body) in self.bodies.values_mut().enumerate() {
            let fx = forces[i].x - p.centering * positions[i].x;
            let fy = forces[i].y - p.centering * positions[i].y;
            if !fx.is_finite() || !fy.is_finite() {
                body.velocity = Position::default();
                continue;
            }

            let mut vx = (body.velocity.x + fx * p.time_step) * p.damping;
            let mut vy = (body.velocity.y + fy * p.time_step) * p.damping;
            let mut dx = vx * p.time_step;
            let mut dy = vy * p.time_step;
            let len = dx.hypot(dy);
            if len > p.max_step {
                let scale = p.max_step / len;
                dx *= scale;
                dy *= scale;
                vx *= scale;
                vy *= scale;
            }

            body.velocity = Position::new(vx, vy);
            body.position.x += dx;
            body.position.y += dy;
            positions[i] = body.position;
            energy += vx * vx + vy * vy;
        }

        self.separate(&ids, &mut positions, &before);

        self.status.iterations += 1;
        self.status.energy = energy;
        self.status.converged = energy < p.energy_threshold;
        self.status.exhausted =
            !self.status.converged && self.status.iterations >= p.max_iterations;
        energy
    }

    /// Push apart any two distinct nodes closer than `min_distance`
    ///
    /// A node moves at most `min_distance` in total. Pairs the capped push
    /// cannot clear go back to where they started the iteration, so a layout
    /// that starts clear stays clear.
    fn separate(&mut self, ids: &[String], positions: &mut [Position], before: &[Position]) {
        let floor = self.params.min_distance;
        if floor <= 0.0 {
            return;
        }
        let start = positions.to_vec();

        for _ in 0..SEPARATION_PASSES {
            let mut moved = false;
            for i in 0..ids.len() {
                for j in (i + 1)..ids.len() {
                    let (ux, uy, d) = direction(&positions[j], &positions[i], &ids[i], &ids[j]);
                    if d >= floor {
                        continue;
                    }
                    let push = (floor - d) / 2.0;
                    positions[i].x += ux * push;
                    positions[i].y += uy * push;
                    positions[j].x -= ux * push;
                    positions[j].y -= uy * push;
                    moved = true;
                }
            }
            if !moved {
                break;
            }
        }

        for (position, origin) in positions.iter_mut().zip(&start) {
            let moved = position.distance(origin);
            if moved > floor {
                let scale = floor / moved;
                position.x = origin.x + (position.x - origin.x) * scale;
                position.y = origin.y + (position.y - origin.y) * scale;
            }
        }

        let held = hold_crowded(positions, before, floor);
        for ((body, position), held) in self.bodies.values_mut().zip(positions.iter()).zip(held) {
            body.position = *position;
            if held {
                body.velocity = Position::default();
            }
        }
    }

    /// Iterate within a frame budget; resumes where the last call stopped
    pub fn run(&mut self, budget: &FrameBudget) -> LayoutStatus {
        let started = Instant::now();
        let slice = budget.time_slice();
        let mut done = 0usize;

        while !self.status.is_settled() && done < budget.max_iterations {
            self.step();
            done += 1;
            if started.elapsed() >= slice {
                break;
            }
        }

        trace!(
            "Layout slice: {} iteration(s), energy {:.4}, converged {}, exhausted {}",
            done,
            self.status.energy,
            self.status.converged,
            self.status.exhausted
        );
        self.status
    }

    /// Iterate until converged or the iteration budget is spent
    pub fn settle(&mut self) -> LayoutStatus {
        while !self.status.is_settled() {
            self.step();
        }
        self.status
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Position of one node
    #[must_use]
    pub fn position(&self, id: &str) -> Option<Position> {
        self.bodies.get(id).map(|b| b.position)
    }

    /// All positions, ordered by id
    #[must_use]
    pub fn positions(&self) -> BTreeMap<String, Position> {
        self.bodies
            .iter()
            .map(|(id, b)| (id.clone(), b.position))
            .collect()
    }

    /// Simulation progress
    #[must_use]
    pub fn status(&self) -> LayoutStatus {
        self.status
    }

    /// Number of bodies
    #[must_use]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Check if there are no bodies
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

/// Sort nodes so parents come before their children
fn by_depth(nodes: &[RepositoryNode]) -> Vec<&RepositoryNode> {
    let mut ordered: Vec<&RepositoryNode> = nodes.iter().collect();
    ordered.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.id.cmp(&b.id)));
    ordered
}

fn has_present_parent(node: &RepositoryNode, nodes: &[RepositoryNode]) -> bool {
    node.parent
        .as_deref()
        .is_some_and(|p| p != node.id && nodes.iter().any(|n| n.id == p))
}

/// Return both ends of every pair still closer than `floor` to `before`
///
/// Only applies when `before` is itself clear, in which case the result is
/// clear too. Returns which positions were put back.
fn hold_crowded(positions: &mut [Position], before: &[Position], floor: f64) -> Vec<bool> {
    let mut held = vec![false; positions.len()];
    if min_gap(before) < floor - FLOOR_TOLERANCE {
        return held;
    }

    loop {
        let mut changed = false;
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                if positions[i].distance(&positions[j]) >= floor - FLOOR_TOLERANCE {
                    continue;
                }
                for k in [i, j] {
                    if !held[k] {
                        positions[k] = before[k];
                        held[k] = true;
                        changed = true;
                    }
                }
            }
        }
        if !changed {
            return held;
        }
    }
}

/// Smallest distance between two of `positions`
fn min_gap(positions: &[Position]) -> f64 {
    let mut gap = f64::INFINITY;
    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            gap = gap.min(positions[i].distance(&positions[j]));
        }
    }
    gap
}

/// Unit vector from `to` toward `from` plus their distance
///
/// Coincident points get a direction derived from the two ids, so the split is
/// deterministic.
fn direction(to: &Position, from: &Position, a: &str, b: &str) -> (f64, f64, f64) {
    let dx = from.x - to.x;
    let dy = from.y - to.y;
    let d = dx.hypot(dy);
    if d > 1e-9 {
        (dx / d, dy / d, d)
    } else {
        let (angle, _) = hash_pair(a, b);
        ((angle * TAU).cos(), (angle * TAU).sin(), 0.0)
    }
}

fn apply_spring(
    forces: &mut [Position],
    positions: &[Position],
    a: usize,
    b: usize,
    stiffness: f64,
    rest: f64,
    attract_only: bool,
) {
    let dx = positions[b].x - positions[a].x;
    let dy = positions[b].y - positions[a].y;
    let len = dx.hypot(dy);
    if len <= 1e-9 {
        return;
    }
    let mut stretch = len - rest;
    if attract_only {
        stretch = stretch.max(0.0);
    }
    let magnitude = stiffness * stretch;
    let (ux, uy) = (dx / len, dy / len);
    forces[a].x += ux * magnitude;
    forces[a].y += uy * magnitude;
    forces[b].x -= ux * magnitude;
    forces[b].y -= uy * magnitude;
}

/// Two stable pseudo-random values in `[0, 1)` derived from a pair of strings
fn hash_pair(a: &str, b: &str) -> (f64, f64) {
    let mut hasher = Sha256::new();
    hasher.update(a.as_bytes());
    hasher.update([0u8]);
    hasher.update(b.as_bytes());
    let digest = hasher.finalize();

    let unit = |bytes: &[u8]| {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        (u64::from_le_bytes(buf) >> 11) as f64 / (1u64 << 53) as f64
    };
    (unit(&digest[0..8]), unit(&digest[8..16]))
}
