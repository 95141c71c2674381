// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! History timeline controller - snapshot indexing, playback and branch switching
//!
//! ```text
//!   Idle  (no points on the active branch)
//!   Paused --play--> Playing --pause / reached last point--> Paused
//!   any    --change_branch(known)--> Paused at index 0
//! ```
//!
//! The controller only moves an index over read-only timeline points. Swapping
//! the selected snapshot into the composition pipeline is the engine's job.

use crate::config::PlaybackConfig;
use crate::types::{Branch, TimelinePoint};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// No history; the engine shows one static snapshot
    Idle,
    /// History available at a fixed index
    Paused,
    /// Index advances automatically
    Playing,
}

/// Outcome of a branch switch request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchSwitch {
    /// The active sequence was replaced
    Switched,
    /// Unknown branch; nothing changed
    Unchanged,
}

/// Timeline over the branches of one repository document
#[derive(Debug, Clone)]
pub struct TimelineController {
    branches: Vec<Branch>,
    active: usize,
    index: usize,
    state: PlaybackState,
    playback: PlaybackConfig,
    elapsed: Duration,
}

impl Default for TimelineController {
    fn default() -> Self {
        Self::idle()
    }
}

impl TimelineController {
    /// Controller without any history
    #[must_use]
    pub fn idle() -> Self {
        Self {
            branches: Vec::new(),
            active: 0,
            index: 0,
            state: PlaybackState::Idle,
            playback: PlaybackConfig::default(),
            elapsed: Duration::ZERO,
        }
    }

    /// Create a controller positioned at the first point of `default_branch`
    ///
    /// Falls back to the first branch when `default_branch` is unknown.
    #[must_use]
    pub fn new(branches: Vec<Branch>, default_branch: &str, mut playback: PlaybackConfig) -> Self {
        playback.speed = PlaybackConfig::clamp_speed(playback.speed);
        let active = branches
            .iter()
            .position(|b| b.name == default_branch)
            .unwrap_or(0);
        let mut controller = Self {
            branches,
            active,
            index: 0,
            state: PlaybackState::Idle,
            playback,
            elapsed: Duration::ZERO,
        };
        controller.state = controller.resting_state();
        controller
    }

    fn resting_state(&self) -> PlaybackState {
        if self.len() == 0 {
            PlaybackState::Idle
        } else {
            PlaybackState::Paused
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current playback state
    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Current index on the active branch
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of points on the active branch
    #[must_use]
    pub fn len(&self) -> usize {
        self.branches.get(self.active).map_or(0, |b| b.points.len())
    }

    /// Check if the active branch has no points
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the active branch
    #[must_use]
    pub fn branch(&self) -> Option<&str> {
        self.branches.get(self.active).map(|b| b.name.as_str())
    }

    /// Names of every branch, in document order
    #[must_use]
    pub fn branch_names(&self) -> Vec<&str> {
        self.branches.iter().map(|b| b.name.as_str()).collect()
    }

    /// Point at the current index
    #[must_use]
    pub fn current(&self) -> Option<&TimelinePoint> {
        self.point(self.index)
    }

    /// Point at an index on the active branch
    #[must_use]
    pub fn point(&self, index: usize) -> Option<&TimelinePoint> {
        self.branches.get(self.active)?.points.get(index)
    }

    /// Current speed multiplier
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.playback.speed
    }

    /// Interval between automatic advances
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.playback.interval()
    }

    /// Fraction of the current interval already elapsed, for interpolation
    #[must_use]
    pub fn transition_progress(&self) -> f64 {
        if self.state != PlaybackState::Playing {
            return 0.0;
        }
        (self.elapsed.as_secs_f64() / self.interval().as_secs_f64()).clamp(0.0, 1.0)
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Jump to an index, clamped to the active branch; no-op while idle
    pub fn seek(&mut self, index: usize) -> Option<&TimelinePoint> {
        if self.state == PlaybackState::Idle {
            return None;
        }
        self.index = index.min(self.len().saturating_sub(1));
        self.elapsed = Duration::ZERO;
        self.current()
    }

    /// Start playback; returns whether the state changed
    pub fn play(&mut self) -> bool {
        if self.state == PlaybackState::Paused {
            self.state = PlaybackState::Playing;
            self.elapsed = Duration::ZERO;
            debug!("Playback started at index {}", self.index);
            true
        } else {
            false
        }
    }

    /// Pause playback; returns whether the state changed
    pub fn pause(&mut self) -> bool {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
            self.elapsed = Duration::ZERO;
            true
        } else {
            false
        }
    }

    /// Set the speed multiplier, clamped to the allowed range
    pub fn set_speed(&mut self, speed: f64) {
        self.playback.speed = PlaybackConfig::clamp_speed(speed);
    }

    /// Advance by one interval while playing
    ///
    /// Returns the new index, if any. Reaching the last point pauses.
    pub fn tick(&mut self) -> Option<usize> {
        if self.state != PlaybackState::Playing {
            return None;
        }
        let last = self.len().saturating_sub(1);
        if self.index >= last {
            self.pause();
            return None;
        }

        self.seek(self.index + 1);
        if self.index >= last {
            self.state = PlaybackState::Paused;
            debug!("Playback reached the last point");
        }
        Some(self.index)
    }

    /// Let wall-clock time pass; returns every index advanced to, in order
    pub fn advance(&mut self, elapsed: Duration) -> Vec<usize> {
        if self.state != PlaybackState::Playing {
            return Vec::new();
        }

        let interval = self.interval();
        let mut pending = self.elapsed.saturating_add(elapsed);
        let mut reached = Vec::new();
        while self.state == PlaybackState::Playing && pending >= interval {
            pending -= interval;
            if let Some(index) = self.tick() {
                reached.push(index);
            }
        }

        self.elapsed = if self.state == PlaybackState::Playing {
            pending
        } else {
            Duration::ZERO
        };
        reached
    }

    /// Switch to another branch: index 0, paused
    pub fn change_branch(&mut self, name: &str) -> BranchSwitch {
        let Some(position) = self.branches.iter().position(|b| b.name == name) else {
            debug!("Ignoring switch to unknown branch {}", name);
            return BranchSwitch::Unchanged;
        };

        self.active = position;
        self.index = 0;
        self.elapsed = Duration::ZERO;
        self.state = self.resting_state();
        info!("Switched to branch {} ({} points)", name, self.len());
        BranchSwitch::Switched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FileLifecycle, Snapshot};

    fn make_point(commit: &str) -> TimelinePoint {
        TimelinePoint {
            commit_id: commit.into(),
            timestamp: "2024-01-01T00:00:00Z".into(),
            message: format!("commit {}", commit),
            author: None,
            lifecycle: FileLifecycle::default(),
            snapshot: Snapshot::default(),
        }
    }

    fn make_branch(name: &str, commits: &[&str]) -> Branch {
        Branch {
            name: name.into(),
            points: commits.iter().map(|c| make_point(c)).collect(),
        }
    }

    fn three_points() -> TimelineController {
        TimelineController::new(
            vec![
                make_branch("main", &["c0", "c1", "c2"]),
                make_branch("feature", &["f0", "f1"]),
            ],
            "main",
            PlaybackConfig::default(),
        )
    }

    #[test]
    fn test_idle_without_history() {
        let mut timeline = TimelineController::idle();

        assert_eq!(timeline.state(), PlaybackState::Idle);
        assert!(timeline.seek(3).is_none());
        assert!(!timeline.play());
        assert!(timeline.advance(Duration::from_secs(10)).is_empty());
    }

    #[test]
    fn test_seek_clamps() {
        let mut timeline = three_points();

        assert_eq!(timeline.seek(99).unwrap().commit_id, "c2");
        assert_eq!(timeline.index(), 2);
        assert_eq!(timeline.seek(0).unwrap().commit_id, "c0");
    }

    #[test]
    fn test_playback_stops_at_last_point() {
        let mut timeline = three_points();
        let interval = timeline.interval();

        assert!(timeline.play());
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.extend(timeline.advance(interval));
        }

        assert_eq!(seen, vec![1, 2]);
        assert_eq!(timeline.index(), 2);
        assert_eq!(timeline.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_play_at_last_point_pauses_on_next_tick() {
        let mut timeline = three_points();
        timeline.seek(2);
        timeline.play();

        assert_eq!(timeline.tick(), None);
        assert_eq!(timeline.state(), PlaybackState::Paused);
        assert_eq!(timeline.index(), 2);
    }

    #[test]
    fn test_partial_intervals_accumulate() {
        let mut timeline = three_points();
        timeline.play();
        let half = timeline.interval() / 2;

        assert!(timeline.advance(half).is_empty());
        assert!((timeline.transition_progress() - 0.5).abs() < 1e-6);
        assert_eq!(timeline.advance(half), vec![1]);
    }

    #[test]
    fn test_speed_shortens_interval() {
        let mut timeline = three_points();
        let slow = timeline.interval();
        timeline.set_speed(2.0);

        assert_eq!(timeline.interval(), slow / 2);
    }

    #[test]
    fn test_configured_speed_is_clamped() {
        let fast = TimelineController::new(
            vec![make_branch("main", &["c0"])],
            "main",
            PlaybackConfig {
                speed: 50.0,
                ..PlaybackConfig::default()
            },
        );
        let stopped = TimelineController::new(
            vec![make_branch("main", &["c0"])],
            "main",
            PlaybackConfig {
                speed: 0.0,
                ..PlaybackConfig::default()
            },
        );

        assert_eq!(fast.speed(), PlaybackConfig::MAX_SPEED);
        assert_eq!(stopped.speed(), PlaybackConfig::MIN_SPEED);
        assert_eq!(fast.interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_huge_elapsed_time_saturates() {
        let mut timeline = three_points();
        let interval = timeline.interval();
        timeline.play();
        assert!(timeline.advance(interval / 2).is_empty());

        let reached = timeline.advance(Duration::MAX);

        assert_eq!(reached, vec![1, 2]);
        assert_eq!(timeline.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_branch_switch_resets_to_paused() {
        let mut timeline = three_points();
        timeline.play();
        timeline.advance(timeline.interval());
        assert_eq!(timeline.index(), 1);

        assert_eq!(timeline.change_branch("feature"), BranchSwitch::Switched);
        assert_eq!(timeline.index(), 0);
        assert_eq!(timeline.state(), PlaybackState::Paused);
        assert_eq!(timeline.current().unwrap().commit_id, "f0");
    }

    #[test]
    fn test_unknown_branch_is_noop() {
        let mut timeline = three_points();
        timeline.seek(1);
        timeline.play();

        assert_eq!(timeline.change_branch("nope"), BranchSwitch::Unchanged);
        assert_eq!(timeline.index(), 1);
        assert_eq!(timeline.state(), PlaybackState::Playing);
        assert_eq!(timeline.branch(), Some("main"));
    }

    #[test]
    fn test_unknown_default_branch_falls_back_to_first() {
        let timeline = TimelineController::new(
            vec![make_branch("trunk", &["t0"])],
            "main",
            PlaybackConfig::default(),
        );

        assert_eq!(timeline.branch(), Some("trunk"));
        assert_eq!(timeline.state(), PlaybackState::Paused);
    }
}
