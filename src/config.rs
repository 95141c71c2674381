// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Configuration management
//!
//! Every value the panels can change lives here as plain data. Nothing in the
//! engine reads ambient state; an [`EngineConfig`] is passed in explicitly and
//! individual groups are replaced through engine requests.

use crate::error::Result;
use crate::types::RelationshipKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "REPOGRAPH";

// =============================================================================
// Weights
// =============================================================================

/// A user weight, always within `0..=100`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Weight(f64);

impl Weight {
    /// Largest allowed weight
    pub const MAX: f64 = 100.0;

    /// Create a weight, clamping to `0..=100`; NaN becomes 0
    #[must_use]
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            Self(0.0)
        } else {
            Self(value.clamp(0.0, Self::MAX))
        }
    }

    /// Raw value in `0..=100`
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Value as a fraction in `0..=1`
    #[must_use]
    pub fn fraction(self) -> f64 {
        self.0 / Self::MAX
    }

    /// Whether this weight excludes its contribution entirely
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0 == 0.0
    }
}

impl From<f64> for Weight {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<Weight> for f64 {
    fn from(weight: Weight) -> Self {
        weight.0
    }
}

/// Weights of the three relationship kinds; they need not sum to 100
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipWeights {
    /// Explicit code references
    pub reference: Weight,
    /// Filesystem containment and proximity
    pub filesystem: Weight,
    /// Semantic similarity
    pub semantic: Weight,
}

impl RelationshipWeights {
    /// Build from raw values, clamping each
    #[must_use]
    pub fn new(reference: f64, filesystem: f64, semantic: f64) -> Self {
        Self {
            reference: Weight::new(reference),
            filesystem: Weight::new(filesystem),
            semantic: Weight::new(semantic),
        }
    }

    /// Weight for one relationship kind
    #[must_use]
    pub fn get(&self, kind: RelationshipKind) -> Weight {
        match kind {
            RelationshipKind::Reference => self.reference,
            RelationshipKind::Filesystem => self.filesystem,
            RelationshipKind::Semantic => self.semantic,
        }
    }
}

impl Default for RelationshipWeights {
    fn default() -> Self {
        Self::new(100.0, 50.0, 50.0)
    }
}

/// Weights of the five node-sizing metrics; they need not sum to 100
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingWeights {
    /// File size in bytes
    pub file_size: Weight,
    /// Number of commits
    pub commit_count: Weight,
    /// Recency of the last commit
    pub recency: Weight,
    /// Top-level identifier count
    pub identifiers: Weight,
    /// Aggregated in/out degree
    pub references: Weight,
}

impl SizingWeights {
    /// Build from raw values, clamping each
    #[must_use]
    pub fn new(
        file_size: f64,
        commit_count: f64,
        recency: f64,
        identifiers: f64,
        references: f64,
    ) -> Self {
        Self {
            file_size: Weight::new(file_size),
            commit_count: Weight::new(commit_count),
            recency: Weight::new(recency),
            identifiers: Weight::new(identifiers),
            references: Weight::new(references),
        }
    }

    /// Weights in the scorer's metric order
    #[must_use]
    pub fn as_array(&self) -> [Weight; 5] {
        [
            self.file_size,
            self.commit_count,
            self.recency,
            self.identifiers,
            self.references,
        ]
    }
}

impl Default for SizingWeights {
    fn default() -> Self {
        Self::new(100.0, 0.0, 0.0, 0.0, 0.0)
    }
}

/// Relationship and sizing weights together
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightConfig {
    /// Relationship kind weights
    pub relationships: RelationshipWeights,
    /// Node sizing weights
    pub sizing: SizingWeights,
}

// =============================================================================
// Layout, playback and scheduling
// =============================================================================

/// Force simulation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutParams {
    /// Repulsion constant between every pair of nodes
    pub repulsion: f64,
    /// Spring constant along aggregated edges, scaled by normalized weight
    pub spring: f64,
    /// Rest length of springs on the heaviest edges; lighter edges rest up to twice as far
    pub link_distance: f64,
    /// Pull toward the origin
    pub centering: f64,
    /// Pull of a node toward its parent directory
    pub hierarchy: f64,
    /// Velocity retained per iteration
    pub damping: f64,
    /// Integration time step
    pub time_step: f64,
    /// Largest displacement a node may integrate in one iteration
    pub max_step: f64,
    /// Hard floor on the distance between two distinct nodes
    pub min_distance: f64,
    /// Kinetic energy below which the layout counts as converged
    pub energy_threshold: f64,
    /// Iterations allowed after each disturbance
    pub max_iterations: usize,
    /// Radius of the ring new roots are seeded on
    pub seed_radius: f64,
    /// Radius of the jitter applied to seeded nodes
    pub jitter: f64,
}

impl LayoutParams {
    /// Upper bound on one node's displacement in one iteration
    #[must_use]
    pub fn step_limit(&self) -> f64 {
        self.max_step + self.min_distance
    }
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            repulsion: 800.0,
            spring: 0.08,
            link_distance: 60.0,
            centering: 0.005,
            hierarchy: 0.05,
            damping: 0.85,
            time_step: 1.0,
            max_step: 12.0,
            min_distance: 4.0,
            energy_threshold: 0.05,
            max_iterations: 600,
            seed_radius: 150.0,
            jitter: 8.0,
        }
    }
}

/// Timeline playback cadence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Interval between snapshots at speed 1.0, in milliseconds
    pub base_interval_ms: u64,
    /// Speed multiplier; higher is faster
    pub speed: f64,
}

impl PlaybackConfig {
    /// Slowest allowed speed
    pub const MIN_SPEED: f64 = 0.1;
    /// Fastest allowed speed
    pub const MAX_SPEED: f64 = 10.0;

    /// Clamp a requested speed into the allowed range; NaN becomes 1.0
    #[must_use]
    pub fn clamp_speed(speed: f64) -> f64 {
        if speed.is_nan() {
            1.0
        } else {
            speed.clamp(Self::MIN_SPEED, Self::MAX_SPEED)
        }
    }

    /// Interval between automatic advances at the current speed
    #[must_use]
    pub fn interval(&self) -> Duration {
        let millis = self.base_interval_ms.max(1) as f64 / Self::clamp_speed(self.speed);
        Duration::from_secs_f64(millis / 1000.0)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: 1000,
            speed: 1.0,
        }
    }
}

/// Work allowed per rendered frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameBudget {
    /// Layout iterations per frame
    pub max_iterations: usize,
    /// Wall-clock slice per frame, in milliseconds
    pub time_slice_ms: u64,
}

impl FrameBudget {
    /// Budget that only counts iterations
    #[must_use]
    pub fn iterations(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            time_slice_ms: u64::MAX,
        }
    }

    /// Wall-clock slice as a duration
    #[must_use]
    pub fn time_slice(&self) -> Duration {
        Duration::from_millis(self.time_slice_ms)
    }
}

impl Default for FrameBudget {
    fn default() -> Self {
        Self {
            max_iterations: 60,
            time_slice_ms: 12,
        }
    }
}

// =============================================================================
// Engine configuration
// =============================================================================

/// Complete engine configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Relationship and sizing weights
    pub weights: WeightConfig,
    /// Force simulation parameters
    pub layout: LayoutParams,
    /// Playback cadence
    pub playback: PlaybackConfig,
    /// Per-frame work budget
    pub budget: FrameBudget,
}

/// Default location of the configuration file
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "hyperpolymath", "repograph")
        .map(|d| d.config_dir().join("config.toml"))
}

/// Load configuration from an optional TOML file plus `REPOGRAPH_*` overrides
///
/// An explicit `path` must exist; the default location is optional.
/// Nested keys use `__` in environment variables, e.g.
/// `REPOGRAPH_WEIGHTS__RELATIONSHIPS__SEMANTIC=20`.
pub fn load(path: Option<&Path>) -> Result<EngineConfig> {
    let mut builder = config::Config::builder();

    match path {
        Some(p) => {
            builder = builder.add_source(
                config::File::from(p.to_path_buf())
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        None => {
            if let Some(p) = default_config_path() {
                builder = builder.add_source(
                    config::File::from(p)
                        .format(config::FileFormat::Toml)
                        .required(false),
                );
            }
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let loaded: EngineConfig = builder.build()?.try_deserialize()?;
    tracing::debug!("Loaded configuration: {:?}", loaded);
    Ok(loaded)
}
