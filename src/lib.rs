// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Repograph library - weighted repository graphs and history replay
//!
//! This crate composes the files and directories of a repository into one
//! weighted graph: relationship kinds are aggregated under user weights, node
//! sizes are scored from several metrics, positions come from a force-directed
//! layout, and a timeline controller replays commit history snapshot by
//! snapshot.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod aggregate;
pub mod commands;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod graph;
pub mod layout;
pub mod score;
pub mod timeline;

/// Core data types of a repository snapshot
pub mod types {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeSet;

    // =========================================================================
    // Nodes
    // =========================================================================

    /// Whether a node is a file or a directory
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum NodeKind {
        /// Regular file
        File,
        /// Directory containing other nodes
        Directory,
    }

    /// Raw per-node metrics before normalization
    #[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct NodeMetrics {
        /// File size in bytes
        pub size_bytes: f64,
        /// Number of commits touching the node
        pub commit_count: f64,
        /// Days since the last commit touching the node
        pub recency_days: f64,
        /// Number of top-level identifiers (classes, functions, ...)
        pub identifier_count: f64,
    }

    /// A file or directory in one snapshot
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RepositoryNode {
        /// Stable identifier, unique across the repository's lifetime
        pub id: String,
        /// Repository-relative path
        pub path: String,
        /// File or directory
        pub kind: NodeKind,
        /// Nesting depth (0 for top-level entries)
        pub depth: u32,
        /// Id of the containing directory, if it is part of the snapshot
        pub parent: Option<String>,
        /// Raw metrics
        pub metrics: NodeMetrics,
    }

    impl RepositoryNode {
        /// Create a file node with default metrics
        #[must_use]
        pub fn file(id: &str) -> Self {
            Self::new(id, NodeKind::File)
        }

        /// Create a directory node with default metrics
        #[must_use]
        pub fn directory(id: &str) -> Self {
            Self::new(id, NodeKind::Directory)
        }

        fn new(id: &str, kind: NodeKind) -> Self {
            Self {
                id: id.into(),
                path: id.into(),
                kind,
                depth: u32::try_from(id.matches('/').count()).unwrap_or(u32::MAX),
                parent: None,
                metrics: NodeMetrics::default(),
            }
        }

        /// Set the parent directory id
        #[must_use]
        pub fn with_parent(mut self, parent: &str) -> Self {
            self.parent = Some(parent.into());
            self
        }

        /// Set the raw metrics
        #[must_use]
        pub fn with_metrics(mut self, metrics: NodeMetrics) -> Self {
            self.metrics = metrics;
            self
        }

        /// Whether this node is a directory
        #[must_use]
        pub fn is_directory(&self) -> bool {
            self.kind == NodeKind::Directory
        }
    }

    // =========================================================================
    // Relationships
    // =========================================================================

    /// The three independently weighted relationship kinds
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum RelationshipKind {
        /// Explicit code reference (import, call, inheritance)
        Reference,
        /// Filesystem containment or proximity
        Filesystem,
        /// Semantic similarity
        Semantic,
    }

    impl RelationshipKind {
        /// All kinds, in display order
        pub const ALL: [Self; 3] = [Self::Reference, Self::Filesystem, Self::Semantic];

        /// Map a raw relationship type string onto a kind
        #[must_use]
        pub fn from_raw(raw: &str) -> Option<Self> {
            match raw.to_ascii_lowercase().as_str() {
                "reference" | "import" | "call" | "inheritance" | "uses" => Some(Self::Reference),
                "filesystem" | "contains" | "filesystem_proximity" => Some(Self::Filesystem),
                "semantic" | "semantic_similarity" => Some(Self::Semantic),
                _ => None,
            }
        }

        /// Short lowercase name
        #[must_use]
        pub fn as_str(&self) -> &'static str {
            match self {
                Self::Reference => "reference",
                Self::Filesystem => "filesystem",
                Self::Semantic => "semantic",
            }
        }
    }

    /// One raw, directed relationship between two nodes
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct RelationshipEdge {
        /// Source node id
        pub source: String,
        /// Target node id
        pub target: String,
        /// Relationship kind
        pub kind: RelationshipKind,
        /// Raw strength; 1.0 means one observed occurrence
        pub strength: f64,
    }

    impl RelationshipEdge {
        /// Create an edge with the default strength of one occurrence
        #[must_use]
        pub fn new(source: &str, target: &str, kind: RelationshipKind) -> Self {
            Self {
                source: source.into(),
                target: target.into(),
                kind,
                strength: 1.0,
            }
        }

        /// Set the raw strength
        #[must_use]
        pub fn with_strength(mut self, strength: f64) -> Self {
            self.strength = strength;
            self
        }

        /// Strength usable in arithmetic: non-finite becomes 1, negative becomes 0
        #[must_use]
        pub fn effective_strength(&self) -> f64 {
            if self.strength.is_finite() {
                self.strength.max(0.0)
            } else {
                1.0
            }
        }
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Full node and edge state of the repository at one point in time
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Snapshot {
        /// Files and directories
        #[serde(default)]
        pub nodes: Vec<RepositoryNode>,
        /// Raw relationship edges
        #[serde(default)]
        pub edges: Vec<RelationshipEdge>,
    }

    impl Snapshot {
        /// Create a snapshot from nodes and edges
        #[must_use]
        pub fn new(nodes: Vec<RepositoryNode>, edges: Vec<RelationshipEdge>) -> Self {
            Self { nodes, edges }
        }

        /// Ids of all nodes in the snapshot
        #[must_use]
        pub fn node_ids(&self) -> BTreeSet<String> {
            self.nodes.iter().map(|n| n.id.clone()).collect()
        }

        /// Look up a node by id
        #[must_use]
        pub fn node(&self, id: &str) -> Option<&RepositoryNode> {
            self.nodes.iter().find(|n| n.id == id)
        }

        /// Check if the snapshot has no nodes
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.nodes.is_empty()
        }
    }

    // =========================================================================
    // History
    // =========================================================================

    /// A rename of one node id to another
    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct Rename {
        /// Id before the commit
        pub from: String,
        /// Id after the commit
        pub to: String,
    }

    /// Files added, removed and renamed by one commit, as recorded by history
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct FileLifecycle {
        /// Ids added by the commit
        pub added: Vec<String>,
        /// Ids removed by the commit
        pub removed: Vec<String>,
        /// Renamed ids
        pub renamed: Vec<Rename>,
    }

    /// Repository snapshot at one commit
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TimelinePoint {
        /// Commit hash
        pub commit_id: String,
        /// Commit timestamp as recorded (ISO-8601)
        pub timestamp: String,
        /// Commit message
        pub message: String,
        /// Commit author
        pub author: Option<String>,
        /// Recorded lifecycle of the commit
        pub lifecycle: FileLifecycle,
        /// Graph valid at this commit
        pub snapshot: Snapshot,
    }

    impl TimelinePoint {
        /// Parse the timestamp; offsets are honoured, naive times are taken as UTC
        #[must_use]
        pub fn committed_at(&self) -> Option<DateTime<Utc>> {
            if let Ok(dt) = DateTime::parse_from_rfc3339(&self.timestamp) {
                return Some(dt.with_timezone(&Utc));
            }
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(&self.timestamp, fmt).ok())
                .map(|naive| naive.and_utc())
        }
    }

    /// The ordered timeline of one branch
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Branch {
        /// Branch name
        pub name: String,
        /// Timeline points, oldest first
        pub points: Vec<TimelinePoint>,
    }

    /// Nodes added, removed or renamed between two consecutive active snapshots
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct LifecycleDiff {
        /// Ids that entered
        pub added: Vec<String>,
        /// Ids that exited
        pub removed: Vec<String>,
        /// Ids that carried over under a new name
        pub renamed: Vec<Rename>,
    }

    impl LifecycleDiff {
        /// Diff two node sets; declared renames are honoured when both ends match
        #[must_use]
        pub fn between(
            before: &BTreeSet<String>,
            after: &BTreeSet<String>,
            declared: &[Rename],
        ) -> Self {
            let renamed: Vec<Rename> = declared
                .iter()
                .filter(|r| {
                    r.from != r.to
                        && before.contains(&r.from)
                        && !after.contains(&r.from)
                        && after.contains(&r.to)
                        && !before.contains(&r.to)
                })
                .cloned()
                .collect();

            let added = after
                .difference(before)
                .filter(|id| !renamed.iter().any(|r| &r.to == *id))
                .cloned()
                .collect();
            let removed = before
                .difference(after)
                .filter(|id| !renamed.iter().any(|r| &r.from == *id))
                .cloned()
                .collect();

            Self {
                added,
                removed,
                renamed,
            }
        }

        /// Check if nothing changed
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.added.is_empty() && self.removed.is_empty() && self.renamed.is_empty()
        }
    }

    // =========================================================================
    // Layout
    // =========================================================================

    /// Position in 2D space
    #[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
    pub struct Position {
        /// X coordinate
        pub x: f64,
        /// Y coordinate
        pub y: f64,
    }

    impl Position {
        /// Create a position
        #[must_use]
        pub fn new(x: f64, y: f64) -> Self {
            Self { x, y }
        }

        /// Euclidean distance to another position
        #[must_use]
        pub fn distance(&self, other: &Self) -> f64 {
            (self.x - other.x).hypot(self.y - other.y)
        }
    }
}

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::{EngineConfig, RelationshipWeights, SizingWeights, Weight, WeightConfig};
    pub use crate::engine::{Engine, Frame};
    pub use crate::error::{Error, Result};
    pub use crate::types::*;
}
