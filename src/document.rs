// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Repository document loading
//!
//! The document is produced and validated upstream. This module only maps its
//! JSON shape onto engine types: raw relationship type names are folded into
//! the three relationship kinds, parents are resolved from paths, and the
//! history is split into branches.

use crate::error::{Error, Result};
use crate::types::{
    Branch, FileLifecycle, LifecycleDiff, NodeKind, NodeMetrics, Rename, RelationshipEdge,
    RelationshipKind, RepositoryNode, Snapshot, TimelinePoint,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Branch name used when the document does not name one
pub const DEFAULT_BRANCH: &str = "main";

// =============================================================================
// Wire shape
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    #[serde(default)]
    files: Vec<RawFile>,
    #[serde(default)]
    relationships: Vec<RawRelationship>,
    #[serde(default)]
    history: Option<RawHistory>,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Debug, Deserialize)]
struct RawFile {
    id: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: Option<f64>,
    #[serde(default)]
    depth: Option<u32>,
    #[serde(default)]
    metrics: Option<RawMetrics>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetrics {
    #[serde(default)]
    commit_count: Option<f64>,
    #[serde(default, alias = "recencyDays")]
    last_commit_days_ago: Option<f64>,
    #[serde(default, alias = "topLevelIdentifierCount")]
    top_level_identifiers: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawRelationship {
    source: String,
    target: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    strength: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHistory {
    #[serde(default)]
    timeline_points: Vec<RawTimelinePoint>,
    #[serde(default)]
    branches: BTreeMap<String, RawBranch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBranch {
    #[serde(default)]
    timeline_points: Vec<RawTimelinePoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTimelinePoint {
    commit_id: String,
    #[serde(default, alias = "timestamp")]
    date: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    state: Option<RawCommitState>,
    #[serde(default)]
    snapshot: RawSnapshot,
    #[serde(default)]
    file_lifecycle: Option<RawLifecycle>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCommitState {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    author: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    files: Vec<RawFile>,
    #[serde(default)]
    relationships: Vec<RawRelationship>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLifecycle {
    #[serde(default)]
    added: Vec<String>,
    #[serde(default)]
    removed: Vec<String>,
    #[serde(default)]
    renamed: Vec<RawRename>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRename {
    Pair(String, String),
    Named {
        #[serde(alias = "oldId", alias = "old")]
        from: String,
        #[serde(alias = "newId", alias = "new")]
        to: String,
    },
}

impl From<RawRename> for Rename {
    fn from(raw: RawRename) -> Self {
        match raw {
            RawRename::Pair(from, to) | RawRename::Named { from, to } => Self { from, to },
        }
    }
}

/// Repository metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Repository name
    #[serde(default)]
    pub repo_name: Option<String>,
    /// Branch the top-level timeline belongs to
    #[serde(default)]
    pub default_branch: Option<String>,
    /// Branch names advertised by the producer
    #[serde(default)]
    pub branches: Vec<String>,
    /// Schema version of the producer
    #[serde(default)]
    pub schema_version: Option<String>,
}

// =============================================================================
// Loaded document
// =============================================================================

/// A repository document mapped onto engine types
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepositoryDocument {
    /// Current state of the repository
    pub snapshot: Snapshot,
    /// Timelines, the default branch first
    pub branches: Vec<Branch>,
    /// Document metadata
    pub metadata: Metadata,
}

impl RepositoryDocument {
    /// Read and map a document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let document = Self::from_json(&content)?;
        info!(
            "Loaded {}: {} node(s), {} edge(s), {} branch(es)",
            path.display(),
            document.snapshot.nodes.len(),
            document.snapshot.edges.len(),
            document.branches.len()
        );
        Ok(document)
    }

    /// Map a document from its JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawDocument = serde_json::from_str(json)?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: RawDocument) -> Self {
        let snapshot = build_snapshot(raw.files, raw.relationships);
        let default_branch = raw
            .metadata
            .default_branch
            .clone()
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string());

        let mut branches = Vec::new();
        if let Some(history) = raw.history {
            if !history.timeline_points.is_empty() {
                branches.push(build_branch(&default_branch, history.timeline_points));
            }
            for (name, branch) in history.branches {
                if branches.iter().any(|b: &Branch| b.name == name) {
                    debug!("Skipping duplicate timeline for branch {}", name);
                    continue;
                }
                branches.push(build_branch(&name, branch.timeline_points));
            }
        }

        Self {
            snapshot,
            branches,
            metadata: raw.metadata,
        }
    }

    /// Name of the branch playback starts on
    #[must_use]
    pub fn default_branch(&self) -> &str {
        self.metadata
            .default_branch
            .as_deref()
            .or_else(|| self.branches.first().map(|b| b.name.as_str()))
            .unwrap_or(DEFAULT_BRANCH)
    }

    /// Whether the document carries any history
    #[must_use]
    pub fn has_history(&self) -> bool {
        self.branches.iter().any(|b| !b.points.is_empty())
    }
}

fn build_branch(name: &str, raw_points: Vec<RawTimelinePoint>) -> Branch {
    let mut points: Vec<TimelinePoint> = Vec::with_capacity(raw_points.len());

    for raw in raw_points {
        let state = raw.state.unwrap_or_default();
        let snapshot = build_snapshot(raw.snapshot.files, raw.snapshot.relationships);

        let lifecycle = match raw.file_lifecycle {
            Some(recorded) => FileLifecycle {
                added: recorded.added,
                removed: recorded.removed,
                renamed: recorded.renamed.into_iter().map(Rename::from).collect(),
            },
            None => {
                let before = points
                    .last()
                    .map(|p| p.snapshot.node_ids())
                    .unwrap_or_default();
                let diff = LifecycleDiff::between(&before, &snapshot.node_ids(), &[]);
                FileLifecycle {
                    added: diff.added,
                    removed: diff.removed,
                    renamed: Vec::new(),
                }
            }
        };

        points.push(TimelinePoint {
            commit_id: raw.commit_id,
            timestamp: raw.date.or(state.timestamp).unwrap_or_default(),
            message: raw.message.or(state.message).unwrap_or_default(),
            author: raw.author.or(state.author),
            lifecycle,
            snapshot,
        });
    }

    let out_of_order = points
        .windows(2)
        .filter(|w| match (w[0].committed_at(), w[1].committed_at()) {
            (Some(a), Some(b)) => b < a,
            _ => false,
        })
        .count();
    if out_of_order > 0 {
        warn!(
            "Branch {} has {} timeline point(s) out of commit order",
            name, out_of_order
        );
    }

    Branch {
        name: name.to_string(),
        points,
    }
}

fn build_snapshot(files: Vec<RawFile>, relationships: Vec<RawRelationship>) -> Snapshot {
    let mut nodes: Vec<RepositoryNode> = Vec::with_capacity(files.len());
    let mut skipped = 0usize;

    for file in files {
        let kind = match file.kind.as_str() {
            "file" => NodeKind::File,
            "directory" => NodeKind::Directory,
            _ => {
                skipped += 1;
                continue;
            }
        };
        let path = file.path.unwrap_or_else(|| file.id.clone());
        let metrics = file.metrics.unwrap_or_default();
        let depth = file
            .depth
            .unwrap_or_else(|| u32::try_from(path.matches('/').count()).unwrap_or(u32::MAX));

        nodes.push(RepositoryNode {
            id: file.id,
            path,
            kind,
            depth,
            parent: None,
            metrics: NodeMetrics {
                size_bytes: file.size.unwrap_or(0.0),
                commit_count: metrics.commit_count.unwrap_or(0.0),
                recency_days: metrics.last_commit_days_ago.unwrap_or(0.0),
                identifier_count: metrics.top_level_identifiers.unwrap_or(0.0),
            },
        });
    }
    if skipped > 0 {
        debug!("Skipped {} entr(ies) that are neither files nor directories", skipped);
    }

    resolve_parents(&mut nodes);

    let mut edges = Vec::with_capacity(relationships.len());
    for rel in relationships {
        match RelationshipKind::from_raw(&rel.kind) {
            Some(kind) => edges.push(RelationshipEdge {
                source: rel.source,
                target: rel.target,
                kind,
                strength: rel.strength.unwrap_or(1.0),
            }),
            None => debug!("Skipping relationship of unknown type {}", rel.kind),
        }
    }

    Snapshot::new(nodes, edges)
}

/// Point every node at the directory node whose path contains it
fn resolve_parents(nodes: &mut [RepositoryNode]) {
    let directories: HashMap<String, String> = nodes
        .iter()
        .filter(|n| n.is_directory())
        .map(|n| (n.path.clone(), n.id.clone()))
        .collect();

    for node in nodes.iter_mut() {
        node.parent = node
            .path
            .rsplit_once('/')
            .and_then(|(dir, _)| directories.get(dir))
            .filter(|id| **id != node.id)
            .cloned();
    }
}
