// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Compose command - lays out a repository document and exports one frame

use crate::config::{EngineConfig, FrameBudget, RelationshipWeights};
use crate::engine::Engine;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Frame as JSON
    Json,
    /// Graphviz DOT format
    Dot,
}

impl ExportFormat {
    /// Parse format from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "dot" | "graphviz" => Some(Self::Dot),
            _ => None,
        }
    }
}

/// Options of the compose command
#[derive(Debug, Clone, Default)]
pub struct ComposeOptions {
    /// Output format name
    pub format: String,
    /// Output file (stdout if not specified)
    pub output: Option<PathBuf>,
    /// Fixed iteration count instead of running to convergence
    pub iterations: Option<usize>,
    /// Reference weight override
    pub reference: Option<f64>,
    /// Filesystem weight override
    pub filesystem: Option<f64>,
    /// Semantic weight override
    pub semantic: Option<f64>,
}

impl ComposeOptions {
    fn relationship_weights(&self, base: RelationshipWeights) -> RelationshipWeights {
        RelationshipWeights::new(
            self.reference.unwrap_or(base.reference.value()),
            self.filesystem.unwrap_or(base.filesystem.value()),
            self.semantic.unwrap_or(base.semantic.value()),
        )
    }
}

/// Run the compose command
pub fn run(document: &Path, options: &ComposeOptions, config: EngineConfig) -> Result<()> {
    let format = ExportFormat::parse(&options.format).ok_or_else(|| {
        anyhow::anyhow!("Unknown export format: {}. Supported: json, dot", options.format)
    })?;

    let repository = super::load_document(document)?;
    let mut engine = Engine::from_document(repository, config);
    engine.set_relationship_weights(options.relationship_weights(config.weights.relationships));

    let frame = match options.iterations {
        Some(n) => engine.frame(&FrameBudget::iterations(n)),
        None => {
            let status = engine.settle();
            info!(
                "Layout settled after {} iteration(s), energy {:.4}",
                status.iterations, status.energy
            );
            engine.frame(&FrameBudget::iterations(0))
        }
    };

    let content = match format {
        ExportFormat::Json => {
            serde_json::to_string_pretty(&frame).context("Failed to serialize frame")? + "\n"
        }
        ExportFormat::Dot => engine.to_dot(),
    };

    match &options.output {
        Some(path) => {
            fs::write(path, &content)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
            println!(
                "Exported {} node(s) and {} edge(s) to {}",
                frame.nodes.len(),
                frame.edges.len(),
                path.display()
            );
        }
        None => print!("{}", content),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!(ExportFormat::parse("JSON"), Some(ExportFormat::Json));
        assert_eq!(ExportFormat::parse("graphviz"), Some(ExportFormat::Dot));
        assert_eq!(ExportFormat::parse("yaml"), None);
    }

    #[test]
    fn test_weight_overrides() {
        let options = ComposeOptions {
            semantic: Some(5.0),
            ..ComposeOptions::default()
        };

        let weights = options.relationship_weights(RelationshipWeights::default());

        assert_eq!(weights.reference.value(), 100.0);
        assert_eq!(weights.semantic.value(), 5.0);
    }
}
