// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Branches command - lists the timelines of a repository document

use crate::document::RepositoryDocument;
use anyhow::Result;
use std::path::Path;

/// One listed branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchSummary {
    /// Branch name
    pub name: String,
    /// Timeline points available for replay
    pub points: usize,
    /// Whether playback starts on this branch
    pub default: bool,
}

/// Branches with timelines first, then names only advertised by metadata
#[must_use]
pub fn summarize(document: &RepositoryDocument) -> Vec<BranchSummary> {
    let default = document.default_branch();
    let mut summaries: Vec<BranchSummary> = document
        .branches
        .iter()
        .map(|b| BranchSummary {
            name: b.name.clone(),
            points: b.points.len(),
            default: b.name == default,
        })
        .collect();

    for name in &document.metadata.branches {
        if !summaries.iter().any(|s| &s.name == name) {
            summaries.push(BranchSummary {
                name: name.clone(),
                points: 0,
                default: name == default,
            });
        }
    }
    summaries
}

/// Run the branches command
pub fn run(document: &Path) -> Result<()> {
    let repository = super::load_document(document)?;
    let summaries = summarize(&repository);

    if summaries.is_empty() {
        println!("No branches in {}", document.display());
        return Ok(());
    }

    if let Some(name) = &repository.metadata.repo_name {
        println!("{}:", name);
    }
    for summary in &summaries {
        let marker = if summary.default { "*" } else { " " };
        println!("{} {} ({} points)", marker, summary.name, summary.points);
    }
    Ok(())
}
