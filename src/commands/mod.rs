// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Command implementations

pub mod branches;
pub mod completions;
pub mod compose;
pub mod config;
pub mod replay;

use crate::config::EngineConfig;
use crate::document::RepositoryDocument;
use anyhow::{Context, Result};
use std::path::Path;

/// Load the effective configuration for a command
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    crate::config::load(path).with_context(|| match path {
        Some(p) => format!("Failed to load configuration from {}", p.display()),
        None => "Failed to load configuration".to_string(),
    })
}

/// Load a repository document for a command
pub fn load_document(path: &Path) -> Result<RepositoryDocument> {
    RepositoryDocument::load(path)
        .with_context(|| format!("Failed to load repository document {}", path.display()))
}
