// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Error types for loading documents and configuration
//!
//! Engine operations never fail; only the edges of the crate that touch the
//! filesystem or parse external input return these.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading documents or configuration
#[derive(Debug, Error)]
pub enum Error {
    /// A file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A repository document is not valid JSON for the expected shape
    #[error("failed to parse repository document: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration sources could not be merged or deserialized
    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
}

/// Result alias for this crate
pub type Result<T> = std::result::Result<T, Error>;
