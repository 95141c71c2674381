// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Config command - prints the effective configuration

use crate::config::EngineConfig;
use anyhow::{Context, Result};

/// Print the whole configuration as TOML, or one dotted key
pub fn run(config: &EngineConfig, key: Option<&str>) -> Result<()> {
    let Some(key) = key else {
        let rendered =
            toml::to_string_pretty(config).context("Failed to render configuration as TOML")?;
        print!("{}", rendered);
        return Ok(());
    };

    let value = lookup(config, key)?;
    match value {
        toml::Value::String(s) => println!("{}", s),
        toml::Value::Table(table) => print!("{}", toml::to_string_pretty(&table)?),
        other => println!("{}", other),
    }
    Ok(())
}

/// Resolve a dotted key such as `weights.relationships.semantic`
pub fn lookup(config: &EngineConfig, key: &str) -> Result<toml::Value> {
    let root = toml::Value::try_from(config).context("Failed to convert configuration")?;

    let mut current = &root;
    for part in key.split('.') {
        current = current
            .get(part)
            .ok_or_else(|| anyhow::anyhow!("Unknown configuration key: {}", key))?;
    }
    Ok(current.clone())
}
