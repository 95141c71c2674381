// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Replay command - plays a branch's history and prints what each commit changed

use crate::config::EngineConfig;
use crate::engine::{Engine, Transition};
use crate::timeline::{BranchSwitch, PlaybackState};
use crate::types::LifecycleDiff;
use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Style};
use std::path::Path;
use tracing::info;

/// Options of the replay command
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    /// Branch to replay instead of the default one
    pub branch: Option<String>,
    /// Speed multiplier
    pub speed: Option<f64>,
    /// Print one JSON object per transition
    pub json: bool,
    /// Disable colored output
    pub no_color: bool,
}

/// Run the replay command
pub fn run(document: &Path, options: &ReplayOptions, config: EngineConfig) -> Result<()> {
    let repository = super::load_document(document)?;
    if !repository.has_history() {
        println!("No history in {}", document.display());
        return Ok(());
    }

    let mut engine = Engine::from_document(repository, config);
    if let Some(branch) = &options.branch {
        if engine.change_branch(branch) == BranchSwitch::Unchanged {
            anyhow::bail!(
                "Unknown branch: {}. Available: {}",
                branch,
                engine.timeline().branch_names().join(", ")
            );
        }
    }
    if let Some(speed) = options.speed {
        engine.set_speed(speed);
    }

    let transitions = replay(&mut engine);
    info!(
        "Replayed {} transition(s) on {}",
        transitions.len(),
        engine.timeline().branch().unwrap_or_default()
    );

    if options.json {
        for transition in &transitions {
            let line =
                serde_json::to_string(transition).context("Failed to serialize transition")?;
            println!("{}", line);
        }
        return Ok(());
    }

    let color = !options.no_color;
    for transition in &transitions {
        let message = engine
            .timeline()
            .point(transition.index)
            .map(|p| p.message.lines().next().unwrap_or_default().to_string())
            .unwrap_or_default();
        println!(
            "{} {} {}",
            paint(&format!("[{}]", transition.index), Style::new().dimmed(), color),
            paint(short_id(&transition.commit_id), Style::new().yellow(), color),
            message
        );
        print_diff(&transition.diff, color);
    }

    Ok(())
}

/// Play from the current point to the end, one interval at a time
///
/// The first entry describes the starting point.
pub fn replay(engine: &mut Engine) -> Vec<Transition> {
    let mut transitions = Vec::new();
    if let Some(point) = engine.timeline().current() {
        transitions.push(Transition {
            index: engine.timeline().index(),
            commit_id: point.commit_id.clone(),
            diff: LifecycleDiff {
                added: point.snapshot.node_ids().into_iter().collect(),
                ..LifecycleDiff::default()
            },
        });
    }

    engine.play();
    while engine.timeline().state() == PlaybackState::Playing {
        let interval = engine.timeline().interval();
        transitions.extend(engine.advance(interval));
    }
    transitions
}

fn print_diff(diff: &LifecycleDiff, color: bool) {
    for id in &diff.added {
        println!("    {} {}", paint("+", Style::new().green(), color), id);
    }
    for id in &diff.removed {
        println!("    {} {}", paint("-", Style::new().red(), color), id);
    }
    for rename in &diff.renamed {
        println!(
            "    {} {} -> {}",
            paint("~", Style::new().cyan(), color),
            rename.from,
            rename.to
        );
    }
}

fn paint(text: &str, style: Style, color: bool) -> String {
    if color {
        text.style(style).to_string()
    } else {
        text.to_string()
    }
}

fn short_id(commit: &str) -> &str {
    commit.get(..8).unwrap_or(commit)
}
