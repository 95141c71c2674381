// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Repograph CLI - weighted repository graphs and history replay

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use repograph::commands::{self, compose::ComposeOptions, replay::ReplayOptions};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "repograph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(short, long, env = "REPOGRAPH_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(
        long,
        env = "NO_COLOR",
        global = true,
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lay out a repository document and export one frame
    Compose {
        /// Repository document (JSON)
        document: PathBuf,

        /// Output format (json, dot)
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Run a fixed number of layout iterations instead of settling
        #[arg(long)]
        iterations: Option<usize>,

        /// Reference relationship weight (0-100)
        #[arg(long)]
        reference: Option<f64>,

        /// Filesystem relationship weight (0-100)
        #[arg(long)]
        filesystem: Option<f64>,

        /// Semantic relationship weight (0-100)
        #[arg(long)]
        semantic: Option<f64>,
    },

    /// Replay commit history and print each transition
    Replay {
        /// Repository document (JSON)
        document: PathBuf,

        /// Branch to replay
        #[arg(short, long)]
        branch: Option<String>,

        /// Playback speed multiplier (0.1-10)
        #[arg(short, long)]
        speed: Option<f64>,

        /// Print transitions as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// List branches with history
    Branches {
        /// Repository document (JSON)
        document: PathBuf,
    },

    /// Print the effective configuration
    Config {
        /// Dotted configuration key (omit to print everything)
        key: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: clap_complete::Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 if cli.quiet => tracing::Level::ERROR,
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Execute command
    match cli.command {
        Commands::Compose {
            document,
            format,
            output,
            iterations,
            reference,
            filesystem,
            semantic,
        } => {
            let config = commands::load_config(cli.config.as_deref())?;
            let options = ComposeOptions {
                format,
                output,
                iterations,
                reference,
                filesystem,
                semantic,
            };
            commands::compose::run(&document, &options, config)
        }
        Commands::Replay {
            document,
            branch,
            speed,
            json,
        } => {
            let config = commands::load_config(cli.config.as_deref())?;
            let options = ReplayOptions {
                branch,
                speed,
                json,
                no_color: cli.no_color,
            };
            commands::replay::run(&document, &options, config)
        }
        Commands::Branches { document } => commands::branches::run(&document),
        Commands::Config { key } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::config::run(&config, key.as_deref())
        }
        Commands::Completions { shell } => commands::completions::run(shell, &mut Cli::command()),
    }
}
