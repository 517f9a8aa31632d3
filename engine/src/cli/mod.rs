//! Companion CLI over the central review store.
//!
//! This is the "external mutator" of the engine's persistence model: it
//! edits the same documents the embedded store owns, relying on the version
//! handshake to keep the two honest with each other.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "review-engine", about = "Hunk-level review state from the command line")]
pub struct Cli {
    /// Repository path (defaults to the current directory)
    #[arg(long, global = true, default_value = ".")]
    pub repo: String,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Set the active comparison (e.g. "main..HEAD" or "main..feature+")
    Compare { key: String },
    /// Show review progress for the active comparison
    Status,
    /// List saved reviews for this repository
    List,
    /// Approve hunks by id
    Approve { hunk_ids: Vec<String> },
    /// Reject hunks by id
    Reject { hunk_ids: Vec<String> },
    /// Add a pattern to the trust list
    Trust { pattern: String },
    /// Remove a pattern from the trust list
    Untrust { pattern: String },
    /// Replace the review notes
    Notes { text: String },
}

pub fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Compare { ref key } => commands::compare::run(&cli.repo, key, cli.format),
        Command::Status => commands::status::run(&cli.repo, cli.format),
        Command::List => commands::list::run(&cli.repo, cli.format),
        Command::Approve { ref hunk_ids } => {
            commands::decide::run(&cli.repo, hunk_ids, crate::review::ReviewStatus::Approved, cli.format)
        }
        Command::Reject { ref hunk_ids } => {
            commands::decide::run(&cli.repo, hunk_ids, crate::review::ReviewStatus::Rejected, cli.format)
        }
        Command::Trust { ref pattern } => commands::trust::run(&cli.repo, pattern, true, cli.format),
        Command::Untrust { ref pattern } => {
            commands::trust::run(&cli.repo, pattern, false, cli.format)
        }
        Command::Notes { ref text } => commands::notes::run(&cli.repo, text, cli.format),
    }
}
