use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Token usage and cost tracker for OpenClaw session logs.
#[derive(Debug, Parser)]
#[command(name = "token-tracker", version)]
pub struct Cli {
    /// Directory holding the tracking config and state files.
    #[arg(long, global = true, env = "TOKEN_TRACKER_HOME")]
    pub data_dir: Option<PathBuf>,

    /// OpenClaw home whose session logs are scanned.
    #[arg(long, global = true, conflicts_with = "log")]
    pub home: Option<PathBuf>,

    /// Scan these files or directories instead of an OpenClaw home.
    #[arg(long, global = true, num_args = 1..)]
    pub log: Vec<PathBuf>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Do not append a usage history line on `check`.
    #[arg(long, global = true)]
    pub no_history: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print per-model token usage and cost.
    #[command(alias = "usage")]
    Report,
    /// Scan, price and evaluate alerts, persisting milestone and reply state.
    Check,
    /// Treat text as a reply to the last limit alert.
    Respond {
        /// Reply text, e.g. `20`, `+5`, `keep`, `skip` or `disable`.
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Change the daily limit directly, whether or not an alert is pending.
    Limit {
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Show the current thresholds.
    Thresholds,
    /// Show whether a limit alert is awaiting a reply.
    Pending,
    /// Open the reply window for an alert delivered by other means.
    MarkSent,
    /// Close the reply window without changing limits.
    MarkProcessed,
    /// Forget every milestone reached so far.
    ResetMilestones,
    /// Create the data directory and a default tracking config.
    Init,
}

impl Command {
    /// Joined reply text for `respond` and `limit`.
    pub fn text(&self) -> Option<String> {
        match self {
            Command::Respond { text } | Command::Limit { text } => Some(text.join(" ")),
            _ => None,
        }
    }
}
