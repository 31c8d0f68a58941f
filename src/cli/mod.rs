//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Incremental Jira Cloud to SQLite mirror
#[derive(Parser, Debug)]
#[command(name = "jmirror", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.jira-mirror/data/mirror.db)
    #[arg(long, global = true, env = "JIRA_MIRROR_DB")]
    pub db: Option<PathBuf>,

    /// Config file (default: ~/.jira-mirror/config.json)
    #[arg(long, global = true, env = "JIRA_MIRROR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mirror Jira into the local database
    Sync(SyncArgs),

    /// Show mirrored tables and the last run
    Status,

    /// List recent sync runs
    Runs {
        /// Maximum runs to show
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct SyncArgs {
    /// Stop after parent issues; skip the change-history backfill
    #[arg(long)]
    pub skip_history: bool,

    /// Do not send the run notification even if enabled
    #[arg(long)]
    pub no_notify: bool,
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}
