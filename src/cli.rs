//! CLI argument parsing for Tether.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tt",
    about = "A dependency-aware task tracker with an overdue sweeper",
    version = env!("GIT_DESCRIBE"),
    after_help = "Logs are written to: ~/.local/share/tether/logs/tether.log"
)]
pub struct Cli {
    /// Path to the tether store directory (default: current directory)
    #[arg(short = 'd', long, global = true)]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize a new tether store in the current directory
    Init,

    /// Add a new task
    Add {
        /// Task title
        title: String,

        /// Priority (low, medium, high)
        #[arg(short, long, default_value = "medium")]
        priority: String,

        /// Start time (RFC 3339; defaults to now)
        #[arg(short, long)]
        start: Option<String>,

        /// Due time (RFC 3339; defaults to one day after start)
        #[arg(long)]
        due: Option<String>,

        /// IDs of tasks this one depends on (comma-separated)
        #[arg(long, value_delimiter = ',')]
        depends_on: Option<Vec<String>>,

        /// Description
        #[arg(short = 'D', long)]
        description: Option<String>,
    },

    /// List tasks
    List {
        /// Filter by status (pending, in_progress, completed, overdue)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show a task by ID
    Show {
        /// Task ID
        id: String,
    },

    /// Update fields on a task
    Update {
        /// Task ID
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New description
        #[arg(short = 'D', long)]
        description: Option<String>,

        /// New status (pending, in_progress, completed, overdue)
        #[arg(long)]
        status: Option<String>,

        /// New priority (low, medium, high)
        #[arg(short, long)]
        priority: Option<String>,

        /// New start time (RFC 3339)
        #[arg(long)]
        start: Option<String>,

        /// New due time (RFC 3339)
        #[arg(long)]
        due: Option<String>,

        /// Replace the dependency list (comma-separated IDs)
        #[arg(long, value_delimiter = ',')]
        depends_on: Option<Vec<String>>,
    },

    /// Start working on a task (set status to in_progress)
    Start {
        /// Task ID
        id: String,
    },

    /// Complete a task (set status to completed)
    Done {
        /// Task ID
        id: String,
    },

    /// Remove a task
    Rm {
        /// Task ID
        id: String,
    },

    /// List tasks by priority, then ascending due time
    Priority,

    /// List tasks past their due time and not completed
    Overdue,

    /// Mark everything past due as overdue now
    Sweep,

    /// Run the daemon in foreground
    Daemon {
        /// Seconds between overdue sweeps
        #[arg(long, default_value = "3600")]
        sweep_interval: u64,
    },

    /// Stop the running daemon
    DaemonStop,

    /// Check daemon status
    DaemonStatus,
}
