use clap::{Parser, Subcommand};

/// undoai: local snapshots of AI-driven edit bursts
#[derive(Parser, Debug)]
#[command(name = "undoai", version, about = "Snapshot and restore bursts of file changes")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Watch the current directory and snapshot change bursts (runs until Ctrl-C / stop)
    Watch,
    /// Restore files from a snapshot
    Restore {
        /// Snapshot id (see `undoai list`). Without it a picker is shown.
        id: Option<String>,
        /// Use the newest non-empty snapshot
        #[arg(long, conflicts_with = "id")]
        latest: bool,
        /// Select specific files to restore
        #[arg(short, long)]
        interactive: bool,
        /// Restore specific files (comma-separated glob patterns)
        #[arg(short, long)]
        files: Option<String>,
        /// Restore files matching a glob pattern
        #[arg(short, long)]
        pattern: Option<String>,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// List snapshots, newest first
    List {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Delete one snapshot
    Delete { id: String },
    /// Show watcher state and storage info
    Status {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Stop the running watcher
    Stop,
}
