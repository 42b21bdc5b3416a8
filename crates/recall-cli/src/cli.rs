use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "recall")]
#[command(about = "Offline-first notes and notecards with background sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH", env = "RECALL_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// User that owns new records and whose records are synced
    #[arg(long, global = true, value_name = "ID", env = "RECALL_USER")]
    pub user: Option<String>,

    /// Quick capture: recall "my thought here"
    #[arg(trailing_var_arg = true)]
    pub note: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new note
    #[command(alias = "new")]
    Add {
        /// Note content
        content: Vec<String>,
    },
    /// Attach a review card to a note
    Card {
        /// Note ID or unique ID prefix
        note_id: String,
        /// Question side
        front: String,
        /// Answer side
        back: String,
    },
    /// List notes, newest first
    List {
        /// Number of notes to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a note or notecard
    Delete {
        /// Record ID or unique ID prefix
        id: String,
    },
    /// Show connectivity, queue and last sync
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show operations waiting to be pushed
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Pull remote changes, then push queued operations
    Sync,
    /// Show operations that ran out of retries
    DeadLetters {
        /// Drop them after printing
        #[arg(long)]
        clear: bool,
    },
}
