use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] recall_core::Error),
    #[error(transparent)]
    Remote(#[from] recall_core::remote::RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No note content provided")]
    EmptyContent,
    #[error("Record ID cannot be empty")]
    EmptyRecordId,
    #[error("No note or notecard found for id/prefix: {0}")]
    RecordNotFound(String),
    #[error("{0}")]
    AmbiguousRecordId(String),
    #[error("Could not resolve a data directory; pass --db-path or set RECALL_DB_PATH")]
    NoDataDir,
    #[error(
        "Sync is not configured. Set RECALL_REMOTE_URL and RECALL_REMOTE_API_KEY to enable it."
    )]
    SyncNotConfigured,
}
