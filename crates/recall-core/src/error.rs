//! Error types for recall-core

use thiserror::Error;

use crate::remote::RemoteError;

/// Result type alias using recall-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in recall-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote record store error
    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    /// No user identifier could be resolved
    #[error("Not authenticated: no current user")]
    Unauthenticated,

    /// Connectivity monitor reports offline
    #[error("Cannot sync while offline")]
    Offline,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}
