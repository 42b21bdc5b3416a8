//! Remote record store interface
//!
//! The sync engine only ever talks to the backing store through
//! [`RemoteStore`]. Every call is scoped to a collection and an owner.

mod http;
mod memory;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use http::HttpRemoteStore;
pub use memory::{MemoryRemoteStore, RemoteCall};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote record not found")]
    NotFound,
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {message} ({status})")]
    Api { status: u16, message: String },
    #[error("Remote call timed out")]
    Timeout,
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
}

impl RemoteError {
    /// Distinguishes "record absent" from every other failure.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Insert a full record; an existing record with the same id is replaced.
    async fn insert(&self, collection: &str, owner_id: &str, record: &Value) -> RemoteResult<()>;

    /// Overwrite fields of an existing record. `NotFound` when absent.
    async fn update(
        &self,
        collection: &str,
        owner_id: &str,
        id: &str,
        fields: &Value,
    ) -> RemoteResult<()>;

    /// Delete a record. `NotFound` when absent.
    async fn delete(&self, collection: &str, owner_id: &str, id: &str) -> RemoteResult<()>;

    /// All records of `collection` owned by `owner_id`.
    async fn list_by_owner(&self, collection: &str, owner_id: &str) -> RemoteResult<Vec<Value>>;
}

/// Collection names end up in URLs and table names.
pub(crate) fn validate_collection(collection: &str) -> RemoteResult<()> {
    let valid = !collection.is_empty()
        && collection
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(RemoteError::InvalidConfiguration(format!(
            "invalid collection name: {collection:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_distinguishable() {
        assert!(RemoteError::NotFound.is_not_found());
        assert!(!RemoteError::Timeout.is_not_found());
        assert!(!RemoteError::Api {
            status: 404,
            message: "gone".to_string()
        }
        .is_not_found());
    }

    #[test]
    fn test_collection_names_are_restricted() {
        assert!(validate_collection("notes").is_ok());
        assert!(validate_collection("note_cards2").is_ok());
        assert!(validate_collection("").is_err());
        assert!(validate_collection("notes?select=*").is_err());
        assert!(validate_collection("Notes").is_err());
    }
}
