//! Local record store seen by the sync engine

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::SyncRecord;

/// Per-user, per-collection storage of records on this device.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Every record of `collection` owned by `owner_id`, tombstones included.
    async fn get_all(&self, owner_id: &str, collection: &str) -> Result<Vec<SyncRecord>>;

    async fn get_by_id(
        &self,
        id: &str,
        owner_id: &str,
        collection: &str,
    ) -> Result<Option<SyncRecord>>;

    /// Insert or replace a record, preserving its id.
    async fn upsert(&self, record: &SyncRecord, owner_id: &str, collection: &str) -> Result<()>;
}

type CollectionKey = (String, String);

/// In-memory [`LocalStore`] for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryLocalStore {
    records: Mutex<HashMap<CollectionKey, Vec<SyncRecord>>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn get_all(&self, owner_id: &str, collection: &str) -> Result<Vec<SyncRecord>> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records
            .get(&(owner_id.to_string(), collection.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_by_id(
        &self,
        id: &str,
        owner_id: &str,
        collection: &str,
    ) -> Result<Option<SyncRecord>> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records
            .get(&(owner_id.to_string(), collection.to_string()))
            .and_then(|list| list.iter().find(|record| record.id == id))
            .cloned())
    }

    async fn upsert(&self, record: &SyncRecord, owner_id: &str, collection: &str) -> Result<()> {
        if record.owner_id != owner_id {
            return Err(Error::InvalidInput(format!(
                "record {} belongs to {}, not {owner_id}",
                record.id, record.owner_id
            )));
        }

        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let list = records
            .entry((owner_id.to_string(), collection.to_string()))
            .or_default();
        match list.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => list.push(record.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Note, Syncable};

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = MemoryLocalStore::new();
        let mut note = Note::new("u1", "first");
        store
            .upsert(&note.to_record().unwrap(), "u1", "notes")
            .await
            .unwrap();

        note.content = "second".to_string();
        store
            .upsert(&note.to_record().unwrap(), "u1", "notes")
            .await
            .unwrap();

        let all = store.get_all("u1", "notes").await.unwrap();
        assert_eq!(all.len(), 1);
        let fetched = store
            .get_by_id(&note.id.as_str(), "u1", "notes")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.fields["content"], "second");
    }

    #[tokio::test]
    async fn test_collections_and_owners_are_isolated() {
        let store = MemoryLocalStore::new();
        let note = Note::new("u1", "mine");
        store
            .upsert(&note.to_record().unwrap(), "u1", "notes")
            .await
            .unwrap();

        assert!(store.get_all("u2", "notes").await.unwrap().is_empty());
        assert!(store.get_all("u1", "notecards").await.unwrap().is_empty());
        assert!(store
            .upsert(&note.to_record().unwrap(), "u2", "notes")
            .await
            .is_err());
    }
}
