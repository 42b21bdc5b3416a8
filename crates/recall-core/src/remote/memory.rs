//! In-memory remote store with failure and latency injection.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{validate_collection, RemoteError, RemoteResult, RemoteStore};

/// A call observed by [`MemoryRemoteStore`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Insert { collection: String, id: String },
    Update { collection: String, id: String },
    Delete { collection: String, id: String },
    List { collection: String, owner_id: String },
}

type Table = BTreeMap<String, Value>;

#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    tables: Mutex<HashMap<String, Table>>,
    calls: Mutex<Vec<RemoteCall>>,
    fail_next: AtomicUsize,
    fail_always: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl MemoryRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a record directly into a collection, bypassing call tracking.
    pub fn seed(&self, collection: &str, record: Value) {
        if let Some(id) = record.get("id").and_then(Value::as_str) {
            lock(&self.tables)
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), record.clone());
        }
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Value> {
        lock(&self.tables)
            .get(collection)
            .and_then(|table| table.get(id).cloned())
    }

    pub fn len(&self, collection: &str) -> usize {
        lock(&self.tables).get(collection).map_or(0, BTreeMap::len)
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        lock(&self.calls).clone()
    }

    /// Number of insert/update/delete calls seen so far.
    pub fn write_calls(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| !matches!(call, RemoteCall::List { .. }))
            .count()
    }

    /// Fail the next `count` calls with [`RemoteError::Unavailable`].
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Fail every call until switched off.
    pub fn set_fail_always(&self, fail: bool) {
        self.fail_always.store(fail, Ordering::SeqCst);
    }

    /// Delay every call, e.g. to hold a flush open or trip a timeout.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.latency) = latency;
    }

    async fn begin(&self, call: RemoteCall) -> RemoteResult<()> {
        lock(&self.calls).push(call);

        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.fail_always.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("simulated outage".to_string()));
        }
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        if injected {
            return Err(RemoteError::Unavailable("simulated failure".to_string()));
        }
        Ok(())
    }
}

fn owned_by(record: &Value, owner_id: &str) -> bool {
    record.get("owner_id").and_then(Value::as_str) == Some(owner_id)
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn insert(&self, collection: &str, owner_id: &str, record: &Value) -> RemoteResult<()> {
        validate_collection(collection)?;
        let id = record
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| RemoteError::InvalidPayload("record has no id".to_string()))?
            .to_string();
        self.begin(RemoteCall::Insert {
            collection: collection.to_string(),
            id: id.clone(),
        })
        .await?;

        let mut record = record.clone();
        if let Value::Object(fields) = &mut record {
            fields
                .entry("owner_id")
                .or_insert_with(|| Value::String(owner_id.to_string()));
        }
        if !owned_by(&record, owner_id) {
            return Err(RemoteError::Api {
                status: 403,
                message: "owner mismatch".to_string(),
            });
        }

        lock(&self.tables)
            .entry(collection.to_string())
            .or_default()
            .insert(id, record);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        owner_id: &str,
        id: &str,
        fields: &Value,
    ) -> RemoteResult<()> {
        validate_collection(collection)?;
        self.begin(RemoteCall::Update {
            collection: collection.to_string(),
            id: id.to_string(),
        })
        .await?;

        let mut tables = lock(&self.tables);
        let existing = tables
            .get_mut(collection)
            .and_then(|table| table.get_mut(id))
            .filter(|record| owned_by(record, owner_id))
            .ok_or(RemoteError::NotFound)?;

        match (existing, fields) {
            (Value::Object(existing), Value::Object(fields)) => {
                for (key, value) in fields {
                    if key != "owner_id" {
                        existing.insert(key.clone(), value.clone());
                    }
                }
                Ok(())
            }
            _ => Err(RemoteError::InvalidPayload(
                "update fields must be a JSON object".to_string(),
            )),
        }
    }

    async fn delete(&self, collection: &str, owner_id: &str, id: &str) -> RemoteResult<()> {
        validate_collection(collection)?;
        self.begin(RemoteCall::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        })
        .await?;

        let mut tables = lock(&self.tables);
        let table = tables.get_mut(collection).ok_or(RemoteError::NotFound)?;
        if !table.get(id).is_some_and(|record| owned_by(record, owner_id)) {
            return Err(RemoteError::NotFound);
        }
        table.remove(id);
        Ok(())
    }

    async fn list_by_owner(&self, collection: &str, owner_id: &str) -> RemoteResult<Vec<Value>> {
        validate_collection(collection)?;
        self.begin(RemoteCall::List {
            collection: collection.to_string(),
            owner_id: owner_id.to_string(),
        })
        .await?;

        Ok(lock(&self.tables)
            .get(collection)
            .map(|table| {
                table
                    .values()
                    .filter(|record| owned_by(record, owner_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_is_an_upsert() {
        let remote = MemoryRemoteStore::new();
        remote
            .insert("notes", "u1", &json!({"id": "n1", "content": "a"}))
            .await
            .unwrap();
        remote
            .insert("notes", "u1", &json!({"id": "n1", "content": "b"}))
            .await
            .unwrap();

        assert_eq!(remote.len("notes"), 1);
        assert_eq!(remote.get("notes", "n1").unwrap()["content"], json!("b"));
        assert_eq!(remote.get("notes", "n1").unwrap()["owner_id"], json!("u1"));
    }

    #[tokio::test]
    async fn test_update_and_delete_are_owner_scoped() {
        let remote = MemoryRemoteStore::new();
        remote.seed("notes", json!({"id": "n1", "owner_id": "u2"}));

        let err = remote
            .update("notes", "u1", "n1", &json!({"content": "x"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(remote.delete("notes", "u1", "n1").await.unwrap_err().is_not_found());
        assert!(remote.get("notes", "n1").is_some());
    }

    #[tokio::test]
    async fn test_list_filters_by_owner() {
        let remote = MemoryRemoteStore::new();
        remote.seed("notes", json!({"id": "a", "owner_id": "u1"}));
        remote.seed("notes", json!({"id": "b", "owner_id": "u2"}));

        let listed = remote.list_by_owner("notes", "u1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["id"], json!("a"));
        assert!(remote.list_by_owner("notecards", "u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fail_next_counts_down() {
        let remote = MemoryRemoteStore::new();
        remote.fail_next(2);
        let record = json!({"id": "n1"});

        assert!(remote.insert("notes", "u1", &record).await.is_err());
        assert!(remote.insert("notes", "u1", &record).await.is_err());
        assert!(remote.insert("notes", "u1", &record).await.is_ok());
        assert_eq!(remote.write_calls(), 3);
    }
}
