//! Shared database service wrapper used by the engine and CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::db::{
    Database, LibSqlRecordRepository, LibSqlStateRepository, RecordRepository, StateRepository,
};
use crate::local::LocalStore;
use crate::models::SyncRecord;
use crate::queue::KeyValueStore;
use crate::Result;

/// Thread-safe service for DB and repository operations.
///
/// Serves both as the engine's [`LocalStore`] and as the [`KeyValueStore`]
/// backing the operation queue, so records and pending operations live in
/// one file.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::open(&db_path).await {
            Ok(db) => db,
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local database at {} is unreadable: {}. Starting from a fresh file.",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_file(&db_path)?;
                Database::open(&db_path).await?
            }
            Err(error) => return Err(error),
        };

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn is_corrupted_db_error(error: &crate::Error) -> bool {
        error
            .to_string()
            .to_ascii_lowercase()
            .contains("file is not a database")
    }

    fn quarantine_corrupted_db_file(db_path: &Path) -> Result<()> {
        if !db_path.exists() {
            return Ok(());
        }

        let timestamp = chrono::Utc::now().timestamp_millis();
        let file_name = db_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("recall.db");
        let backup_path = db_path.with_file_name(format!("{file_name}.corrupt-{timestamp}"));

        std::fs::rename(db_path, &backup_path)?;
        tracing::warn!(
            "Moved corrupted local DB file from {} to {}",
            db_path.display(),
            backup_path.display()
        );
        Ok(())
    }
}

#[async_trait]
impl LocalStore for DatabaseService {
    async fn get_all(&self, owner_id: &str, collection: &str) -> Result<Vec<SyncRecord>> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        repo.list(owner_id, collection).await
    }

    async fn get_by_id(
        &self,
        id: &str,
        owner_id: &str,
        collection: &str,
    ) -> Result<Option<SyncRecord>> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        repo.get(id, owner_id, collection).await
    }

    async fn upsert(&self, record: &SyncRecord, owner_id: &str, collection: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        repo.upsert(record, owner_id, collection).await
    }
}

#[async_trait]
impl KeyValueStore for DatabaseService {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.lock().await;
        let repo = LibSqlStateRepository::new(db.connection());
        repo.get(key).await
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlStateRepository::new(db.connection());
        repo.set(key, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewOperation, Note, Syncable};
    use crate::queue::{OperationQueue, DEFAULT_MAX_RETRIES};
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_records_survive_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("recall.db");
        let note = Note::new("u1", "persisted");

        {
            let service = DatabaseService::open_path(&path).await.unwrap();
            service
                .upsert(&note.to_record().unwrap(), "u1", "notes")
                .await
                .unwrap();
        }

        let service = DatabaseService::open_path(&path).await.unwrap();
        let record = service
            .get_by_id(&note.id.as_str(), "u1", "notes")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(Note::from_record(record).unwrap(), note);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_backs_the_operation_queue() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("recall.db");
        let note = Note::new("u1", "queued");

        {
            let service = Arc::new(DatabaseService::open_path(&path).await.unwrap());
            let queue = OperationQueue::open(service, DEFAULT_MAX_RETRIES).await;
            queue
                .enqueue(NewOperation::create(
                    "notes",
                    "u1",
                    serde_json::to_value(&note).unwrap(),
                ))
                .await;
        }

        let service = Arc::new(DatabaseService::open_path(&path).await.unwrap());
        let queue = OperationQueue::open(service, DEFAULT_MAX_RETRIES).await;
        let pending = queue.all_operations().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].record_id(), Some(note.id.as_str().as_str()));
    }
}
