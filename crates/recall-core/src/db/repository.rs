//! Record repository implementation

use crate::error::{Error, Result};
use crate::models::SyncRecord;
use libsql::{params, Connection};

/// Trait for record storage operations (async)
#[allow(async_fn_in_trait)]
pub trait RecordRepository {
    /// All records of a collection owned by `owner_id`, newest first
    async fn list(&self, owner_id: &str, collection: &str) -> Result<Vec<SyncRecord>>;

    /// Get a record by ID
    async fn get(&self, id: &str, owner_id: &str, collection: &str) -> Result<Option<SyncRecord>>;

    /// Insert or replace a record, keeping its ID
    async fn upsert(&self, record: &SyncRecord, owner_id: &str, collection: &str) -> Result<()>;
}

/// libSQL implementation of `RecordRepository`
pub struct LibSqlRecordRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlRecordRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_body(body: &str) -> Result<SyncRecord> {
        Ok(serde_json::from_str(body)?)
    }
}

impl RecordRepository for LibSqlRecordRepository<'_> {
    async fn list(&self, owner_id: &str, collection: &str) -> Result<Vec<SyncRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT body FROM records
                 WHERE owner_id = ? AND collection = ?
                 ORDER BY updated_at DESC",
                [owner_id, collection],
            )
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            let body: String = row.get(0)?;
            records.push(Self::parse_body(&body)?);
        }
        Ok(records)
    }

    async fn get(&self, id: &str, owner_id: &str, collection: &str) -> Result<Option<SyncRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT body FROM records WHERE collection = ? AND id = ? AND owner_id = ?",
                [collection, id, owner_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let body: String = row.get(0)?;
                Ok(Some(Self::parse_body(&body)?))
            }
            None => Ok(None),
        }
    }

    async fn upsert(&self, record: &SyncRecord, owner_id: &str, collection: &str) -> Result<()> {
        if record.owner_id != owner_id {
            return Err(Error::InvalidInput(format!(
                "record {} belongs to {}, not {owner_id}",
                record.id, record.owner_id
            )));
        }

        let body = serde_json::to_string(record)?;
        let written = self
            .conn
            .execute(
                "INSERT INTO records (collection, id, owner_id, updated_at, is_deleted, body)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(collection, id) DO UPDATE SET
                    updated_at = excluded.updated_at,
                    is_deleted = excluded.is_deleted,
                    body = excluded.body
                 WHERE records.owner_id = excluded.owner_id",
                params![
                    collection,
                    record.id.as_str(),
                    owner_id,
                    record.updated_at.timestamp_millis(),
                    i32::from(record.is_deleted),
                    body
                ],
            )
            .await?;

        // An existing row keeps its owner; another user's id collision writes nothing
        if written == 0 {
            return Err(Error::InvalidInput(format!(
                "{collection} record {} is owned by another user",
                record.id
            )));
        }
        Ok(())
    }
}
