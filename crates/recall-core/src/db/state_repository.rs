//! Sync state repository: small key/value rows for persisted queue lists

use crate::error::Result;
use libsql::Connection;

/// Trait for sync state storage operations (async)
#[allow(async_fn_in_trait)]
pub trait StateRepository {
    /// Load the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// libSQL implementation of `StateRepository`
pub struct LibSqlStateRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlStateRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl StateRepository for LibSqlStateRepository<'_> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM sync_state WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            let value: String = row.get(0)?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO sync_state (key, value) VALUES (?, ?)",
                [key, value],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_key_is_none() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlStateRepository::new(db.connection());
        assert_eq!(repo.get("sync_queue").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_set_replaces_value() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlStateRepository::new(db.connection());

        repo.set("sync_queue", "[]").await.unwrap();
        repo.set("sync_queue", "[{}]").await.unwrap();

        assert_eq!(
            repo.get("sync_queue").await.unwrap().as_deref(),
            Some("[{}]")
        );
    }
}
