//! Collection-agnostic record shape used by sync

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Abstract shape of any synced record (note, notecard, ...).
///
/// Only `id`, `owner_id`, `updated_at` and the tombstone flag are interpreted;
/// every other column travels untouched in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub id: String,
    pub owner_id: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_deleted: bool,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl SyncRecord {
    /// Parse a record from a JSON value returned by a store.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Full JSON representation of the record.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Strictly newer than `other`; ties are not newer.
    #[must_use]
    pub fn is_newer_than(&self, other: &Self) -> bool {
        self.updated_at > other.updated_at
    }
}

/// A typed model that can be expressed as a [`SyncRecord`].
pub trait Syncable: Serialize + DeserializeOwned {
    /// Logical collection name the model is stored under.
    const COLLECTION: &'static str;

    fn record_id(&self) -> String;

    fn owner_id(&self) -> &str;

    /// Bump `updated_at` to now.
    fn touch(&mut self);

    /// Turn the model into a tombstone.
    fn mark_deleted(&mut self);

    fn to_record(&self) -> Result<SyncRecord> {
        SyncRecord::from_value(serde_json::to_value(self)?)
    }

    fn from_record(record: SyncRecord) -> Result<Self> {
        let id = record.id.clone();
        serde_json::from_value(record.to_value()?).map_err(|error| {
            Error::InvalidInput(format!(
                "record {id} does not match {}: {error}",
                Self::COLLECTION
            ))
        })
    }
}
