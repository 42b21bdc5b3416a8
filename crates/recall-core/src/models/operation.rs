//! Queued mutation intents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Unique identifier for a queued operation.
pub type OperationId = String;

/// What a queued operation does to its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        };
        f.write_str(label)
    }
}

/// A pending mutation waiting to reach the remote store.
///
/// Serialized in camelCase with `enqueuedAt` as an ISO-8601 string at
/// millisecond precision; this is the on-disk queue format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOperation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub collection: String,
    /// Full record snapshot for CREATE/UPDATE, record id for DELETE
    pub payload: Value,
    #[serde(with = "crate::util::iso_millis")]
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
    pub owner_id: String,
}

impl SyncOperation {
    /// Identifier of the record this operation targets.
    ///
    /// DELETE payloads are the bare id; snapshots carry it in their `id` field.
    #[must_use]
    pub fn record_id(&self) -> Option<&str> {
        match &self.payload {
            Value::String(id) => Some(id.as_str()),
            Value::Object(fields) => fields.get("id").and_then(Value::as_str),
            _ => None,
        }
    }
}

/// An operation as handed to the queue, before id/timestamp/retry assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOperation {
    pub kind: OperationKind,
    pub collection: String,
    pub payload: Value,
    pub owner_id: String,
}

impl NewOperation {
    pub fn create(collection: impl Into<String>, owner_id: impl Into<String>, record: Value) -> Self {
        Self {
            kind: OperationKind::Create,
            collection: collection.into(),
            payload: record,
            owner_id: owner_id.into(),
        }
    }

    pub fn update(collection: impl Into<String>, owner_id: impl Into<String>, record: Value) -> Self {
        Self {
            kind: OperationKind::Update,
            collection: collection.into(),
            payload: record,
            owner_id: owner_id.into(),
        }
    }

    pub fn delete(
        collection: impl Into<String>,
        owner_id: impl Into<String>,
        record_id: impl Into<String>,
    ) -> Self {
        Self {
            kind: OperationKind::Delete,
            collection: collection.into(),
            payload: Value::String(record_id.into()),
            owner_id: owner_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample(payload: Value) -> SyncOperation {
        SyncOperation {
            id: "op-1".to_string(),
            kind: OperationKind::Create,
            collection: "notes".to_string(),
            payload,
            enqueued_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
                + chrono::Duration::milliseconds(123),
            retry_count: 0,
            owner_id: "u1".to_string(),
        }
    }

    #[test]
    fn test_persisted_shape_uses_camel_case_and_iso_millis() {
        let value = serde_json::to_value(sample(json!({"id": "n1"}))).unwrap();
        assert_eq!(value["enqueuedAt"], json!("2024-05-01T12:30:00.123Z"));
        assert_eq!(value["retryCount"], json!(0));
        assert_eq!(value["ownerId"], json!("u1"));
        assert_eq!(value["kind"], json!("CREATE"));
    }

    #[test]
    fn test_enqueued_at_deserializes_as_time_value() {
        let op = sample(json!({"id": "n1"}));
        let json = serde_json::to_string(&op).unwrap();
        let parsed: SyncOperation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.enqueued_at, op.enqueued_at);
    }

    #[test]
    fn test_record_id_from_snapshot_or_bare_id() {
        assert_eq!(sample(json!({"id": "n1"})).record_id(), Some("n1"));
        assert_eq!(sample(json!("n2")).record_id(), Some("n2"));
        assert_eq!(sample(json!(42)).record_id(), None);
    }

    #[test]
    fn test_delete_payload_is_record_id() {
        let op = NewOperation::delete("notes", "u1", "n9");
        assert_eq!(op.kind, OperationKind::Delete);
        assert_eq!(op.payload, json!("n9"));
    }
}
