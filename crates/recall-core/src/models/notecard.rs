//! Notecard model
//!
//! A notecard is a question/answer pair derived from a note. Review scheduling
//! is owned by another subsystem; `due_at` is carried opaquely so that sync
//! never drops it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{NoteId, Syncable};
use crate::util::now_millis;

/// A unique identifier for a notecard (UUID v7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotecardId(Uuid);

impl NotecardId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for NotecardId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NotecardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NotecardId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A review card attached to a note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notecard {
    pub id: NotecardId,
    pub owner_id: String,
    /// Note this card was created from
    pub note_id: NoteId,
    pub front: String,
    pub back: String,
    /// Next review time, maintained by the scheduler
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl Notecard {
    #[must_use]
    pub fn new(
        owner_id: impl Into<String>,
        note_id: NoteId,
        front: impl Into<String>,
        back: impl Into<String>,
    ) -> Self {
        let now = now_millis();
        Self {
            id: NotecardId::new(),
            owner_id: owner_id.into(),
            note_id,
            front: front.into(),
            back: back.into(),
            due_at: None,
            created_at: now,
            updated_at: now,
            is_deleted: false,
        }
    }
}

impl Syncable for Notecard {
    const COLLECTION: &'static str = "notecards";

    fn record_id(&self) -> String {
        self.id.as_str()
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn touch(&mut self) {
        self.updated_at = now_millis();
    }

    fn mark_deleted(&mut self) {
        self.is_deleted = true;
        self.touch();
    }
}
