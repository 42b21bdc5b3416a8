//! Note model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::Syncable;
use crate::util::now_millis;

/// A unique identifier for a note, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteId(Uuid);

impl NoteId {
    /// Create a new unique note ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NoteId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A note in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier
    pub id: NoteId,
    /// User the note belongs to
    pub owner_id: String,
    /// Plain text content
    pub content: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp, drives last-write-wins
    pub updated_at: DateTime<Utc>,
    /// Soft delete flag for sync
    #[serde(default)]
    pub is_deleted: bool,
}

impl Note {
    /// Create a new note with the given content
    #[must_use]
    pub fn new(owner_id: impl Into<String>, content: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: NoteId::new(),
            owner_id: owner_id.into(),
            content: content.into(),
            created_at: now,
            updated_at: now,
            is_deleted: false,
        }
    }

    /// Get first line as title preview, truncated to `max_len` characters
    #[must_use]
    pub fn title_preview(&self, max_len: usize) -> String {
        self.content
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect()
    }

    /// Check if note content is empty (whitespace-only counts as empty)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

impl Syncable for Note {
    const COLLECTION: &'static str = "notes";

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
