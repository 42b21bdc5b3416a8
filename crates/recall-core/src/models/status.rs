//! Aggregate sync status published to observers

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Unified sync state used by desktop, mobile and CLI clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Offline,
    Syncing,
    Pending,
    Synced,
    Error,
}

/// Snapshot of the sync engine, recomputed on every state change.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub is_online: bool,
    pub is_syncing: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub queue_length: usize,
    pub error: Option<String>,
}

impl SyncStatus {
    /// Collapse the snapshot into a single display state.
    #[must_use]
    pub const fn state(&self) -> SyncState {
        if !self.is_online {
            SyncState::Offline
        } else if self.is_syncing {
            SyncState::Syncing
        } else if self.error.is_some() {
            SyncState::Error
        } else if self.queue_length > 0 {
            SyncState::Pending
        } else {
            SyncState::Synced
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_wins_over_everything() {
        let status = SyncStatus {
            is_online: false,
            is_syncing: true,
            queue_length: 4,
            error: Some("boom".to_string()),
            ..SyncStatus::default()
        };
        assert_eq!(status.state(), SyncState::Offline);
    }

    #[test]
    fn test_pending_when_queue_non_empty() {
        let status = SyncStatus {
            is_online: true,
            queue_length: 2,
            ..SyncStatus::default()
        };
        assert_eq!(status.state(), SyncState::Pending);
    }

    #[test]
    fn test_synced_when_idle_and_empty() {
        let status = SyncStatus {
            is_online: true,
            ..SyncStatus::default()
        };
        assert_eq!(status.state(), SyncState::Synced);
    }
}
