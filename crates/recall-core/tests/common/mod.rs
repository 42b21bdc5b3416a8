#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use recall_core::connectivity::ConnectivityMonitor;
use recall_core::identity::SessionIdentity;
use recall_core::local::MemoryLocalStore;
use recall_core::models::{NewOperation, SyncRecord};
use recall_core::queue::MemoryKeyValueStore;
use recall_core::remote::{MemoryRemoteStore, RemoteCall};
use recall_core::{SyncConfig, SyncEngine};
use serde_json::{json, Value};

pub const USER: &str = "u1";

pub struct Harness {
    pub engine: SyncEngine,
    pub monitor: Arc<ConnectivityMonitor>,
    pub remote: Arc<MemoryRemoteStore>,
    pub local: Arc<MemoryLocalStore>,
    pub store: Arc<MemoryKeyValueStore>,
    pub identity: Arc<SessionIdentity>,
    pub config: SyncConfig,
}

impl Harness {
    /// Engine whose flushes all wait for `start()`, so explicit calls are
    /// the only passes a test sees until it opts in.
    pub async fn new(online: bool) -> Self {
        Self::with_config(online, manual_config()).await
    }

    pub async fn with_config(online: bool, config: SyncConfig) -> Self {
        let monitor = Arc::new(ConnectivityMonitor::new(Some(online)));
        let remote = Arc::new(MemoryRemoteStore::new());
        let local = Arc::new(MemoryLocalStore::new());
        let store = Arc::new(MemoryKeyValueStore::new());
        let identity = Arc::new(SessionIdentity::signed_in(USER));

        let engine = SyncEngine::new(
            config.clone(),
            monitor.clone(),
            store.clone(),
            local.clone(),
            remote.clone(),
            identity.clone(),
        )
        .await;

        Self {
            engine,
            monitor,
            remote,
            local,
            store,
            identity,
            config,
        }
    }

    /// A second engine over the same persisted queue, as after a restart.
    pub async fn restart(&self) -> SyncEngine {
        SyncEngine::new(
            self.config.clone(),
            self.monitor.clone(),
            self.store.clone(),
            self.local.clone(),
            self.remote.clone(),
            self.identity.clone(),
        )
        .await
    }

    /// Ids of inserted records, in call order.
    pub fn inserted_ids(&self) -> Vec<String> {
        self.remote
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Insert { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }
}

pub fn manual_config() -> SyncConfig {
    SyncConfig {
        eager_triggers: false,
        ..SyncConfig::default()
    }
}

pub fn note_value(id: &str, updated_at: &str, content: &str) -> Value {
    json!({
        "id": id,
        "owner_id": USER,
        "content": content,
        "created_at": "2024-01-01T00:00:00.000Z",
        "updated_at": updated_at,
    })
}

pub fn note_record(id: &str, updated_at: &str, content: &str) -> SyncRecord {
    SyncRecord::from_value(note_value(id, updated_at, content)).unwrap()
}

pub fn create_note_op(id: &str) -> NewOperation {
    NewOperation::create(
        "notes",
        USER,
        note_value(id, "2024-03-01T10:00:00.000Z", id),
    )
}

/// Poll `condition` on a 10ms cadence; panics after two seconds of clock time.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}
