//! Durable operation queue
//!
//! Ordered, crash-resistant log of pending [`SyncOperation`]s. Every mutation
//! rewrites the full persisted list before returning. Persistence failures are
//! logged and swallowed: the in-memory queue stays authoritative for the rest
//! of the process lifetime.

mod storage;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{NewOperation, SyncOperation};
use crate::util::now_millis;

pub use storage::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};

/// Storage key of the pending operation list.
pub const QUEUE_STORAGE_KEY: &str = "sync_queue";
/// Storage key of operations abandoned after exhausting retries.
pub const DEAD_LETTER_STORAGE_KEY: &str = "sync_dead_letter";
/// Failed attempts after which an operation is abandoned.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Default)]
struct QueueState {
    operations: Vec<SyncOperation>,
    dead_letters: Vec<SyncOperation>,
    last_enqueued_at: Option<DateTime<Utc>>,
}

pub struct OperationQueue {
    store: Arc<dyn KeyValueStore>,
    state: Mutex<QueueState>,
    length: AtomicUsize,
    processing: AtomicBool,
    max_retries: u32,
}

impl OperationQueue {
    /// Open the queue, restoring any previously persisted operations.
    ///
    /// Unreadable state is logged and replaced by an empty queue.
    pub async fn open(store: Arc<dyn KeyValueStore>, max_retries: u32) -> Self {
        let mut operations = load_list(store.as_ref(), QUEUE_STORAGE_KEY).await;
        let dead_letters = load_list(store.as_ref(), DEAD_LETTER_STORAGE_KEY).await;
        operations.sort_by_key(|op| op.enqueued_at);

        let last_enqueued_at = operations.iter().map(|op| op.enqueued_at).max();
        if !operations.is_empty() {
            tracing::info!("Restored {} pending sync operations", operations.len());
        }

        Self {
            length: AtomicUsize::new(operations.len()),
            state: Mutex::new(QueueState {
                operations,
                dead_letters,
                last_enqueued_at,
            }),
            store,
            processing: AtomicBool::new(false),
            max_retries: max_retries.max(1),
        }
    }

    /// Append an operation, assigning its id and enqueue time.
    ///
    /// Enqueue times are strictly increasing so FIFO order never depends on
    /// tie-breaking.
    pub async fn enqueue(&self, new_op: NewOperation) -> SyncOperation {
        let mut state = self.state.lock().await;

        let mut enqueued_at = now_millis();
        if let Some(last) = state.last_enqueued_at {
            if enqueued_at <= last {
                enqueued_at = last + chrono::Duration::milliseconds(1);
            }
        }
        state.last_enqueued_at = Some(enqueued_at);

        let op = SyncOperation {
            id: Uuid::now_v7().to_string(),
            kind: new_op.kind,
            collection: new_op.collection,
            payload: new_op.payload,
            enqueued_at,
            retry_count: 0,
            owner_id: new_op.owner_id,
        };
        state.operations.push(op.clone());
        self.length.store(state.operations.len(), Ordering::SeqCst);
        tracing::debug!(
            "Enqueued {} {} operation {}",
            op.kind,
            op.collection,
            op.id
        );

        self.persist(QUEUE_STORAGE_KEY, &state.operations).await;
        op
    }

    /// Snapshot of all pending operations, oldest first.
    pub async fn all_operations(&self) -> Vec<SyncOperation> {
        let state = self.state.lock().await;
        let mut operations = state.operations.clone();
        operations.sort_by_key(|op| op.enqueued_at);
        operations
    }

    /// Remove an operation by id. Returns whether it was present.
    pub async fn remove(&self, id: &str) -> bool {
        let mut state = self.state.lock().await;
        let before = state.operations.len();
        state.operations.retain(|op| op.id != id);
        if state.operations.len() == before {
            return false;
        }

        self.length.store(state.operations.len(), Ordering::SeqCst);
        self.persist(QUEUE_STORAGE_KEY, &state.operations).await;
        true
    }

    /// Record a failed attempt.
    ///
    /// Returns `false` when the operation must not be retried again: it hit
    /// the retry ceiling (and was moved to the dead-letter list) or it is no
    /// longer queued.
    pub async fn increment_retry(&self, id: &str) -> bool {
        let mut state = self.state.lock().await;
        let Some(index) = state.operations.iter().position(|op| op.id == id) else {
            return false;
        };

        state.operations[index].retry_count += 1;
        if state.operations[index].retry_count < self.max_retries {
            self.persist(QUEUE_STORAGE_KEY, &state.operations).await;
            return true;
        }

        let abandoned = state.operations.remove(index);
        tracing::warn!(
            "Abandoning {} {} operation {} after {} failed attempts",
            abandoned.kind,
            abandoned.collection,
            abandoned.id,
            abandoned.retry_count
        );
        state.dead_letters.push(abandoned);
        self.length.store(state.operations.len(), Ordering::SeqCst);

        self.persist(QUEUE_STORAGE_KEY, &state.operations).await;
        self.persist(DEAD_LETTER_STORAGE_KEY, &state.dead_letters)
            .await;
        false
    }

    /// Operations abandoned after exhausting their retries.
    pub async fn dead_letters(&self) -> Vec<SyncOperation> {
        self.state.lock().await.dead_letters.clone()
    }

    /// Drop the dead-letter list, returning what it held.
    pub async fn clear_dead_letters(&self) -> Vec<SyncOperation> {
        let mut state = self.state.lock().await;
        let cleared = std::mem::take(&mut state.dead_letters);
        if !cleared.is_empty() {
            self.persist(DEAD_LETTER_STORAGE_KEY, &state.dead_letters)
                .await;
        }
        cleared
    }

    pub fn len(&self) -> usize {
        self.length.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether a flush is currently draining this queue.
    ///
    /// Informational only; exclusivity is enforced by the sync engine.
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    pub fn set_processing(&self, processing: bool) {
        self.processing.store(processing, Ordering::SeqCst);
    }

    async fn persist(&self, key: &str, operations: &[SyncOperation]) {
        let payload = match serde_json::to_string(operations) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::error!("Failed to serialize {key}: {error}; keeping it in memory only");
                return;
            }
        };

        if let Err(error) = self.store.save(key, &payload).await {
            tracing::error!("Failed to persist {key}: {error}; keeping it in memory only");
        }
    }
}

async fn load_list(store: &dyn KeyValueStore, key: &str) -> Vec<SyncOperation> {
    let raw = match store.load(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(error) => {
            tracing::error!("Failed to load {key}: {error}; starting empty");
            return Vec::new();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(operations) => operations,
        Err(error) => {
            tracing::error!("Persisted {key} is unreadable: {error}; starting empty");
            Vec::new()
        }
    }
}
