//! Sync orchestrator
//!
//! [`SyncEngine`] owns the operation queue and the connectivity monitor. It
//! replays queued mutations against the remote store (`process_queue`), merges
//! remote records into the local store (`sync_from_cloud`) and publishes a
//! [`SyncStatus`] on every state change.
//!
//! Only one flush pass runs at a time. Every trigger (reconnect, timer,
//! visibility, focus, startup, enqueue, manual) goes through the same guard;
//! the losers return without doing anything.

mod flush;
mod pull;
mod status;
mod triggers;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::local::LocalStore;
use crate::models::{NewOperation, SyncOperation, SyncStatus};
use crate::observer::Subscription;
use crate::queue::{KeyValueStore, OperationQueue};
use crate::remote::RemoteStore;

pub use flush::FlushReport;
pub use pull::PullReport;
use triggers::Trigger;

use status::StatusPublisher;

/// Outcome of a successful [`SyncEngine::manual_sync`].
#[derive(Debug, Default)]
pub struct ManualSyncReport {
    pub pulled: PullReport,
    /// `None` when another flush was already running.
    pub flushed: Option<FlushReport>,
}

/// Handle to the sync orchestrator. Cheap to clone.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: SyncConfig,
    queue: OperationQueue,
    monitor: Arc<ConnectivityMonitor>,
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    identity: Arc<dyn Identity>,
    in_progress: AtomicBool,
    last_sync_time: Mutex<Option<DateTime<Utc>>>,
    last_error: Mutex<Option<String>>,
    status: StatusPublisher,
    connectivity: Mutex<Option<Subscription>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    runtime: Handle,
    started: AtomicBool,
    shut_down: AtomicBool,
}

impl SyncEngine {
    /// Build an engine, restoring the persisted queue from `queue_store`.
    ///
    /// Must be called inside a tokio runtime. Reconnect and enqueue flushes
    /// are live immediately when `eager_triggers` is set; every other
    /// automatic trigger waits for [`SyncEngine::start`].
    pub async fn new(
        config: SyncConfig,
        monitor: Arc<ConnectivityMonitor>,
        queue_store: Arc<dyn KeyValueStore>,
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        identity: Arc<dyn Identity>,
    ) -> Self {
        let queue = OperationQueue::open(queue_store, config.max_retries).await;
        let initial = SyncStatus {
            is_online: monitor.is_online(),
            queue_length: queue.len(),
            ..SyncStatus::default()
        };

        let inner = Arc::new(EngineInner {
            config,
            queue,
            monitor,
            local,
            remote,
            identity,
            in_progress: AtomicBool::new(false),
            last_sync_time: Mutex::new(None),
            last_error: Mutex::new(None),
            status: StatusPublisher::new(initial),
            connectivity: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            runtime: Handle::current(),
            started: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        });

        let weak: Weak<EngineInner> = Arc::downgrade(&inner);
        let subscription = inner.monitor.subscribe(move |online| {
            let Some(engine) = weak.upgrade() else {
                return;
            };
            engine.publish_status();
            if online {
                engine.spawn_trigger(Trigger::Reconnect);
            }
        });
        *lock(&inner.connectivity) = Some(subscription);

        Self { inner }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.inner.monitor
    }

    /// Synchronous status snapshot.
    pub fn status(&self) -> SyncStatus {
        self.inner.snapshot()
    }

    /// Register a status listener, invoked on every published change.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        self.inner.status.subscribe(listener)
    }

    /// Latest published status as a `watch` channel.
    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.watch()
    }

    pub fn is_syncing(&self) -> bool {
        self.inner.is_syncing()
    }

    /// Queue a mutation for the signed-in user.
    ///
    /// Returns once the operation is persisted. When online and idle, a flush
    /// is kicked off in the background.
    pub async fn queue_operation(&self, operation: NewOperation) -> Result<SyncOperation> {
        let user_id = self.inner.require_user()?;
        if operation.owner_id != user_id {
            return Err(Error::InvalidInput(format!(
                "operation owner {} is not the signed-in user",
                operation.owner_id
            )));
        }

        let queued = self.inner.queue.enqueue(operation).await;
        self.inner.publish_status();

        if self.inner.monitor.is_online() && !self.inner.is_syncing() {
            self.inner.spawn_trigger(Trigger::Enqueue);
        }
        Ok(queued)
    }

    /// Flush the queue once. `None` when skipped (offline or already syncing).
    pub async fn process_queue(&self) -> Option<FlushReport> {
        self.inner.process_queue().await
    }

    /// Pull every configured collection and merge it into the local store.
    pub async fn sync_from_cloud(&self) -> Result<PullReport> {
        self.inner.sync_from_cloud().await
    }

    /// User-initiated pull-then-flush for `owner_id`.
    ///
    /// Both steps run even if the pull fails; the first error is returned and
    /// shown in the published status.
    pub async fn manual_sync(&self, owner_id: &str) -> Result<ManualSyncReport> {
        let user_id = self.inner.require_user()?;
        if user_id != owner_id {
            return Err(Error::Unauthenticated);
        }
        if !self.inner.monitor.is_online() {
            return Err(Error::Offline);
        }

        tracing::info!("Manual sync requested");
        let pulled = self.inner.sync_from_cloud().await;
        let mut flushed = self.inner.process_queue().await;

        let pulled = match pulled {
            Ok(report) => report,
            Err(error) => return Err(self.inner.manual_failure(error)),
        };
        if let Some(error) = flushed.as_mut().and_then(FlushReport::take_error) {
            return Err(self.inner.manual_failure(error));
        }

        Ok(ManualSyncReport { pulled, flushed })
    }

    /// Pending operations, oldest first.
    pub async fn pending_operations(&self) -> Vec<SyncOperation> {
        self.inner.queue.all_operations().await
    }

    /// Operations abandoned after exhausting their retries.
    pub async fn dead_letters(&self) -> Vec<SyncOperation> {
        self.inner.queue.dead_letters().await
    }

    pub async fn clear_dead_letters(&self) -> Vec<SyncOperation> {
        self.inner.queue.clear_dead_letters().await
    }
}

impl EngineInner {
    fn snapshot(&self) -> SyncStatus {
        SyncStatus {
            is_online: self.monitor.is_online(),
            is_syncing: self.is_syncing(),
            last_sync_time: *lock(&self.last_sync_time),
            queue_length: self.queue.len(),
            error: lock(&self.last_error).clone(),
        }
    }

    fn publish_status(&self) {
        self.status.publish(self.snapshot());
    }

    fn is_syncing(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    fn set_error(&self, error: Option<String>) {
        *lock(&self.last_error) = error;
        self.publish_status();
    }

    fn manual_failure(&self, error: Error) -> Error {
        tracing::error!("Manual sync failed: {error}");
        self.set_error(Some(error.to_string()));
        error
    }

    fn require_user(&self) -> Result<String> {
        self.identity
            .current_user_id()
            .ok_or(Error::Unauthenticated)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

