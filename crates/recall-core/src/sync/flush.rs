//! Queue flush: replay pending operations against the remote store

use std::future::Future;
use std::sync::atomic::Ordering;

use crate::error::{Error, Result};
use crate::models::{OperationKind, SyncOperation};
use crate::remote::{RemoteError, RemoteResult};
use crate::util::now_millis;

use super::{lock, EngineInner};

/// Per-pass counters.
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Applied remotely and removed from the queue
    pub applied: usize,
    /// Failed, still queued for a later pass
    pub retried: usize,
    /// Failed for the last allowed time and moved to the dead-letter list
    pub abandoned: usize,
    /// Queued by another user; left untouched
    pub skipped: usize,
    pub first_error: Option<RemoteError>,
    /// The pass stopped before replaying anything
    pub aborted: Option<Error>,
}

impl FlushReport {
    pub const fn failed(&self) -> usize {
        self.retried + self.abandoned
    }

    /// The error an active caller should see: a whole-pass failure first,
    /// otherwise the first failed operation.
    pub(super) fn take_error(&mut self) -> Option<Error> {
        self.aborted
            .take()
            .or_else(|| self.first_error.take().map(Error::from))
    }
}

/// Holds the single-flight flag for the duration of a pass.
///
/// Dropping it clears the flag and publishes status, including when the pass
/// future is aborted mid-flight.
struct FlushGuard<'a> {
    engine: &'a EngineInner,
}

impl<'a> FlushGuard<'a> {
    fn acquire(engine: &'a EngineInner) -> Option<Self> {
        engine
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        engine.queue.set_processing(true);
        Some(Self { engine })
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.engine.queue.set_processing(false);
        self.engine.in_progress.store(false, Ordering::SeqCst);
        self.engine.publish_status();
    }
}

impl EngineInner {
    pub(super) async fn process_queue(&self) -> Option<FlushReport> {
        if !self.monitor.is_online() {
            tracing::debug!("Skipping flush: offline");
            return None;
        }
        let Some(_guard) = FlushGuard::acquire(self) else {
            tracing::debug!("Skipping flush: another pass is running");
            return None;
        };
        self.publish_status();

        let report = match self.run_pass().await {
            Ok(report) => report,
            Err(error) => {
                tracing::error!("Sync pass failed: {error}");
                *lock(&self.last_error) = Some(error.to_string());
                *lock(&self.last_sync_time) = Some(now_millis());
                return Some(FlushReport {
                    aborted: Some(error),
                    ..FlushReport::default()
                });
            }
        };

        // A pass that attempted nothing leaves the previous error in place
        let attempted = report.applied + report.failed();
        if attempted > 0 {
            *lock(&self.last_error) = report.first_error.as_ref().map(|error| {
                format!("{} of {attempted} operations failed: {error}", report.failed())
            });
        }
        *lock(&self.last_sync_time) = Some(now_millis());
        Some(report)
    }

    async fn run_pass(&self) -> Result<FlushReport> {
        let user_id = self.require_user()?;
        let operations = self.queue.all_operations().await;
        let mut report = FlushReport::default();

        for operation in operations {
            if operation.owner_id != user_id {
                report.skipped += 1;
                continue;
            }

            match self.apply(&operation).await {
                Ok(()) => {
                    tracing::debug!(
                        "Applied {} {} operation {}",
                        operation.kind,
                        operation.collection,
                        operation.id
                    );
                    self.queue.remove(&operation.id).await;
                    report.applied += 1;
                }
                Err(error) => {
                    tracing::warn!(
                        "Failed to apply {} {} operation {}: {}",
                        operation.kind,
                        operation.collection,
                        operation.id,
                        error
                    );
                    if self.queue.increment_retry(&operation.id).await {
                        report.retried += 1;
                    } else {
                        report.abandoned += 1;
                    }
                    if report.first_error.is_none() {
                        report.first_error = Some(error);
                    }
                }
            }
            self.publish_status();
        }

        if report.applied + report.failed() > 0 {
            tracing::info!(
                "Sync pass finished: {} applied, {} retried, {} abandoned",
                report.applied,
                report.retried,
                report.abandoned
            );
        }
        Ok(report)
    }

    /// Apply one operation as an idempotent upsert or delete.
    async fn apply(&self, operation: &SyncOperation) -> RemoteResult<()> {
        let collection = operation.collection.as_str();
        let owner_id = operation.owner_id.as_str();

        match operation.kind {
            OperationKind::Create => {
                self.remote_call(self.remote.insert(collection, owner_id, &operation.payload))
                    .await
            }
            OperationKind::Update => {
                let id = record_id(operation)?;
                let updated = self
                    .remote_call(
                        self.remote
                            .update(collection, owner_id, id, &operation.payload),
                    )
                    .await;
                match updated {
                    Err(error) if error.is_not_found() => {
                        tracing::debug!("Remote {collection}/{id} missing; inserting instead");
                        self.remote_call(self.remote.insert(collection, owner_id, &operation.payload))
                            .await
                    }
                    result => result,
                }
            }
            OperationKind::Delete => {
                let id = record_id(operation)?;
                match self
                    .remote_call(self.remote.delete(collection, owner_id, id))
                    .await
                {
                    Err(error) if error.is_not_found() => Ok(()),
                    result => result,
                }
            }
        }
    }

    /// Bound a remote call by the configured timeout.
    pub(super) async fn remote_call<T>(
        &self,
        call: impl Future<Output = RemoteResult<T>> + Send,
    ) -> RemoteResult<T> {
        tokio::time::timeout(self.config.remote_timeout, call)
            .await
            .map_err(|_| RemoteError::Timeout)?
    }
}

fn record_id(operation: &SyncOperation) -> RemoteResult<&str> {
    operation.record_id().ok_or_else(|| {
        RemoteError::InvalidPayload(format!("operation {} has no record id", operation.id))
    })
}
