//! Pull-and-merge: remote records into the local store, last write wins

use crate::error::{Error, Result};
use crate::models::SyncRecord;

use super::EngineInner;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PullReport {
    /// Remote records seen
    pub fetched: usize,
    /// Remote records written locally
    pub merged: usize,
}

impl EngineInner {
    pub(super) async fn sync_from_cloud(&self) -> Result<PullReport> {
        if !self.monitor.is_online() {
            tracing::debug!("Skipping pull: offline");
            return Ok(PullReport::default());
        }
        let user_id = self.require_user()?;

        let mut report = PullReport::default();
        let mut first_error: Option<Error> = None;
        for collection in &self.config.collections {
            match self.pull_collection(&user_id, collection).await {
                Ok(pulled) => {
                    report.fetched += pulled.fetched;
                    report.merged += pulled.merged;
                }
                Err(error) => {
                    tracing::warn!("Failed to pull {collection}: {error}");
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }

        if let Some(error) = first_error {
            return Err(error);
        }
        tracing::info!(
            "Pulled {} remote records, merged {}",
            report.fetched,
            report.merged
        );
        Ok(report)
    }

    async fn pull_collection(&self, owner_id: &str, collection: &str) -> Result<PullReport> {
        let values = self
            .remote_call(self.remote.list_by_owner(collection, owner_id))
            .await?;
        let mut report = PullReport {
            fetched: values.len(),
            merged: 0,
        };

        for value in values {
            let remote = match SyncRecord::from_value(value) {
                Ok(record) => record,
                Err(error) => {
                    tracing::warn!("Skipping malformed remote {collection} record: {error}");
                    continue;
                }
            };
            if remote.owner_id != owner_id {
                tracing::warn!(
                    "Skipping remote {collection}/{} owned by {}",
                    remote.id,
                    remote.owner_id
                );
                continue;
            }

            let local = self.local.get_by_id(&remote.id, owner_id, collection).await?;
            let remote_wins = local
                .as_ref()
                .map_or(true, |local| remote.is_newer_than(local));
            if remote_wins {
                self.local.upsert(&remote, owner_id, collection).await?;
                report.merged += 1;
            }
        }

        Ok(report)
    }
}
