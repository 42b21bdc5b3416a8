//! Record service: local writes that feed the sync queue.
//!
//! Every mutation lands in the local store first, then the matching operation
//! is queued with the sync engine, then a [`StoreEvent`] is broadcast. Sibling
//! stores react to each other through those events instead of calling each
//! other directly.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::local::LocalStore;
use crate::models::{NewOperation, Note, NoteId, Notecard, OperationKind, Syncable};
use crate::sync::SyncEngine;

const EVENT_CAPACITY: usize = 64;

/// A record changed in the local store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Changed {
        collection: String,
        id: String,
        kind: OperationKind,
    },
}

#[derive(Clone)]
pub struct RecordService {
    local: Arc<dyn LocalStore>,
    engine: SyncEngine,
    identity: Arc<dyn Identity>,
    events: broadcast::Sender<StoreEvent>,
}

impl RecordService {
    pub fn new(
        local: Arc<dyn LocalStore>,
        engine: SyncEngine,
        identity: Arc<dyn Identity>,
    ) -> Self {
        let (events, _receiver) = broadcast::channel(EVENT_CAPACITY);
        Self {
            local,
            engine,
            identity,
            events,
        }
    }

    pub const fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Receive every change made through this service from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Live (non-deleted) records of `T` for the signed-in user, newest first.
    pub async fn list<T: Syncable>(&self) -> Result<Vec<T>> {
        let user_id = self.require_user()?;
        let mut records = self.local.get_all(&user_id, T::COLLECTION).await?;
        records.retain(|record| !record.is_deleted);
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        records.into_iter().map(T::from_record).collect()
    }

    /// A live record by id.
    pub async fn get<T: Syncable>(&self, id: &str) -> Result<Option<T>> {
        let user_id = self.require_user()?;
        match self.local.get_by_id(id, &user_id, T::COLLECTION).await? {
            Some(record) if !record.is_deleted => Ok(Some(T::from_record(record)?)),
            _ => Ok(None),
        }
    }

    pub async fn create<T: Syncable>(&self, model: &T) -> Result<()> {
        let user_id = self.require_owner(model)?;
        let record = model.to_record()?;
        self.local.upsert(&record, &user_id, T::COLLECTION).await?;
        self.engine
            .queue_operation(NewOperation::create(
                T::COLLECTION,
                &user_id,
                record.to_value()?,
            ))
            .await?;
        self.publish::<T>(record.id, OperationKind::Create);
        Ok(())
    }

    /// Bump `updated_at` and save the whole record.
    pub async fn update<T: Syncable>(&self, model: &mut T) -> Result<()> {
        let user_id = self.require_owner(model)?;
        model.touch();
        let record = model.to_record()?;
        self.local.upsert(&record, &user_id, T::COLLECTION).await?;
        self.engine
            .queue_operation(NewOperation::update(
                T::COLLECTION,
                &user_id,
                record.to_value()?,
            ))
            .await?;
        self.publish::<T>(record.id, OperationKind::Update);
        Ok(())
    }

    /// Tombstone locally and queue a remote delete.
    pub async fn delete<T: Syncable>(&self, id: &str) -> Result<T> {
        let user_id = self.require_user()?;
        let mut model: T = self
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} {id}", T::COLLECTION)))?;

        model.mark_deleted();
        let record = model.to_record()?;
        self.local.upsert(&record, &user_id, T::COLLECTION).await?;
        self.engine
            .queue_operation(NewOperation::delete(T::COLLECTION, &user_id, id))
            .await?;
        self.publish::<T>(record.id, OperationKind::Delete);
        Ok(model)
    }

    pub async fn create_note(&self, content: &str) -> Result<Note> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::InvalidInput("note content must not be empty".to_string()));
        }
        let note = Note::new(self.require_user()?, content);
        self.create(&note).await?;
        Ok(note)
    }

    /// Create a card under an existing live note.
    pub async fn create_notecard(&self, note_id: &NoteId, front: &str, back: &str) -> Result<Notecard> {
        if front.trim().is_empty() || back.trim().is_empty() {
            return Err(Error::InvalidInput(
                "notecard front and back must not be empty".to_string(),
            ));
        }
        let user_id = self.require_user()?;
        if self.get::<Note>(&note_id.as_str()).await?.is_none() {
            return Err(Error::NotFound(format!("note {note_id}")));
        }

        let card = Notecard::new(user_id, *note_id, front.trim(), back.trim());
        self.create(&card).await?;
        Ok(card)
    }

    /// Bump the parent note of a changed notecard so it sorts and syncs as
    /// recently modified.
    async fn touch_parent_note(&self, notecard_id: &str) -> Result<()> {
        let user_id = self.require_user()?;
        let Some(record) = self
            .local
            .get_by_id(notecard_id, &user_id, Notecard::COLLECTION)
            .await?
        else {
            return Ok(());
        };
        let card = Notecard::from_record(record)?;

        let Some(mut note) = self.get::<Note>(&card.note_id.as_str()).await? else {
            return Ok(());
        };
        self.update(&mut note).await
    }

    fn publish<T: Syncable>(&self, id: String, kind: OperationKind) {
        // No receivers is fine
        let _ = self.events.send(StoreEvent::Changed {
            collection: T::COLLECTION.to_string(),
            id,
            kind,
        });
    }

    fn require_user(&self) -> Result<String> {
        self.identity
            .current_user_id()
            .ok_or(Error::Unauthenticated)
    }

    fn require_owner<T: Syncable>(&self, model: &T) -> Result<String> {
        let user_id = self.require_user()?;
        if model.owner_id() != user_id {
            return Err(Error::InvalidInput(format!(
                "{} {} belongs to another user",
                T::COLLECTION,
                model.record_id()
            )));
        }
        Ok(user_id)
    }
}

/// Keep notes fresh when their notecards change.
///
/// The task holds its own clone of `service`, so it runs until the returned
/// handle is aborted.
pub fn spawn_note_touch_on_notecard_change(service: RecordService) -> JoinHandle<()> {
    let mut events = service.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(StoreEvent::Changed { collection, id, .. })
                    if collection == Notecard::COLLECTION =>
                {
                    if let Err(error) = service.touch_parent_note(&id).await {
                        tracing::warn!("Failed to touch note for notecard {id}: {error}");
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Note touch observer lagged, skipped {skipped} events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
