//! Data models for Recall

mod note;
mod notecard;
mod operation;
mod record;
mod status;

pub use note::{Note, NoteId};
pub use notecard::{Notecard, NotecardId};
pub use operation::{NewOperation, OperationId, OperationKind, SyncOperation};
pub use record::{SyncRecord, Syncable};
pub use status::{SyncState, SyncStatus};
