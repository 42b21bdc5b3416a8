//! Shared services used by clients.

mod database;
mod records;

pub use database::DatabaseService;
pub use records::{spawn_note_touch_on_notecard_change, RecordService, StoreEvent};
