//! recall-core - Core library for Recall
//!
//! This crate contains the shared models, the local libSQL store, and the
//! offline-first sync engine used by all Recall interfaces.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod identity;
pub mod local;
pub mod models;
pub mod observer;
pub mod queue;
pub mod remote;
pub mod services;
pub mod sync;
pub mod util;

pub use config::SyncConfig;
pub use connectivity::ConnectivityMonitor;
pub use error::{Error, Result};
pub use models::{Note, NoteId, Notecard, NotecardId, SyncOperation, SyncStatus};
pub use sync::SyncEngine;
