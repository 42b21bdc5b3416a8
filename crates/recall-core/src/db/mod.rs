//! Database layer for Recall

mod connection;
mod migrations;
mod repository;
mod state_repository;

pub use connection::Database;
pub use repository::{LibSqlRecordRepository, RecordRepository};
pub use state_repository::{LibSqlStateRepository, StateRepository};
