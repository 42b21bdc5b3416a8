pub mod add;
pub mod card;
pub mod common;
pub mod delete;
pub mod list;
pub mod status;
pub mod sync;
