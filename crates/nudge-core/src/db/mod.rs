//! Local cache layer for Nudge

mod connection;
mod migrations;
mod record;
mod repository;

pub use connection::Database;
pub use record::{DateObject, EntryRow};
pub use repository::{EntryRepository, LibSqlEntryRepository};
