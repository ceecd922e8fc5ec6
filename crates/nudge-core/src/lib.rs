//! nudge-core - Core library for Nudge
//!
//! This crate contains the entry model, the local cache layer, and the
//! synchronization manager that mirrors entries to a remote record store.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod sync;
pub mod util;

pub use config::SyncOptions;
pub use error::{Error, Result};
pub use models::{Entry, GeoPoint, LocalId, Reminder};
pub use remote::{MemoryRemoteStore, RecordZone, RemoteStore};
pub use sync::EntrySyncManager;
