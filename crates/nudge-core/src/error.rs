//! Error types for nudge-core

use std::collections::HashMap;

use thiserror::Error;

use crate::remote::RecordId;

/// Result type alias using nudge-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in nudge-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A remote record or cache row is missing or carries malformed
    /// required fields
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Single remote save or delete was rejected
    #[error("Remote write failed: {0}")]
    RemoteWrite(String),

    /// Some items of a remote batch were rejected. Treated as a total
    /// failure by callers; the per-item detail is kept for diagnostics.
    #[error("Remote batch partially failed: {} item(s) rejected", .failures.len())]
    RemotePartialFailure {
        /// Rejected record ids mapped to their failure messages
        failures: HashMap<RecordId, String>,
    },

    /// Incremental change feed aborted; nothing was applied
    #[error("Remote change feed failed: {0}")]
    RemoteFeed(String),
}
