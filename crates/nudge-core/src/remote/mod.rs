//! Remote record store interface
//!
//! The remote store is an opaque, authoritative record database: single-record
//! saves, batch modifications with per-item failure reporting, predicate
//! queries, and an incremental change feed driven by an opaque token.

mod memory;

pub use memory::MemoryRemoteStore;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::Result;

/// Identifier assigned to a record once it exists in the remote store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    /// Propose a fresh record identifier (the store honors client-proposed ids)
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string form of this identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A remote-store namespace scoping records and their change feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordZone(String);

impl RecordZone {
    /// Create a zone reference by name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the zone name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque cursor marking the last successfully-applied position in the
/// incremental change feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeToken(String);

impl ChangeToken {
    /// Wrap a raw token value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the raw token value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One record as stored remotely: an identifier, a flat field map keyed by
/// the schema contract names, and server-assigned timestamps (Unix ms)
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    /// Record identifier
    pub id: RecordId,
    /// Field payload keyed by the verbatim schema contract names
    pub fields: Map<String, Value>,
    /// Server-assigned creation timestamp, present once saved
    pub created_at: Option<i64>,
    /// Server-assigned modification timestamp, present once saved
    pub updated_at: Option<i64>,
}

impl RemoteRecord {
    /// Create an unsaved record with a fresh proposed identifier
    #[must_use]
    pub fn new(fields: Map<String, Value>) -> Self {
        Self::with_id(RecordId::new(), fields)
    }

    /// Create an unsaved record with a specific identifier
    #[must_use]
    pub fn with_id(id: RecordId, fields: Map<String, Value>) -> Self {
        Self {
            id,
            fields,
            created_at: None,
            updated_at: None,
        }
    }

    /// Look up a payload field by name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Predicate for remote record queries
#[derive(Debug, Clone, PartialEq)]
pub enum RecordPredicate {
    /// Match every record in the zone
    All,
    /// Match records whose field equals the given value
    FieldEquals {
        /// Field name from the schema contract
        field: String,
        /// Value to compare against
        value: Value,
    },
    /// Match records whose field equals any of the given values
    FieldIn {
        /// Field name from the schema contract
        field: String,
        /// Accepted values
        values: Vec<Value>,
    },
}

impl RecordPredicate {
    /// Evaluate this predicate against a record's payload
    #[must_use]
    pub fn matches(&self, record: &RemoteRecord) -> bool {
        match self {
            Self::All => true,
            Self::FieldEquals { field, value } => record.field(field) == Some(value),
            Self::FieldIn { field, values } => record
                .field(field)
                .is_some_and(|actual| values.contains(actual)),
        }
    }
}

/// Result of a completed incremental change fetch
#[derive(Debug, Clone)]
pub struct ChangeBatch {
    /// Records changed or created since the previous token
    pub changed: Vec<RemoteRecord>,
    /// Identifiers of records deleted since the previous token
    pub deleted: Vec<RecordId>,
    /// Token to resume from once this batch is fully applied
    pub token: ChangeToken,
}

/// Acknowledged items of a successful batch modification
#[derive(Debug, Clone)]
pub struct ModifiedRecords {
    /// Records saved, carrying server-assigned timestamps
    pub saved: Vec<RemoteRecord>,
    /// Record identifiers deleted
    pub deleted: Vec<RecordId>,
}

/// Capability set required from a remote record store (async)
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// Save a single record, returning it with server-assigned timestamps
    async fn save_record(&self, zone: &RecordZone, record: RemoteRecord) -> Result<RemoteRecord>;

    /// Save and delete records as a batch. A subset being rejected surfaces
    /// as [`crate::Error::RemotePartialFailure`] with the per-item detail;
    /// accepted items of a partial batch remain applied.
    async fn modify_records(
        &self,
        zone: &RecordZone,
        saves: Vec<RemoteRecord>,
        deletes: Vec<RecordId>,
    ) -> Result<ModifiedRecords>;

    /// Query records in a zone by predicate
    async fn query_records(
        &self,
        zone: &RecordZone,
        predicate: RecordPredicate,
    ) -> Result<Vec<RemoteRecord>>;

    /// Fetch changes in a zone since an opaque token (`None` means from the
    /// start), returning changed records, deleted identifiers, and the token
    /// to persist once the batch has been fully applied
    async fn fetch_changes(
        &self,
        zone: &RecordZone,
        since: Option<&ChangeToken>,
    ) -> Result<ChangeBatch>;
}
