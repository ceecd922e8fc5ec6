//! Entry model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::remote::{RecordId, RemoteRecord};
use crate::util::unix_millis_now;

/// Remote record field names. These are the de facto schema contract with
/// existing stored data and must be preserved verbatim.
pub mod fields {
    /// Client-generated join key between the cache and the remote store
    pub const LOCAL_ID: &str = "localId";
    /// Saved link (required)
    pub const URL: &str = "url";
    /// Optional short title
    pub const TITLE: &str = "title";
    /// Optional free-form description
    pub const DESCRIPTION: &str = "description";
    /// Date-based reminder timestamp (Unix ms)
    pub const DATE_REMINDER: &str = "dateReminder";
    /// Location-based reminder coordinates
    pub const LOCATION_REMINDER: &str = "locationReminder";
    /// Soft-archive timestamp (Unix ms)
    pub const ARCHIVED_AT: &str = "archivedAt";
}

/// One day in milliseconds, used for the expired-reminder fallback
const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Client-generated stable identifier, unique across the local cache and the
/// remote store, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalId(Uuid);

impl LocalId {
    /// Create a new unique local ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for LocalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LocalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A latitude/longitude pair for location reminders
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

/// The two mutually exclusive reminder kinds an entry can carry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Reminder {
    /// Remind at a point in time (Unix ms)
    Date(i64),
    /// Remind when arriving at a place
    Location(GeoPoint),
}

/// A saved link with an optional reminder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Remote record identifier, present only once a remote record exists
    pub id: Option<RecordId>,
    /// Stable join key across the cache and the remote store
    pub local_id: LocalId,
    /// Saved link
    pub url: String,
    /// Optional short title
    pub title: Option<String>,
    /// Optional free-form description
    pub description: Option<String>,
    /// Raw date-reminder storage (Unix ms); read through [`Entry::reminder`]
    pub date_reminder: Option<i64>,
    /// Raw location-reminder storage; read through [`Entry::reminder`]
    pub location_reminder: Option<GeoPoint>,
    /// Server-assigned creation timestamp (Unix ms)
    pub created_at: Option<i64>,
    /// Server-assigned modification timestamp (Unix ms)
    pub updated_at: Option<i64>,
    /// Soft-archive timestamp (Unix ms); `None` means active
    pub archived_at: Option<i64>,
}

impl Entry {
    /// Create a fresh local-only entry for the given URL
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: None,
            local_id: LocalId::new(),
            url: url.into(),
            title: None,
            description: None,
            date_reminder: None,
            location_reminder: None,
            created_at: None,
            updated_at: None,
            archived_at: None,
        }
    }

    /// The active reminder, checking the date field first, then the location
    /// field.
    ///
    /// When neither is set this returns a date reminder already 24 hours in
    /// the past. Callers must treat that value as "no active reminder" even
    /// though it is a legitimate `Date` variant.
    #[must_use]
    pub fn reminder(&self) -> Reminder {
        if let Some(date) = self.date_reminder {
            return Reminder::Date(date);
        }

        if let Some(location) = self.location_reminder {
            return Reminder::Location(location);
        }

        Reminder::Date(unix_millis_now() - DAY_MS)
    }

    /// Set the active reminder, clearing the inactive variant's storage so a
    /// record cannot carry stale data for both kinds at once
    pub fn set_reminder(&mut self, reminder: Reminder) {
        match reminder {
            Reminder::Date(date) => {
                self.date_reminder = Some(date);
                self.location_reminder = None;
            }
            Reminder::Location(location) => {
                self.location_reminder = Some(location);
                self.date_reminder = None;
            }
        }
    }

    /// Copy the client-mutable fields from `other` onto this entry.
    ///
    /// Identity (`id`, `local_id`) and server timestamps are left untouched.
    pub fn copy_mutable_from(&mut self, other: &Self) {
        self.url.clone_from(&other.url);
        self.title.clone_from(&other.title);
        self.description.clone_from(&other.description);
        self.set_reminder(other.reminder());
        self.archived_at = other.archived_at;
    }

    /// Serialize this entry's raw storage into a remote field payload.
    ///
    /// Absent optional fields are omitted; the reminder fallback is not
    /// applied here.
    #[must_use]
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(
            fields::LOCAL_ID.to_string(),
            Value::from(self.local_id.as_str()),
        );
        map.insert(fields::URL.to_string(), Value::from(self.url.clone()));

        if let Some(title) = &self.title {
            map.insert(fields::TITLE.to_string(), Value::from(title.clone()));
        }
        if let Some(description) = &self.description {
            map.insert(
                fields::DESCRIPTION.to_string(),
                Value::from(description.clone()),
            );
        }
        if let Some(date) = self.date_reminder {
            map.insert(fields::DATE_REMINDER.to_string(), Value::from(date));
        }
        if let Some(location) = &self.location_reminder {
            map.insert(
                fields::LOCATION_REMINDER.to_string(),
                json!({ "latitude": location.latitude, "longitude": location.longitude }),
            );
        }
        if let Some(archived_at) = self.archived_at {
            map.insert(fields::ARCHIVED_AT.to_string(), Value::from(archived_at));
        }

        map
    }

    /// Build the remote record for this entry, reusing its record identifier
    /// when one exists and proposing a fresh one otherwise
    #[must_use]
    pub fn to_record(&self) -> RemoteRecord {
        let id = self.id.clone().unwrap_or_default();
        let mut record = RemoteRecord::with_id(id, self.to_fields());
        record.created_at = self.created_at;
        record.updated_at = self.updated_at;
        record
    }

    /// Reconstruct an entry from a remote record.
    ///
    /// `url` is required. A record without a `localId` previously existed
    /// only in remote form; materializing it locally assigns a fresh local
    /// identifier, which becomes persistent on both sides from then on.
    pub fn from_record(record: &RemoteRecord) -> Result<Self> {
        let url = record
            .field(fields::URL)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::InvalidRecord(format!(
                    "record {} is missing required field '{}'",
                    record.id,
                    fields::URL
                ))
            })?
            .to_string();

        let local_id = match record.field(fields::LOCAL_ID) {
            Some(value) => value
                .as_str()
                .and_then(|raw| raw.parse().ok())
                .ok_or_else(|| {
                    Error::InvalidRecord(format!("record {} has a malformed localId", record.id))
                })?,
            None => LocalId::new(),
        };

        let location_reminder = match record.field(fields::LOCATION_REMINDER) {
            Some(value) => Some(
                serde_json::from_value::<GeoPoint>(value.clone()).map_err(|error| {
                    Error::InvalidRecord(format!(
                        "record {} has a malformed locationReminder: {error}",
                        record.id
                    ))
                })?,
            ),
            None => None,
        };

        Ok(Self {
            id: Some(record.id.clone()),
            local_id,
            url,
            title: record
                .field(fields::TITLE)
                .and_then(Value::as_str)
                .map(ToString::to_string),
            description: record
                .field(fields::DESCRIPTION)
                .and_then(Value::as_str)
                .map(ToString::to_string),
            date_reminder: record.field(fields::DATE_REMINDER).and_then(Value::as_i64),
            location_reminder,
            created_at: record.created_at,
            updated_at: record.updated_at,
            archived_at: record.field(fields::ARCHIVED_AT).and_then(Value::as_i64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_local_id_unique() {
        assert_ne!(LocalId::new(), LocalId::new());
    }

    #[test]
    fn test_local_id_parse() {
        let id = LocalId::new();
        let parsed: LocalId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_new_entry_has_no_remote_identity() {
        let entry = Entry::new("https://example.com");
        assert!(entry.id.is_none());
        assert!(entry.created_at.is_none());
        assert!(entry.updated_at.is_none());
    }

    #[test]
    fn test_reminder_prefers_date_field() {
        let mut entry = Entry::new("https://example.com");
        entry.date_reminder = Some(1000);
        entry.location_reminder = Some(GeoPoint {
            latitude: 1.0,
            longitude: 2.0,
        });

        assert_eq!(entry.reminder(), Reminder::Date(1000));
    }

    #[test]
    fn test_reminder_falls_back_to_location_field() {
        let mut entry = Entry::new("https://example.com");
        entry.location_reminder = Some(GeoPoint {
            latitude: 1.0,
            longitude: 2.0,
        });

        match entry.reminder() {
            Reminder::Location(location) => {
                assert_eq!(location.latitude, 1.0);
                assert_eq!(location.longitude, 2.0);
            }
            Reminder::Date(_) => panic!("expected a location reminder"),
        }
    }

    #[test]
    fn test_reminder_default_is_already_expired() {
        let entry = Entry::new("https://example.com");

        match entry.reminder() {
            Reminder::Date(date) => assert!(date < unix_millis_now()),
            Reminder::Location(_) => panic!("expected the expired-date fallback"),
        }
    }

    #[test]
    fn test_set_reminder_clears_inactive_variant() {
        let mut entry = Entry::new("https://example.com");
        entry.set_reminder(Reminder::Date(1000));
        entry.set_reminder(Reminder::Location(GeoPoint {
            latitude: 3.0,
            longitude: 4.0,
        }));
        assert!(entry.date_reminder.is_none());

        entry.set_reminder(Reminder::Date(2000));
        assert!(entry.location_reminder.is_none());
        assert_eq!(entry.date_reminder, Some(2000));
    }

    #[test]
    fn test_to_fields_omits_absent_optionals() {
        let entry = Entry::new("https://example.com");
        let map = entry.to_fields();

        assert!(map.contains_key(fields::LOCAL_ID));
        assert!(map.contains_key(fields::URL));
        assert!(!map.contains_key(fields::TITLE));
        assert!(!map.contains_key(fields::DESCRIPTION));
        assert!(!map.contains_key(fields::DATE_REMINDER));
        assert!(!map.contains_key(fields::LOCATION_REMINDER));
        assert!(!map.contains_key(fields::ARCHIVED_AT));
    }

    #[test]
    fn test_record_roundtrip_with_date_reminder() {
        let mut entry = Entry::new("https://example.com/article");
        entry.title = Some("Read later".to_string());
        entry.description = Some("Long read".to_string());
        entry.set_reminder(Reminder::Date(42_000));
        entry.archived_at = Some(99_000);

        let record = entry.to_record();
        let restored = Entry::from_record(&record).unwrap();

        assert_eq!(restored.local_id, entry.local_id);
        assert_eq!(restored.url, entry.url);
        assert_eq!(restored.title, entry.title);
        assert_eq!(restored.description, entry.description);
        assert_eq!(restored.reminder(), Reminder::Date(42_000));
        assert_eq!(restored.archived_at, entry.archived_at);
        assert_eq!(restored.id, Some(record.id));
    }

    #[test]
    fn test_record_roundtrip_with_location_reminder() {
        let mut entry = Entry::new("https://example.com/shop");
        entry.set_reminder(Reminder::Location(GeoPoint {
            latitude: 52.52,
            longitude: 13.405,
        }));

        let record = entry.to_record();
        let restored = Entry::from_record(&record).unwrap();

        match restored.reminder() {
            Reminder::Location(location) => {
                assert_eq!(location.latitude, 52.52);
                assert_eq!(location.longitude, 13.405);
            }
            Reminder::Date(_) => panic!("expected a location reminder"),
        }
    }

    #[test]
    fn test_from_record_requires_url() {
        let mut entry = Entry::new("https://example.com");
        entry.set_reminder(Reminder::Date(1));
        let mut record = entry.to_record();
        record.fields.remove(fields::URL);

        let error = Entry::from_record(&record).unwrap_err();
        assert!(matches!(error, crate::Error::InvalidRecord(_)));
    }

    #[test]
    fn test_from_record_materializes_missing_local_id() {
        let entry = Entry::new("https://example.com");
        let mut record = entry.to_record();
        record.fields.remove(fields::LOCAL_ID);

        let restored = Entry::from_record(&record).unwrap();
        assert_ne!(restored.local_id, entry.local_id);
    }

    #[test]
    fn test_from_record_rejects_malformed_local_id() {
        let entry = Entry::new("https://example.com");
        let mut record = entry.to_record();
        record
            .fields
            .insert(fields::LOCAL_ID.to_string(), Value::from("not-a-uuid"));

        let error = Entry::from_record(&record).unwrap_err();
        assert!(matches!(error, crate::Error::InvalidRecord(_)));
    }

    #[test]
    fn test_copy_mutable_preserves_identity() {
        let mut target = Entry::new("https://example.com/old");
        target.id = Some(RecordId::from("remote-1"));
        let target_local_id = target.local_id;
        target.created_at = Some(10);
        target.updated_at = Some(20);

        let mut source = Entry::new("https://example.com/new");
        source.title = Some("New title".to_string());
        source.set_reminder(Reminder::Date(5000));
        source.archived_at = Some(7000);

        target.copy_mutable_from(&source);

        assert_eq!(target.url, "https://example.com/new");
        assert_eq!(target.title, Some("New title".to_string()));
        assert_eq!(target.reminder(), Reminder::Date(5000));
        assert_eq!(target.archived_at, Some(7000));
        assert_eq!(target.local_id, target_local_id);
        assert_eq!(target.id, Some(RecordId::from("remote-1")));
        assert_eq!(target.created_at, Some(10));
    }
}
