//! Cache record projection and its mapping to the entry model

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Entry, GeoPoint, Reminder};
use crate::remote::RecordId;
use crate::util::unix_millis_now;

/// Owned wrapped-timestamp sub-object.
///
/// Each instance is exactly one row in `date_objects`, referenced by at most
/// one cache row. The store does not cascade: whoever replaces or removes
/// the parent row must delete these first, in the same transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateObject {
    /// Sub-object row identifier
    pub id: String,
    /// Wrapped timestamp (Unix ms)
    pub date: i64,
}

impl DateObject {
    /// Wrap a timestamp in a fresh sub-object row
    #[must_use]
    pub fn new(date: i64) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            date,
        }
    }
}

/// Denormalized storage projection of an [`Entry`], one row per `localId`
#[derive(Debug, Clone, PartialEq)]
pub struct EntryRow {
    /// Primary key (= the entry's `localId`)
    pub id: String,
    /// Remote record identifier, used to match incremental-feed deletions
    pub record_id: Option<String>,
    /// Saved link
    pub url: String,
    /// Title; empty string means absent
    pub title: String,
    /// Description; empty string means absent
    pub descriptions: String,
    /// Owned date-reminder sub-object, unset for location reminders
    pub date_reminder: Option<DateObject>,
    /// Location-reminder latitude, 0.0 when the reminder is date-based
    pub latitude: f64,
    /// Location-reminder longitude, 0.0 when the reminder is date-based
    pub longitude: f64,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
    /// Owned soft-archive sub-object
    pub archived_at: Option<DateObject>,
}

impl EntryRow {
    /// Flatten an entry into its cache projection.
    ///
    /// The reminder is read through [`Entry::reminder`], so an entry without
    /// reminder data lands as the expired-date fallback. Server timestamps
    /// default to now when the entry has none yet.
    #[must_use]
    pub fn from_entry(entry: &Entry) -> Self {
        let now = unix_millis_now();
        let mut row = Self {
            id: entry.local_id.as_str(),
            record_id: entry.id.as_ref().map(|id| id.as_str().to_string()),
            url: entry.url.clone(),
            title: entry.title.clone().unwrap_or_default(),
            descriptions: entry.description.clone().unwrap_or_default(),
            date_reminder: None,
            latitude: 0.0,
            longitude: 0.0,
            created_at: entry.created_at.unwrap_or(now),
            updated_at: entry.updated_at.unwrap_or(now),
            archived_at: entry.archived_at.map(DateObject::new),
        };

        match entry.reminder() {
            Reminder::Date(date) => row.date_reminder = Some(DateObject::new(date)),
            Reminder::Location(location) => {
                row.latitude = location.latitude;
                row.longitude = location.longitude;
            }
        }

        row
    }

    /// Reconstruct the entry this row was flattened from.
    ///
    /// The date-reminder sub-object wins when present; otherwise the
    /// latitude/longitude pair becomes a location reminder even when both
    /// are the 0.0 default, which cannot be told apart from "no data".
    /// A primary key that does not parse as a local identifier means the
    /// cache row is corrupt and is reported as an error rather than being
    /// silently re-identified.
    pub fn to_entry(&self) -> Result<Entry> {
        let local_id = self
            .id
            .parse()
            .map_err(|_| Error::InvalidRecord(format!("cache row '{}' has a malformed id", self.id)))?;

        let date_reminder = self.date_reminder.as_ref().map(|object| object.date);
        let location_reminder = if date_reminder.is_none() {
            Some(GeoPoint {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        } else {
            None
        };

        Ok(Entry {
            id: self.record_id.clone().map(RecordId::from),
            local_id,
            url: self.url.clone(),
            title: (!self.title.is_empty()).then(|| self.title.clone()),
            description: (!self.descriptions.is_empty()).then(|| self.descriptions.clone()),
            date_reminder,
            location_reminder,
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
            archived_at: self.archived_at.as_ref().map(|object| object.date),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_roundtrip_date_reminder() {
        let mut entry = Entry::new("https://example.com/article");
        entry.title = Some("Read later".to_string());
        entry.description = Some("Long read".to_string());
        entry.set_reminder(Reminder::Date(42_000));
        entry.archived_at = Some(99_000);

        let restored = EntryRow::from_entry(&entry).to_entry().unwrap();

        assert_eq!(restored.local_id, entry.local_id);
        assert_eq!(restored.url, entry.url);
        assert_eq!(restored.title, entry.title);
        assert_eq!(restored.description, entry.description);
        assert_eq!(restored.reminder(), Reminder::Date(42_000));
        assert_eq!(restored.archived_at, Some(99_000));
    }

    #[test]
    fn test_roundtrip_location_reminder() {
        let mut entry = Entry::new("https://example.com/shop");
        entry.set_reminder(Reminder::Location(GeoPoint {
            latitude: 52.52,
            longitude: 13.405,
        }));

        let restored = EntryRow::from_entry(&entry).to_entry().unwrap();

        assert_eq!(
            restored.reminder(),
            Reminder::Location(GeoPoint {
                latitude: 52.52,
                longitude: 13.405,
            })
        );
        assert!(restored.date_reminder.is_none());
        assert!(restored.archived_at.is_none());
    }

    #[test]
    fn test_roundtrip_preserves_remote_identity() {
        let mut entry = Entry::new("https://example.com");
        entry.id = Some(RecordId::from("remote-1"));
        entry.set_reminder(Reminder::Date(1));
        entry.created_at = Some(10);
        entry.updated_at = Some(20);

        let restored = EntryRow::from_entry(&entry).to_entry().unwrap();

        assert_eq!(restored.id, Some(RecordId::from("remote-1")));
        assert_eq!(restored.created_at, Some(10));
        assert_eq!(restored.updated_at, Some(20));
    }

    #[test]
    fn test_empty_string_sentinels_map_back_to_none() {
        let mut entry = Entry::new("https://example.com");
        entry.set_reminder(Reminder::Date(1));
        let row = EntryRow::from_entry(&entry);

        assert_eq!(row.title, "");
        assert_eq!(row.descriptions, "");

        let restored = row.to_entry().unwrap();
        assert_eq!(restored.title, None);
        assert_eq!(restored.description, None);
    }

    #[test]
    fn test_malformed_row_id_is_an_error() {
        let mut entry = Entry::new("https://example.com");
        entry.set_reminder(Reminder::Date(1));
        let mut row = EntryRow::from_entry(&entry);
        row.id = "not-a-uuid".to_string();

        let error = row.to_entry().unwrap_err();
        assert!(matches!(error, Error::InvalidRecord(_)));
    }

    #[test]
    fn test_missing_timestamps_default_to_now() {
        let mut entry = Entry::new("https://example.com");
        entry.set_reminder(Reminder::Date(1));
        assert!(entry.created_at.is_none());

        let row = EntryRow::from_entry(&entry);
        assert!(row.created_at > 0);
        assert!(row.updated_at > 0);
    }

    #[test]
    fn test_entry_without_reminder_lands_as_expired_date() {
        let entry = Entry::new("https://example.com");
        let row = EntryRow::from_entry(&entry);

        let reminder = row.date_reminder.expect("fallback should persist a date");
        assert!(reminder.date < unix_millis_now());
        assert_eq!(row.latitude, 0.0);
        assert_eq!(row.longitude, 0.0);
    }

    #[test]
    fn test_zero_coordinates_reconstruct_as_location() {
        // Inherited ambiguity: a (0.0, 0.0) pair cannot be told apart from
        // "no data" and still comes back as a location reminder.
        let mut entry = Entry::new("https://example.com");
        entry.set_reminder(Reminder::Location(GeoPoint {
            latitude: 0.0,
            longitude: 0.0,
        }));

        let restored = EntryRow::from_entry(&entry).to_entry().unwrap();
        assert!(matches!(restored.reminder(), Reminder::Location(_)));
    }
}
