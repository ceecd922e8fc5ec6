//! Entry cache repository implementation

use libsql::{params, Connection, Row};

use crate::error::Result;
use crate::remote::{ChangeToken, RecordId};

use super::record::{DateObject, EntryRow};

const CHANGE_TOKEN_KEY: &str = "change_token";

const SELECT_ROW: &str = "SELECT e.id, e.record_id, e.url, e.title, e.descriptions,
        e.date_reminder_id, dr.date,
        e.latitude, e.longitude, e.created_at, e.updated_at,
        e.archived_at_id, aa.date
     FROM entries e
     LEFT JOIN date_objects dr ON dr.id = e.date_reminder_id
     LEFT JOIN date_objects aa ON aa.id = e.archived_at_id";

/// Trait for entry cache storage operations (async)
#[allow(async_fn_in_trait)]
pub trait EntryRepository {
    /// Look up a single cache row by primary key (`localId`)
    async fn get(&self, local_id: &str) -> Result<Option<EntryRow>>;

    /// Enumerate every cache row
    async fn all(&self) -> Result<Vec<EntryRow>>;

    /// Add or update a row, replacing its owned sub-objects, in one
    /// transaction
    async fn upsert(&self, row: &EntryRow) -> Result<()>;

    /// Delete a row and its owned sub-objects in one transaction
    async fn delete(&self, local_id: &str) -> Result<()>;

    /// Apply one reconciliation batch atomically: upsert every changed row
    /// and remove every row matching a deleted remote identifier
    async fn apply_changes(
        &self,
        upserts: &[EntryRow],
        deleted_record_ids: &[RecordId],
    ) -> Result<()>;

    /// Read the durable change token, if any
    async fn load_change_token(&self) -> Result<Option<ChangeToken>>;

    /// Persist the change token after a fully-applied batch
    async fn store_change_token(&self, token: &ChangeToken) -> Result<()>;
}

/// libSQL implementation of `EntryRepository`
pub struct LibSqlEntryRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlEntryRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse an entry row (with LEFT JOINed sub-objects) from a result row
    fn parse_row(row: &Row) -> Result<EntryRow> {
        let date_reminder = match (row.get::<Option<String>>(5)?, row.get::<Option<i64>>(6)?) {
            (Some(id), Some(date)) => Some(DateObject { id, date }),
            _ => None,
        };
        let archived_at = match (row.get::<Option<String>>(11)?, row.get::<Option<i64>>(12)?) {
            (Some(id), Some(date)) => Some(DateObject { id, date }),
            _ => None,
        };

        Ok(EntryRow {
            id: row.get::<String>(0)?,
            record_id: row.get::<Option<String>>(1)?,
            url: row.get::<String>(2)?,
            title: row.get::<String>(3)?,
            descriptions: row.get::<String>(4)?,
            date_reminder,
            latitude: row.get::<f64>(7)?,
            longitude: row.get::<f64>(8)?,
            created_at: row.get::<i64>(9)?,
            updated_at: row.get::<i64>(10)?,
            archived_at,
        })
    }

    async fn commit(&self) -> Result<()> {
        if let Err(error) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(error.into());
        }
        Ok(())
    }

    /// Delete the owned sub-objects currently attached to a cache row, if
    /// the row exists. Must run inside a transaction alongside the parent
    /// row's mutation.
    async fn delete_owned_objects(&self, local_id: &str) -> Result<()> {
        let mut rows = self
            .conn
            .query(
                "SELECT date_reminder_id, archived_at_id FROM entries WHERE id = ?",
                [local_id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            for index in 0..2 {
                if let Some(object_id) = row.get::<Option<String>>(index)? {
                    self.conn
                        .execute("DELETE FROM date_objects WHERE id = ?", [object_id])
                        .await?;
                }
            }
        }

        Ok(())
    }

    async fn upsert_in_tx(&self, row: &EntryRow) -> Result<()> {
        self.delete_owned_objects(&row.id).await?;

        for object in [&row.date_reminder, &row.archived_at].into_iter().flatten() {
            self.conn
                .execute(
                    "INSERT INTO date_objects (id, date) VALUES (?, ?)",
                    params![object.id.clone(), object.date],
                )
                .await?;
        }

        self.conn
            .execute(
                "INSERT OR REPLACE INTO entries
                 (id, record_id, url, title, descriptions, date_reminder_id,
                  latitude, longitude, created_at, updated_at, archived_at_id)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    row.id.clone(),
                    row.record_id.clone(),
                    row.url.clone(),
                    row.title.clone(),
                    row.descriptions.clone(),
                    row.date_reminder.as_ref().map(|object| object.id.clone()),
                    row.latitude,
                    row.longitude,
                    row.created_at,
                    row.updated_at,
                    row.archived_at.as_ref().map(|object| object.id.clone()),
                ],
            )
            .await?;

        Ok(())
    }

    async fn delete_in_tx(&self, local_id: &str) -> Result<()> {
        self.delete_owned_objects(local_id).await?;
        self.conn
            .execute("DELETE FROM entries WHERE id = ?", [local_id])
            .await?;
        Ok(())
    }

    async fn delete_by_record_in_tx(&self, record_id: &str) -> Result<()> {
        let mut rows = self
            .conn
            .query("SELECT id FROM entries WHERE record_id = ?", [record_id])
            .await?;

        let mut local_ids = Vec::new();
        while let Some(row) = rows.next().await? {
            local_ids.push(row.get::<String>(0)?);
        }

        for local_id in local_ids {
            self.delete_in_tx(&local_id).await?;
        }

        Ok(())
    }

    async fn apply_changes_in_tx(
        &self,
        upserts: &[EntryRow],
        deleted_record_ids: &[RecordId],
    ) -> Result<()> {
        for row in upserts {
            self.upsert_in_tx(row).await?;
        }
        for record_id in deleted_record_ids {
            self.delete_by_record_in_tx(record_id.as_str()).await?;
        }
        Ok(())
    }
}

impl EntryRepository for LibSqlEntryRepository<'_> {
    async fn get(&self, local_id: &str) -> Result<Option<EntryRow>> {
        let mut rows = self
            .conn
            .query(&format!("{SELECT_ROW} WHERE e.id = ?"), [local_id])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn all(&self) -> Result<Vec<EntryRow>> {
        let mut rows = self
            .conn
            .query(&format!("{SELECT_ROW} ORDER BY e.created_at, e.id"), ())
            .await?;

        let mut result = Vec::new();
        while let Some(row) = rows.next().await? {
            result.push(Self::parse_row(&row)?);
        }

        Ok(result)
    }

    async fn upsert(&self, row: &EntryRow) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        if let Err(error) = self.upsert_in_tx(row).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(error);
        }

        self.commit().await
    }

    async fn delete(&self, local_id: &str) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        if let Err(error) = self.delete_in_tx(local_id).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(error);
        }

        self.commit().await
    }

    async fn apply_changes(
        &self,
        upserts: &[EntryRow],
        deleted_record_ids: &[RecordId],
    ) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        if let Err(error) = self.apply_changes_in_tx(upserts, deleted_record_ids).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(error);
        }

        self.commit().await
    }

    async fn load_change_token(&self) -> Result<Option<ChangeToken>> {
        let mut rows = self
            .conn
            .query(
                "SELECT value FROM sync_state WHERE key = ?",
                [CHANGE_TOKEN_KEY],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(ChangeToken::new(row.get::<String>(0)?))),
            None => Ok(None),
        }
    }

    async fn store_change_token(&self, token: &ChangeToken) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO sync_state (key, value) VALUES (?, ?)",
                [CHANGE_TOKEN_KEY, token.as_str()],
            )
            .await?;
        Ok(())
    }
}
