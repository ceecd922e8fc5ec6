//! Entry synchronization manager
//!
//! Coordinates the remote record store and the local cache. The remote store
//! is authoritative: mutations go remote-first, and the cache is only written
//! once the remote acknowledges. Incremental pulls apply a whole change batch
//! in one cache transaction before the change token advances.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::SyncOptions;
use crate::db::{Database, EntryRepository, EntryRow, LibSqlEntryRepository};
use crate::error::{Error, Result};
use crate::models::{fields, Entry, LocalId};
use crate::remote::{ModifiedRecords, RecordId, RecordPredicate, RemoteRecord, RemoteStore};
use crate::util::normalize_text_option;

/// Two-tier entry store: authoritative remote records mirrored into the
/// local cache
pub struct EntrySyncManager<R: RemoteStore> {
    db: Arc<Mutex<Database>>,
    remote: R,
    options: SyncOptions,
    /// Serializes incremental pulls so two overlapping calls cannot race on
    /// the change token
    sync_gate: Mutex<()>,
}

impl<R: RemoteStore> EntrySyncManager<R> {
    /// Create a manager over an open cache database and a remote store
    pub fn new(db: Arc<Mutex<Database>>, remote: R, options: SyncOptions) -> Self {
        Self {
            db,
            remote,
            options,
            sync_gate: Mutex::new(()),
        }
    }

    /// Save a new entry.
    ///
    /// The remote write happens first; the cache is only touched once the
    /// remote acknowledges, so a failed save leaves no local trace. Returns
    /// the entry as acknowledged, carrying its record identifier and server
    /// timestamps. With remote sync disabled the entry goes straight to the
    /// cache.
    pub async fn create_entry(&self, mut entry: Entry) -> Result<Entry> {
        let Some(url) = normalize_text_option(Some(entry.url.clone())) else {
            return Err(Error::InvalidInput(
                "an entry needs a non-empty URL".to_string(),
            ));
        };
        entry.url = url;

        if !self.options.remote_enabled {
            self.cache_upsert(&entry).await?;
            return Ok(entry);
        }

        let saved = self
            .remote
            .save_record(&self.options.zone, entry.to_record())
            .await?;
        let acknowledged = Entry::from_record(&saved)?;
        self.cache_upsert(&acknowledged).await?;

        tracing::debug!(record_id = %saved.id, "Created entry");
        Ok(acknowledged)
    }

    /// Pull remote changes since the last stored change token and reconcile
    /// them into the cache.
    ///
    /// Upserts and deletions of a batch land in one cache transaction, and
    /// the new token is only persisted after that transaction commits. Any
    /// failure leaves both the cache and the token exactly as they were, so
    /// the next call replays the same batch. A no-op with remote sync
    /// disabled.
    pub async fn synchronize(&self) -> Result<()> {
        if !self.options.remote_enabled {
            return Ok(());
        }

        let _gate = self.sync_gate.lock().await;

        // The gate alone protects the token, so the cache lock is not held
        // across the remote round-trip.
        let since = {
            let db = self.db.lock().await;
            let repo = LibSqlEntryRepository::new(db.connection());
            repo.load_change_token().await?
        };

        let batch = self
            .remote
            .fetch_changes(&self.options.zone, since.as_ref())
            .await?;

        let mut upserts = Vec::with_capacity(batch.changed.len());
        for record in &batch.changed {
            let entry = Entry::from_record(record)?;
            upserts.push(EntryRow::from_entry(&entry));
        }

        let db = self.db.lock().await;
        let repo = LibSqlEntryRepository::new(db.connection());
        repo.apply_changes(&upserts, &batch.deleted).await?;
        repo.store_change_token(&batch.token).await?;

        tracing::info!(
            changed = batch.changed.len(),
            deleted = batch.deleted.len(),
            "Applied remote changes"
        );
        Ok(())
    }

    /// List every entry currently in the cache, without consulting the
    /// remote store
    pub async fn all_cached_entries(&self) -> Result<Vec<Entry>> {
        let db = self.db.lock().await;
        let repo = LibSqlEntryRepository::new(db.connection());

        let rows = repo.all().await?;
        rows.iter().map(EntryRow::to_entry).collect()
    }

    /// Look up an entry in the remote store by its local identifier.
    ///
    /// This is a remote read: with remote sync disabled it answers `Ok(None)`
    /// without falling back to the cache, so callers cannot mistake a cached
    /// copy for remote truth.
    pub async fn lookup_entry_by_local_id(&self, local_id: &LocalId) -> Result<Option<Entry>> {
        if !self.options.remote_enabled {
            return Ok(None);
        }

        let matches = self
            .remote
            .query_records(
                &self.options.zone,
                RecordPredicate::FieldEquals {
                    field: fields::LOCAL_ID.to_string(),
                    value: Value::from(local_id.as_str()),
                },
            )
            .await?;

        match matches.first() {
            Some(record) => Ok(Some(Entry::from_record(record)?)),
            None => Ok(None),
        }
    }

    /// Push an entry's current client-mutable state.
    ///
    /// The remote version is fetched by local identifier and updated in
    /// place when it exists; an entry unknown to the remote store is pushed
    /// as a new record. The cache is only updated from the acknowledged
    /// record, so a rejected batch leaves it untouched. With remote sync
    /// disabled the entry is written to the cache directly.
    pub async fn update_entry(&self, entry: &Entry) -> Result<Entry> {
        if !self.options.remote_enabled {
            self.cache_upsert(entry).await?;
            return Ok(entry.clone());
        }

        let record = match self.lookup_entry_by_local_id(&entry.local_id).await? {
            Some(mut remote_entry) => {
                remote_entry.copy_mutable_from(entry);
                remote_entry.to_record()
            }
            None => entry.to_record(),
        };

        let modified = self
            .modify_remote(vec![record], Vec::new())
            .await?;
        let Some(saved) = modified.saved.into_iter().next() else {
            return Err(Error::RemoteWrite(
                "remote store acknowledged an update without returning the record".to_string(),
            ));
        };

        let acknowledged = Entry::from_record(&saved)?;
        self.cache_upsert(&acknowledged).await?;
        Ok(acknowledged)
    }

    /// Delete an entry remotely, then remove it from the cache.
    ///
    /// An entry the remote store does not know (or remote sync being
    /// disabled) still removes the cache row and its owned sub-objects.
    pub async fn delete_entry(&self, entry: &Entry) -> Result<()> {
        if self.options.remote_enabled {
            if let Some(remote_entry) = self.lookup_entry_by_local_id(&entry.local_id).await? {
                if let Some(record_id) = remote_entry.id {
                    self.modify_remote(Vec::new(), vec![record_id]).await?;
                }
            }
        }

        let db = self.db.lock().await;
        let repo = LibSqlEntryRepository::new(db.connection());
        repo.delete(&entry.local_id.as_str()).await
    }

    /// Run a remote batch, logging per-item rejections before surfacing the
    /// failure
    async fn modify_remote(
        &self,
        saves: Vec<RemoteRecord>,
        deletes: Vec<RecordId>,
    ) -> Result<ModifiedRecords> {
        match self.remote.modify_records(&self.options.zone, saves, deletes).await {
            Ok(modified) => Ok(modified),
            Err(Error::RemotePartialFailure { failures }) => {
                for (record_id, reason) in &failures {
                    tracing::warn!(%record_id, reason, "Remote store rejected a batch item");
                }
                Err(Error::RemotePartialFailure { failures })
            }
            Err(error) => Err(error),
        }
    }

    async fn cache_upsert(&self, entry: &Entry) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlEntryRepository::new(db.connection());
        repo.upsert(&EntryRow::from_entry(entry)).await
    }
}
