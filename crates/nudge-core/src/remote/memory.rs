//! In-memory remote record store
//!
//! A process-local stand-in for the real remote service, used by tests and
//! local development. Keeps one zone's records plus an append-only change
//! log; change tokens encode the last log sequence a caller has applied.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::util::unix_millis_now;

use super::{
    ChangeBatch, ChangeToken, ModifiedRecords, RecordId, RecordPredicate, RecordZone,
    RemoteRecord, RemoteStore,
};

#[derive(Debug, Clone)]
enum ChangeEvent {
    Saved(RecordId),
    Deleted(RecordId),
}

#[derive(Debug, Default)]
struct State {
    records: BTreeMap<RecordId, RemoteRecord>,
    log: Vec<(u64, ChangeEvent)>,
    next_seq: u64,
    fail_saves: bool,
    rejected: HashSet<RecordId>,
    fail_feed: bool,
}

impl State {
    fn apply_save(&mut self, mut record: RemoteRecord) -> RemoteRecord {
        let now = unix_millis_now();
        let created_at = self
            .records
            .get(&record.id)
            .and_then(|existing| existing.created_at)
            .unwrap_or(now);
        record.created_at = Some(created_at);
        record.updated_at = Some(now);

        self.records.insert(record.id.clone(), record.clone());
        self.push_event(ChangeEvent::Saved(record.id.clone()));
        record
    }

    fn apply_delete(&mut self, id: &RecordId) {
        if self.records.remove(id).is_some() {
            self.push_event(ChangeEvent::Deleted(id.clone()));
        }
    }

    fn push_event(&mut self, event: ChangeEvent) {
        self.next_seq += 1;
        self.log.push((self.next_seq, event));
    }
}

/// Cloneable handle to a shared in-memory remote store scoped to one zone
#[derive(Clone)]
pub struct MemoryRemoteStore {
    zone: RecordZone,
    state: Arc<Mutex<State>>,
}

impl MemoryRemoteStore {
    /// Create an empty store serving the given record zone
    #[must_use]
    pub fn new(zone: RecordZone) -> Self {
        Self {
            zone,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Make every subsequent single-record save fail
    pub fn set_save_failure(&self, fail: bool) {
        self.state().fail_saves = fail;
    }

    /// Reject batch items addressing the given record from now on
    pub fn reject_record(&self, id: RecordId) {
        self.state().rejected.insert(id);
    }

    /// Drop all per-record rejections
    pub fn clear_rejections(&self) {
        self.state().rejected.clear();
    }

    /// Make every subsequent change-feed fetch fail
    pub fn set_feed_failure(&self, fail: bool) {
        self.state().fail_feed = fail;
    }

    /// Number of records currently stored
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.state().records.len()
    }

    /// Fetch a stored record by identifier
    #[must_use]
    pub fn record(&self, id: &RecordId) -> Option<RemoteRecord> {
        self.state().records.get(id).cloned()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_zone(&self, zone: &RecordZone) -> Result<()> {
        if zone == &self.zone {
            Ok(())
        } else {
            Err(Error::RemoteWrite(format!(
                "unknown record zone '{zone}' (serving '{}')",
                self.zone
            )))
        }
    }
}

impl RemoteStore for MemoryRemoteStore {
    async fn save_record(&self, zone: &RecordZone, record: RemoteRecord) -> Result<RemoteRecord> {
        self.check_zone(zone)?;

        let mut state = self.state();
        if state.fail_saves {
            return Err(Error::RemoteWrite(format!(
                "save of record {} rejected by remote store",
                record.id
            )));
        }

        Ok(state.apply_save(record))
    }

    async fn modify_records(
        &self,
        zone: &RecordZone,
        saves: Vec<RemoteRecord>,
        deletes: Vec<RecordId>,
    ) -> Result<ModifiedRecords> {
        self.check_zone(zone)?;

        let mut state = self.state();
        let mut failures = HashMap::new();
        let mut saved = Vec::new();
        let mut deleted = Vec::new();

        for record in saves {
            if state.fail_saves || state.rejected.contains(&record.id) {
                failures.insert(record.id, "save rejected by remote store".to_string());
            } else {
                saved.push(state.apply_save(record));
            }
        }

        for id in deletes {
            if state.rejected.contains(&id) {
                failures.insert(id, "delete rejected by remote store".to_string());
            } else {
                state.apply_delete(&id);
                deleted.push(id);
            }
        }

        if failures.is_empty() {
            Ok(ModifiedRecords { saved, deleted })
        } else {
            // Accepted items stay applied; the caller sees the batch fail.
            Err(Error::RemotePartialFailure { failures })
        }
    }

    async fn query_records(
        &self,
        zone: &RecordZone,
        predicate: RecordPredicate,
    ) -> Result<Vec<RemoteRecord>> {
        self.check_zone(zone)?;

        Ok(self
            .state()
            .records
            .values()
            .filter(|record| predicate.matches(record))
            .cloned()
            .collect())
    }

    async fn fetch_changes(
        &self,
        zone: &RecordZone,
        since: Option<&ChangeToken>,
    ) -> Result<ChangeBatch> {
        if zone != &self.zone {
            return Err(Error::RemoteFeed(format!(
                "unknown record zone '{zone}' (serving '{}')",
                self.zone
            )));
        }

        let state = self.state();
        if state.fail_feed {
            return Err(Error::RemoteFeed(
                "change feed aborted by remote store".to_string(),
            ));
        }

        let cursor = match since {
            Some(token) => {
                let cursor: u64 = token.as_str().parse().map_err(|_| {
                    Error::RemoteFeed(format!("unrecognized change token '{}'", token.as_str()))
                })?;
                if cursor > state.next_seq {
                    return Err(Error::RemoteFeed(format!(
                        "change token '{}' is ahead of the feed",
                        token.as_str()
                    )));
                }
                cursor
            }
            None => 0,
        };

        // Coalesce the log so each record appears at most once per batch.
        let mut changed_ids: Vec<RecordId> = Vec::new();
        let mut deleted_ids: Vec<RecordId> = Vec::new();
        for (seq, event) in &state.log {
            if *seq <= cursor {
                continue;
            }
            match event {
                ChangeEvent::Saved(id) => {
                    deleted_ids.retain(|deleted| deleted != id);
                    if !changed_ids.contains(id) {
                        changed_ids.push(id.clone());
                    }
                }
                ChangeEvent::Deleted(id) => {
                    changed_ids.retain(|changed| changed != id);
                    if !deleted_ids.contains(id) {
                        deleted_ids.push(id.clone());
                    }
                }
            }
        }

        let changed = changed_ids
            .iter()
            .filter_map(|id| state.records.get(id).cloned())
            .collect();

        Ok(ChangeBatch {
            changed,
            deleted: deleted_ids,
            token: ChangeToken::new(state.next_seq.to_string()),
        })
    }
}
