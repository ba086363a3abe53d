//! The tracker facade.
//!
//! `ChangeTracker` owns the record store and wires registration,
//! evaluation, deletion, commit, and rollback together in the order
//! the engine contract prescribes. Hosts mutate their live objects
//! freely between calls; the tracker only observes state when asked.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use tracing::debug;

use tattle_value::{ObjectHandle, Snapshot, Value};

use crate::commit;
use crate::config::TrackerConfig;
use crate::discover;
use crate::error::TrackError;
use crate::evaluate;
use crate::record::{ChangeEntry, RecordId, RecordView, TrackedRecord};
use crate::registry::{IdSource, RecordStore};
use crate::status::TrackStatus;

/// Subscriber invoked after every evaluation pass with the overall
/// has-changes flag. Matched by `Rc` identity on unsubscribe.
pub type Listener = Rc<dyn Fn(bool)>;

/// Server-written fields per record, applied back after a successful
/// save. Each entry must be an object snapshot; only scalar properties
/// that also exist on the live object are copied.
pub type SaveResults = BTreeMap<RecordId, Snapshot>;

/// Everything the host would have to persist, grouped by status.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PendingChanges {
    pub added: Vec<PendingRecord>,
    pub modified: Vec<PendingRecord>,
    pub deleted: Vec<PendingRecord>,
}

impl PendingChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    pub fn count(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }
}

/// One pending record: its identity, resolved type, changeset, and a
/// deep copy of the current value.
#[derive(Debug, Clone, Serialize)]
pub struct PendingRecord {
    pub id: RecordId,
    pub type_name: String,
    pub changeset: Vec<ChangeEntry>,
    pub value: Snapshot,
}

pub struct ChangeTracker {
    config: TrackerConfig,
    store: RecordStore,
    ids: IdSource,
    listeners: Vec<Listener>,
}

impl Default for ChangeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeTracker")
            .field("config", &self.config)
            .field("records", &self.store.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::with_config(TrackerConfig::default())
    }

    pub fn with_config(config: TrackerConfig) -> Self {
        Self {
            config,
            store: RecordStore::new(),
            ids: IdSource::default(),
            listeners: Vec::new(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Register a root object and everything reachable from it.
    /// `as_added` marks the whole tree as pending insertion.
    pub fn register(&mut self, value: &Value, as_added: bool) -> Result<RecordId, TrackError> {
        let status = if as_added {
            TrackStatus::Added
        } else {
            TrackStatus::Unmodified
        };
        self.register_as(value, status)
    }

    /// Register with an explicit initial status. Only Added and
    /// Unmodified are valid starting points.
    pub fn register_as(
        &mut self,
        value: &Value,
        status: TrackStatus,
    ) -> Result<RecordId, TrackError> {
        let Some(object) = value.as_object() else {
            return Err(TrackError::NotAnObject { kind: value.kind() });
        };
        if self.store.contains_object(object) {
            return Err(TrackError::AlreadyTracked);
        }
        if !matches!(status, TrackStatus::Added | TrackStatus::Unmodified) {
            return Err(TrackError::InvalidInitialStatus(status));
        }
        let id = discover::register_tree(
            &mut self.store,
            &self.config,
            &mut self.ids,
            object.clone(),
            status,
            None,
            None,
        );
        debug!(record = %id, status = %status, "registered root object");
        Ok(id)
    }

    /// Delete a tracked object. Soft deletes flip status; hard deletes
    /// (and any delete of an Added object) drop records and mend the
    /// live graph. Cascades to records rooted at the object, then
    /// re-evaluates.
    pub fn delete(&mut self, value: &Value, hard: bool) -> Result<(), TrackError> {
        let id = self.record_id(value).ok_or(TrackError::NotTracked)?;
        commit::delete_record(&mut self.store, id, hard);
        debug!(record = %id, hard, "deleted tracked object");
        self.evaluate();
        Ok(())
    }

    /// Run one evaluation pass: adopt newly reachable children, then
    /// re-diff every non-Deleted record. Subscribers are notified once
    /// with the overall has-changes flag.
    pub fn evaluate(&mut self) {
        let summary = evaluate::run_pass(&mut self.store, &self.config, &mut self.ids);
        debug!(
            records = summary.records,
            changed = summary.changed,
            "evaluation pass finished"
        );
        let flag = self.has_changes();
        let listeners = self.listeners.clone();
        for listener in listeners {
            listener(flag);
        }
    }

    pub fn has_changes(&self) -> bool {
        self.store.iter().any(TrackedRecord::has_changes)
    }

    pub fn has_changes_for(&self, value: &Value) -> bool {
        self.record_id(value)
            .and_then(|id| self.store.get(id))
            .is_some_and(TrackedRecord::has_changes)
    }

    /// Whether any record rooted at the given object has changes. The
    /// object's own changes do not count.
    pub fn has_child_changes(&self, value: &Value) -> Result<bool, TrackError> {
        let target = self.require_record(value)?.current.clone();
        Ok(self.store.iter().any(|record| {
            record.root.as_ref().is_some_and(|root| root.ptr_eq(&target))
                && record.has_changes()
        }))
    }

    pub fn status_of(&self, value: &Value) -> Result<TrackStatus, TrackError> {
        Ok(self.require_record(value)?.status)
    }

    pub fn type_of(&self, value: &Value) -> Result<String, TrackError> {
        Ok(self.require_record(value)?.type_name.clone())
    }

    pub fn id_of(&self, value: &Value) -> Result<RecordId, TrackError> {
        Ok(self.require_record(value)?.id)
    }

    /// The baseline snapshot, if the object is tracked.
    pub fn original_of(&self, value: &Value) -> Option<Snapshot> {
        self.record_id(value)
            .and_then(|id| self.store.get(id))
            .map(|record| record.original.clone())
    }

    /// Live objects in registration order, Deleted excluded.
    pub fn objects(&self) -> Vec<ObjectHandle> {
        self.store
            .iter()
            .filter(|record| record.status != TrackStatus::Deleted)
            .map(|record| record.current.clone())
            .collect()
    }

    pub fn objects_with_status(&self, status: TrackStatus) -> Vec<ObjectHandle> {
        self.store
            .iter()
            .filter(|record| record.status == status)
            .map(|record| record.current.clone())
            .collect()
    }

    pub fn objects_of_type(&self, type_name: &str) -> Vec<ObjectHandle> {
        self.store
            .iter()
            .filter(|record| record.status != TrackStatus::Deleted && record.type_name == type_name)
            .map(|record| record.current.clone())
            .collect()
    }

    /// Every record, Deleted included, as read-only views.
    pub fn records(&self) -> Vec<RecordView> {
        self.store
            .iter()
            .map(|record| RecordView {
                id: record.id,
                status: record.status,
                type_name: record.type_name.clone(),
                key: record.key.clone(),
                object: record.current.clone(),
            })
            .collect()
    }

    /// Linear scan over non-Deleted records of the given type, keeping
    /// those whose live properties equal every filter value exactly.
    pub fn query(&self, type_name: &str, filters: &[(String, Value)]) -> Vec<ObjectHandle> {
        self.store
            .iter()
            .filter(|record| record.status != TrackStatus::Deleted && record.type_name == type_name)
            .filter(|record| {
                filters.iter().all(|(name, expected)| {
                    record
                        .current
                        .get(name)
                        .is_some_and(|live| live == *expected)
                })
            })
            .map(|record| record.current.clone())
            .collect()
    }

    pub fn changeset_of(&self, value: &Value) -> Result<Vec<ChangeEntry>, TrackError> {
        Ok(self.require_record(value)?.changeset.clone())
    }

    /// Collect every non-Unmodified record into a save envelope. The
    /// values are deep copies; mutating them does not touch the live
    /// graph.
    pub fn pending_changes(&self) -> PendingChanges {
        let mut pending = PendingChanges::default();
        for record in self.store.iter() {
            let bucket = match record.status {
                TrackStatus::Added => &mut pending.added,
                TrackStatus::Modified => &mut pending.modified,
                TrackStatus::Deleted => &mut pending.deleted,
                TrackStatus::Unmodified => continue,
            };
            bucket.push(PendingRecord {
                id: record.id,
                type_name: record.type_name.clone(),
                changeset: record.changeset.clone(),
                value: Snapshot::capture(&Value::Object(record.current.clone())),
            });
        }
        pending
    }

    /// Make the pending state the new baseline. Deleted array members
    /// are spliced out first (their siblings' diffs see the final
    /// shape), then every surviving record is finalized, save results
    /// are applied, and orphaned records reclaimed.
    pub fn accept_changes(&mut self, results: Option<&SaveResults>) {
        commit::drop_deleted_array_members(&mut self.store);
        self.evaluate();
        commit::finalize_committed(&mut self.store);
        if let Some(results) = results {
            commit::apply_save_results(&mut self.store, results);
        }
        self.evaluate();
        let reclaimed = commit::reclaim_orphans(&mut self.store);
        if reclaimed > 0 {
            debug!(reclaimed, "dropped unreachable records after commit");
        }
        debug!(records = self.store.len(), "accepted pending changes");
    }

    /// Roll every record back: Added records disappear, everything
    /// else returns to its baseline value and status.
    pub fn reject_changes(&mut self) {
        commit::reject_all(&mut self.store, &self.config);
        debug!(records = self.store.len(), "rejected pending changes");
        self.evaluate();
    }

    /// Roll back one object and the records rooted at it.
    pub fn reject_changes_for(&mut self, value: &Value) -> Result<(), TrackError> {
        let id = self.record_id(value).ok_or(TrackError::NotTracked)?;
        commit::reject_subtree(&mut self.store, &self.config, id);
        debug!(record = %id, "rejected pending changes for subtree");
        self.evaluate();
        Ok(())
    }

    /// Add a change listener. Returns the subscriber count.
    pub fn subscribe(&mut self, listener: Listener) -> usize {
        self.listeners.push(listener);
        self.listeners.len()
    }

    /// Remove a previously subscribed listener, matched by `Rc`
    /// identity. Returns the remaining subscriber count.
    pub fn unsubscribe(&mut self, listener: &Listener) -> Result<usize, TrackError> {
        let position = self
            .listeners
            .iter()
            .position(|held| Rc::ptr_eq(held, listener))
            .ok_or(TrackError::NotSubscribed)?;
        self.listeners.remove(position);
        Ok(self.listeners.len())
    }

    /// Drop every record. Listeners stay subscribed and identifiers
    /// keep counting up.
    pub fn clear(&mut self) {
        self.store.clear();
        debug!("cleared all tracked records");
    }

    /// Number of tracked records, Deleted included.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn record_id(&self, value: &Value) -> Option<RecordId> {
        value.as_object().and_then(|obj| self.store.id_for(obj))
    }

    fn require_record(&self, value: &Value) -> Result<&TrackedRecord, TrackError> {
        self.record_id(value)
            .and_then(|id| self.store.get(id))
            .ok_or(TrackError::NotTracked)
    }
}
