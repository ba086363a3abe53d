//! Tracked records and their changesets.

use std::fmt;

use serde::Serialize;

use tattle_value::{ArrayHandle, ObjectHandle, Snapshot};

use crate::status::TrackStatus;

/// Stable external handle for one tracked record. Assigned at
/// registration, monotonically increasing, never reused by a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RecordId(pub(crate) u64);

impl RecordId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One changed property on a tracked node.
///
/// `old_value` is the baseline side and stays fixed for the lifetime
/// of the entry; `new_value` is refreshed on every evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEntry {
    pub property: String,
    pub old_value: Snapshot,
    pub new_value: Snapshot,
}

/// Where a child node hangs off the live graph.
#[derive(Debug, Clone)]
pub(crate) enum ParentLink {
    /// Held in an object field.
    Field { object: ObjectHandle, property: String },
    /// Held in an array; `property` names the field through which the
    /// array is reachable on `owner`.
    Element {
        owner: ObjectHandle,
        array: ArrayHandle,
        property: String,
    },
}

/// One tracked node: a live alias plus its pristine baseline and
/// bookkeeping.
#[derive(Debug, Clone)]
pub(crate) struct TrackedRecord {
    pub id: RecordId,
    pub current: ObjectHandle,
    pub original: Snapshot,
    pub status: TrackStatus,
    pub original_status: TrackStatus,
    pub changeset: Vec<ChangeEntry>,
    /// Top-level tracked ancestor; None when this record is a root.
    pub root: Option<ObjectHandle>,
    pub parent: Option<ParentLink>,
    pub type_name: String,
    pub key: Option<Snapshot>,
}

impl TrackedRecord {
    /// Added and Deleted are changes in themselves; otherwise the
    /// changeset decides.
    pub fn has_changes(&self) -> bool {
        matches!(self.status, TrackStatus::Added | TrackStatus::Deleted)
            || !self.changeset.is_empty()
    }

    pub fn change_for(&self, property: &str) -> Option<&ChangeEntry> {
        self.changeset.iter().find(|entry| entry.property == property)
    }

    /// Insert or update the entry for the property, keeping the first
    /// recorded `old_value`.
    pub fn upsert_change(&mut self, entry: ChangeEntry) {
        match self
            .changeset
            .iter_mut()
            .find(|held| held.property == entry.property)
        {
            Some(held) => held.new_value = entry.new_value,
            None => self.changeset.push(entry),
        }
    }

    /// Drop the entry for the property, if any. Returns whether one
    /// was removed.
    pub fn remove_change(&mut self, property: &str) -> bool {
        let before = self.changeset.len();
        self.changeset.retain(|entry| entry.property != property);
        self.changeset.len() != before
    }
}

/// Read-only projection of one record for host queries.
#[derive(Debug, Clone)]
pub struct RecordView {
    pub id: RecordId,
    pub status: TrackStatus,
    pub type_name: String,
    pub key: Option<Snapshot>,
    pub object: ObjectHandle,
}
