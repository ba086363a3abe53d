//! Identity-keyed record store.

use std::collections::BTreeMap;

use tattle_value::{ObjId, ObjectHandle};

use crate::record::{RecordId, TrackedRecord};

/// Registry of tracked nodes: iteration follows record ids (that is,
/// registration order), with a pointer-identity index for live-object
/// lookup. The index can never go stale: every record holds a strong
/// handle, so a tracked object's address is pinned until its record is
/// removed.
#[derive(Debug, Default)]
pub(crate) struct RecordStore {
    records: BTreeMap<RecordId, TrackedRecord>,
    by_identity: BTreeMap<ObjId, RecordId>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: TrackedRecord) {
        self.by_identity.insert(record.current.id(), record.id);
        self.records.insert(record.id, record);
    }

    pub fn remove(&mut self, id: RecordId) -> Option<TrackedRecord> {
        let record = self.records.remove(&id)?;
        self.by_identity.remove(&record.current.id());
        Some(record)
    }

    pub fn get(&self, id: RecordId) -> Option<&TrackedRecord> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut TrackedRecord> {
        self.records.get_mut(&id)
    }

    pub fn id_for(&self, object: &ObjectHandle) -> Option<RecordId> {
        self.by_identity.get(&object.id()).copied()
    }

    pub fn contains_object(&self, object: &ObjectHandle) -> bool {
        self.by_identity.contains_key(&object.id())
    }

    /// Record ids in registration order, copied out so callers can
    /// mutate the store while iterating.
    pub fn ids(&self) -> Vec<RecordId> {
        self.records.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.by_identity.clear();
    }
}

/// Monotonic record-id allocator. Ids are never reused and survive
/// `clear`, so stale external handles can never alias a new record.
#[derive(Debug, Default)]
pub(crate) struct IdSource {
    next: u64,
}

impl IdSource {
    pub fn next_id(&mut self) -> RecordId {
        self.next += 1;
        RecordId(self.next)
    }
}
