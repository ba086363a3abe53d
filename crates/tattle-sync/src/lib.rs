//! Load/save collaborator for the tracking engine.
//!
//! The engine itself never performs I/O. A `SyncSession` pairs a
//! tracker with a `SyncTransport`: `refresh` pulls documents from the
//! transport and registers them as committed state, `flush` pushes the
//! pending report out and accepts the changes with whatever the
//! transport wrote back (generated keys, server timestamps).

use std::collections::BTreeMap;

use tracing::debug;

use tattle_core::{ChangeTracker, RecordId, TrackError, TrackerConfig};
use tattle_value::Snapshot;

pub use tattle_core::{PendingChanges, SaveResults};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("endpoint `{0}` is not usable")]
    Endpoint(String),
    #[error("transport unavailable: {0}")]
    Unavailable(String),
    #[error("save rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("tracker config has no service endpoint")]
    MissingEndpoint,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Track(#[from] TrackError),
}

/// Moves object snapshots between an endpoint and the engine. `load`
/// returns one object snapshot per stored document of the requested
/// type; `save` persists a pending report and answers with
/// server-written fields per record.
pub trait SyncTransport {
    fn load(&mut self, endpoint: &str, type_name: &str) -> Result<Vec<Snapshot>, TransportError>;

    fn save(
        &mut self,
        endpoint: &str,
        changes: &PendingChanges,
    ) -> Result<SaveResults, TransportError>;
}

/// A tracker wired to a transport. The endpoint comes from the
/// tracker configuration and is required up front.
pub struct SyncSession<T: SyncTransport> {
    transport: T,
    tracker: ChangeTracker,
    endpoint: String,
}

impl<T: SyncTransport> SyncSession<T> {
    pub fn new(config: TrackerConfig, transport: T) -> Result<Self, SyncError> {
        let Some(endpoint) = config.service_endpoint.clone() else {
            return Err(SyncError::MissingEndpoint);
        };
        Ok(Self {
            transport,
            tracker: ChangeTracker::with_config(config),
            endpoint,
        })
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut ChangeTracker {
        &mut self.tracker
    }

    /// Load every document of the given type and register each as a
    /// committed (Unmodified) root.
    pub fn refresh(&mut self, type_name: &str) -> Result<Vec<RecordId>, SyncError> {
        let documents = self.transport.load(&self.endpoint, type_name)?;
        let mut ids = Vec::with_capacity(documents.len());
        for document in &documents {
            let value = document.materialize();
            ids.push(self.tracker.register(&value, false)?);
        }
        debug!(
            endpoint = %self.endpoint,
            type_name,
            count = ids.len(),
            "refreshed documents from transport"
        );
        Ok(ids)
    }

    /// Evaluate, push the pending report, and accept the changes with
    /// the transport's save results. Returns the number of records
    /// that were pending.
    pub fn flush(&mut self) -> Result<usize, SyncError> {
        self.tracker.evaluate();
        let pending = self.tracker.pending_changes();
        if pending.is_empty() {
            return Ok(0);
        }
        let count = pending.count();
        let results = self.transport.save(&self.endpoint, &pending)?;
        self.tracker.accept_changes(Some(&results));
        debug!(endpoint = %self.endpoint, count, "flushed pending changes");
        Ok(count)
    }
}

/// In-memory transport for tests and demos. Stores documents per type
/// name, records every saved report, and generates keys for added
/// records that carry an empty key property.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    documents: BTreeMap<String, Vec<Snapshot>>,
    key_property: String,
    next_key: i64,
    saved: Vec<PendingChanges>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            documents: BTreeMap::new(),
            key_property: "_key".to_owned(),
            next_key: 1000,
            saved: Vec::new(),
        }
    }

    pub fn with_key_property(key_property: impl Into<String>) -> Self {
        Self {
            key_property: key_property.into(),
            ..Self::new()
        }
    }

    pub fn insert_document(&mut self, type_name: impl Into<String>, document: Snapshot) {
        self.documents.entry(type_name.into()).or_default().push(document);
    }

    /// Every report passed to `save`, oldest first.
    pub fn saved(&self) -> &[PendingChanges] {
        &self.saved
    }
}

impl SyncTransport for MemoryTransport {
    fn load(&mut self, endpoint: &str, type_name: &str) -> Result<Vec<Snapshot>, TransportError> {
        if endpoint.is_empty() {
            return Err(TransportError::Endpoint(endpoint.to_owned()));
        }
        Ok(self.documents.get(type_name).cloned().unwrap_or_default())
    }

    fn save(
        &mut self,
        endpoint: &str,
        changes: &PendingChanges,
    ) -> Result<SaveResults, TransportError> {
        if endpoint.is_empty() {
            return Err(TransportError::Endpoint(endpoint.to_owned()));
        }
        self.saved.push(changes.clone());

        let mut results = SaveResults::new();
        for record in &changes.added {
            let missing_key = match record.value.field(&self.key_property) {
                None | Some(Snapshot::Null) => true,
                Some(_) => false,
            };
            if !missing_key {
                continue;
            }
            let key = self.next_key;
            self.next_key += 1;
            results.insert(
                record.id,
                Snapshot::Object(
                    [(self.key_property.clone(), Snapshot::Int(key))]
                        .into_iter()
                        .collect(),
                ),
            );
        }
        Ok(results)
    }
}
