//! # Tattle Core
//!
//! Change tracking over live object graphs: register a root object,
//! mutate it freely, and ask the tracker what changed. The engine
//! observes state only at evaluation time and never holds references
//! into host data beyond the shared handles it was given.
//!
//! ## Architecture
//!
//! ```text
//! TrackerFactory        ← construction, optional per-thread sharing
//!     │
//! ChangeTracker         ← facade: register / evaluate / accept / reject
//!     │
//! discovery             ← walks live graphs, adopts reachable objects
//!     │
//! evaluation            ← diffs live state against baselines
//!     │
//! commit                ← delete cascades, finalize, restore, reclaim
//!     │
//! RecordStore           ← tracked records, keyed by id and identity
//! ```
//!
//! Evaluation never fails: a property that cannot be read (an aliased
//! container borrow) is logged and skipped, and the pass continues.

pub mod config;
pub mod error;
pub mod factory;
pub mod record;
pub mod status;
pub mod tracker;

mod commit;
mod discover;
mod evaluate;
mod registry;

pub use config::{ConfigError, TrackerConfig};
pub use error::TrackError;
pub use factory::{TrackerFactory, TrackerHandle};
pub use record::{ChangeEntry, RecordId, RecordView};
pub use status::TrackStatus;
pub use tracker::{ChangeTracker, Listener, PendingChanges, PendingRecord, SaveResults};
