//! # tattle-value
//!
//! The value layer for Tattle's change tracker:
//! - [`Value`]: dynamic plain-data values (scalars, dates, and shared
//!   object/array containers)
//! - [`ObjectHandle`] / [`ArrayHandle`]: aliasable live containers with
//!   pointer identity, mutated freely by application code
//! - [`Snapshot`]: exclusively-owned deep copies used as the pristine
//!   baseline for diffing and restoration
//! - [`Path`]: explicit property paths (field/index steps) resolved by
//!   direct traversal
//!
//! This crate knows nothing about tracking. The engine lives in
//! `tattle-core`; hosts that only need to build or address value trees
//! can depend on this crate alone.
//!
//! ## Data model
//!
//! ```text
//! live graph (shared handles)        baseline (owned)
//!     Value::Object ─ aliasable  ↔   Snapshot::Object ─ deep copy
//!     Value::Array  ─ aliasable  ↔   Snapshot::Array  ─ deep copy
//! ```

pub mod path;
pub mod snapshot;
pub mod value;

pub use path::{Path, PathError, PathStep};
pub use snapshot::Snapshot;
pub use value::{AliasError, ArrId, ArrayHandle, ObjId, ObjectHandle, Value, ValueKind};
