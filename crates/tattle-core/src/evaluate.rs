//! The change evaluator: one synchronous diff pass.
//!
//! A pass never fails. Properties that cannot be resolved (a container
//! mutably borrowed by the host, a baseline that drifted structurally)
//! are logged and skipped for that property only; everything else in
//! the pass proceeds.

use tracing::warn;

use tattle_value::{AliasError, ArrayHandle, Snapshot, Value};

use crate::config::TrackerConfig;
use crate::discover;
use crate::record::{ChangeEntry, RecordId};
use crate::registry::{IdSource, RecordStore};
use crate::status::TrackStatus;

pub(crate) struct PassSummary {
    pub records: usize,
    pub changed: usize,
}

/// Incremental discovery, then a per-record diff. Deleted records are
/// skipped entirely.
pub(crate) fn run_pass(
    store: &mut RecordStore,
    config: &TrackerConfig,
    ids: &mut IdSource,
) -> PassSummary {
    for id in store.ids() {
        let live = store
            .get(id)
            .is_some_and(|record| record.status != TrackStatus::Deleted);
        if live {
            discover::discover_children(store, config, ids, id, TrackStatus::Added);
        }
    }

    let mut summary = PassSummary {
        records: 0,
        changed: 0,
    };
    for id in store.ids() {
        let Some(record) = store.get(id) else { continue };
        if record.status == TrackStatus::Deleted {
            continue;
        }
        summary.records += 1;
        let diff = diff_record(store, config, id);
        if apply_diff(store, id, diff) {
            summary.changed += 1;
        }
    }
    summary
}

#[derive(Default)]
struct RecordDiff {
    upserts: Vec<ChangeEntry>,
    removals: Vec<String>,
}

/// Compare one record's live object against its baseline. Read-only;
/// the outcome is applied separately.
fn diff_record(store: &RecordStore, config: &TrackerConfig, id: RecordId) -> RecordDiff {
    let mut diff = RecordDiff::default();
    let Some(record) = store.get(id) else {
        return diff;
    };
    let entries = match record.current.try_entries() {
        Ok(entries) => entries,
        Err(err) => {
            warn!(record = %record.id, %err, "diff skipped a borrowed object");
            return diff;
        }
    };
    let Some(baseline) = record.original.as_object() else {
        warn!(record = %record.id, "baseline is not an object, diff skipped");
        return diff;
    };

    // An entry whose property has since left the live object is stale
    // when the baseline never held that property either.
    for entry in &record.changeset {
        let live_absent = entries.iter().all(|(name, _)| *name != entry.property);
        let baseline_absent = matches!(
            baseline.get(&entry.property),
            None | Some(Snapshot::Null)
        );
        if live_absent && baseline_absent {
            diff.removals.push(entry.property.clone());
        }
    }

    for (name, live) in entries {
        if config.is_ignored(&name) {
            continue;
        }
        match live {
            // Object-valued properties are never diffed here; the
            // child's own record carries its status and changeset.
            Value::Object(_) => {}
            Value::Array(live_arr) => {
                let differs = match baseline.get(&name).and_then(Snapshot::as_array) {
                    Some(items) => array_differs(store, &live_arr, items),
                    // No array counterpart in the baseline counts as a
                    // length mismatch.
                    None => Ok(true),
                };
                match differs {
                    Ok(true) => diff.upserts.push(ChangeEntry {
                        old_value: baseline.get(&name).cloned().unwrap_or(Snapshot::Null),
                        new_value: Snapshot::capture(&Value::Array(live_arr.clone())),
                        property: name,
                    }),
                    Ok(false) => diff.removals.push(name),
                    Err(err) => {
                        warn!(record = %record.id, property = %name, %err, "diff skipped a borrowed array");
                    }
                }
            }
            live => {
                let old_value = baseline.get(&name).cloned().unwrap_or(Snapshot::Null);
                if old_value.matches_scalar(&live) {
                    diff.removals.push(name);
                } else {
                    diff.upserts.push(ChangeEntry {
                        old_value,
                        new_value: Snapshot::capture(&live),
                        property: name,
                    });
                }
            }
        }
    }
    diff
}

fn apply_diff(store: &mut RecordStore, id: RecordId, diff: RecordDiff) -> bool {
    let Some(record) = store.get_mut(id) else {
        return false;
    };
    for entry in diff.upserts {
        record.upsert_change(entry);
    }
    for property in diff.removals {
        record.remove_change(&property);
    }
    if record.status == TrackStatus::Unmodified && !record.changeset.is_empty() {
        record.status = TrackStatus::Modified;
    }
    record.has_changes()
}

/// Array comparison: the counted live length (elements whose own
/// tracked status is Deleted do not count) against the baseline
/// length; on equal lengths, primitive elements position by position.
/// Object elements are covered by their own records; nested arrays
/// recurse.
fn array_differs(
    store: &RecordStore,
    live: &ArrayHandle,
    baseline: &[Snapshot],
) -> Result<bool, AliasError> {
    let items = live.try_items()?;
    let counted: Vec<&Value> = items
        .iter()
        .filter(|item| !is_deleted_element(store, item))
        .collect();
    if counted.len() != baseline.len() {
        return Ok(true);
    }
    for (live_el, snap_el) in counted.into_iter().zip(baseline) {
        match (live_el, snap_el) {
            (Value::Object(_), Snapshot::Object(_)) => {}
            (Value::Array(inner), Snapshot::Array(inner_base)) => {
                if array_differs(store, inner, inner_base)? {
                    return Ok(true);
                }
            }
            (live_el, snap_el) if live_el.is_scalar() && snap_el.is_scalar() => {
                if !snap_el.matches_scalar(live_el) {
                    return Ok(true);
                }
            }
            _ => return Ok(true),
        }
    }
    Ok(false)
}

fn is_deleted_element(store: &RecordStore, item: &Value) -> bool {
    match item {
        Value::Object(obj) => store
            .id_for(obj)
            .and_then(|id| store.get(id))
            .is_some_and(|record| record.status == TrackStatus::Deleted),
        _ => false,
    }
}
