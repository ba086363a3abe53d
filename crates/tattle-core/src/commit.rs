//! Commit and rollback mechanics over the record store.
//!
//! Everything here is store surgery plus live-graph repair; the pass
//! sequencing (which steps run, and when evaluation happens between
//! them) lives on the tracker.

use std::collections::BTreeSet;

use tracing::warn;

use tattle_value::{ArrayHandle, ObjectHandle, Snapshot, Value};

use crate::config::TrackerConfig;
use crate::record::{ParentLink, RecordId};
use crate::registry::RecordStore;
use crate::status::TrackStatus;
use crate::tracker::SaveResults;

/// Delete one record. Added records are always hard-deleted. The
/// cascade covers every record whose root is the deleted object,
/// children first.
pub(crate) fn delete_record(store: &mut RecordStore, id: RecordId, hard: bool) {
    let Some((target, status)) = store
        .get(id)
        .map(|record| (record.current.clone(), record.status))
    else {
        return;
    };
    let hard = hard || status == TrackStatus::Added;
    let mut cascade = descendants_by_root(store, &target);
    cascade.reverse();

    if hard {
        for child in cascade {
            remove_record_hard(store, child);
        }
        remove_record_hard(store, id);
        return;
    }

    for child in cascade {
        let Some(child_status) = store.get(child).map(|record| record.status) else {
            continue;
        };
        if child_status == TrackStatus::Added {
            remove_record_hard(store, child);
        } else if let Some(record) = store.get_mut(child) {
            record.status = TrackStatus::Deleted;
        }
    }
    if let Some(record) = store.get_mut(id) {
        record.status = TrackStatus::Deleted;
    }
}

/// First commit step: splice every Deleted array-held node out of its
/// live array and drop its record, so sibling diffs see the final
/// shape.
pub(crate) fn drop_deleted_array_members(store: &mut RecordStore) {
    for id in store.ids() {
        let doomed = store.get(id).is_some_and(|record| {
            record.status == TrackStatus::Deleted
                && matches!(record.parent, Some(ParentLink::Element { .. }))
        });
        if !doomed {
            continue;
        }
        if let Some(record) = store.remove(id)
            && let Some(ParentLink::Element { array, .. }) = &record.parent
        {
            array.remove_object(&record.current);
        }
    }
}

/// Make the pending state the new baseline: drop remaining Deleted
/// records (detaching field-held ones from the live graph), and give
/// Added/Modified records a clean changeset, Unmodified status, and a
/// fresh snapshot.
pub(crate) fn finalize_committed(store: &mut RecordStore) {
    for id in store.ids() {
        let Some(status) = store.get(id).map(|record| record.status) else {
            continue;
        };
        match status {
            TrackStatus::Deleted => drop_committed_deleted(store, id),
            TrackStatus::Added | TrackStatus::Modified => {
                if let Some(record) = store.get_mut(id) {
                    record.changeset.clear();
                    record.status = TrackStatus::Unmodified;
                    record.original_status = TrackStatus::Unmodified;
                    record.original = Snapshot::capture(&Value::Object(record.current.clone()));
                }
            }
            TrackStatus::Unmodified => {}
        }
    }
}

/// Copy server-written scalar properties onto the live object and its
/// fresh baseline. Only properties present on both sides are applied,
/// and only where the live value actually differs.
pub(crate) fn apply_save_results(store: &mut RecordStore, results: &SaveResults) {
    for (id, result) in results {
        let Some(current) = store.get(*id).map(|record| record.current.clone()) else {
            warn!(record = %id, "save result for an unknown record");
            continue;
        };
        let Some(fields) = result.as_object() else {
            warn!(record = %id, "save result is not an object");
            continue;
        };

        let mut committed: Vec<(String, Snapshot)> = Vec::new();
        for (name, written) in fields {
            if !written.is_scalar() {
                continue;
            }
            let Some(live) = current.get(name) else {
                continue;
            };
            if written.matches_scalar(&live) {
                continue;
            }
            current.set(name.clone(), written.materialize());
            committed.push((name.clone(), written.clone()));
        }
        if committed.is_empty() {
            continue;
        }
        if let Some(baseline) = store
            .get_mut(*id)
            .and_then(|record| record.original.as_object_mut())
        {
            for (name, written) in committed {
                baseline.insert(name, written);
            }
        }
    }
}

/// Full rollback: every record gets the per-record rule (hard-delete
/// Added, restore Modified/Deleted), iterating from the end of the
/// registry so children are handled before their parents and removal
/// is tolerated.
pub(crate) fn reject_all(store: &mut RecordStore, config: &TrackerConfig) {
    let mut ids = store.ids();
    ids.reverse();
    for id in ids {
        reject_record(store, config, id);
    }
}

/// Targeted rollback: the per-record rule applied to the target and
/// every record rooted at it, children first.
pub(crate) fn reject_subtree(store: &mut RecordStore, config: &TrackerConfig, target: RecordId) {
    let Some(target_obj) = store.get(target).map(|record| record.current.clone()) else {
        return;
    };
    let mut scope = descendants_by_root(store, &target_obj);
    scope.reverse();
    scope.push(target);
    for id in scope {
        reject_record(store, config, id);
    }
}

fn reject_record(store: &mut RecordStore, config: &TrackerConfig, id: RecordId) {
    let Some(status) = store.get(id).map(|record| record.status) else {
        return;
    };
    match status {
        TrackStatus::Added => remove_record_hard(store, id),
        TrackStatus::Modified | TrackStatus::Deleted => restore_record(store, config, id),
        TrackStatus::Unmodified => {}
    }
}

/// Drop a record and mend the live graph around it: array-held nodes
/// are spliced out; field-held slots re-attach a sibling claimant,
/// fall back to the owner's baseline when the slot drifted, or are
/// removed outright.
fn remove_record_hard(store: &mut RecordStore, id: RecordId) {
    let Some(record) = store.remove(id) else {
        return;
    };
    match &record.parent {
        Some(ParentLink::Element { array, .. }) => {
            array.remove_object(&record.current);
        }
        Some(ParentLink::Field { object, property }) => {
            let holds_target = matches!(
                object.get(property),
                Some(Value::Object(live)) if live.ptr_eq(&record.current)
            );
            if holds_target {
                match field_claimant(store, object, property, None) {
                    Some((_, live)) => object.set(property.clone(), live),
                    None => {
                        object.remove(property);
                    }
                }
            } else {
                reset_field_from_owner(store, object, property);
            }
        }
        None => {}
    }
}

/// A drifted slot (the property no longer holds the deleted node)
/// goes back to whatever the owner's baseline recorded for it.
fn reset_field_from_owner(store: &RecordStore, owner: &ObjectHandle, property: &str) {
    let Some(owner_record) = store.id_for(owner).and_then(|id| store.get(id)) else {
        return;
    };
    match owner_record.original.field(property) {
        Some(snapshot) => owner.set(property.to_owned(), snapshot.materialize()),
        None => {
            owner.remove(property);
        }
    }
}

/// Accept-time removal of a Deleted record: committing a deletion
/// detaches the node, it never resurrects a baseline. The owner's
/// baseline sheds the field as well; a stale entry there would let a
/// later rollback of the owner re-materialize the node.
fn drop_committed_deleted(store: &mut RecordStore, id: RecordId) {
    let Some(record) = store.remove(id) else {
        return;
    };
    match &record.parent {
        Some(ParentLink::Element { array, .. }) => {
            array.remove_object(&record.current);
        }
        Some(ParentLink::Field { object, property }) => {
            let holds_target = matches!(
                object.get(property),
                Some(Value::Object(live)) if live.ptr_eq(&record.current)
            );
            let slot = if holds_target {
                object.remove(property);
                None
            } else {
                // The slot drifted while the deletion was pending; the
                // owner's baseline follows whatever it holds now.
                object.get(property).map(|live| Snapshot::capture(&live))
            };
            let Some(baseline) = store
                .id_for(object)
                .and_then(|owner| store.get_mut(owner))
                .and_then(|owner| owner.original.as_object_mut())
            else {
                return;
            };
            match slot {
                Some(snapshot) => {
                    baseline.insert(property.clone(), snapshot);
                }
                None => {
                    baseline.remove(property);
                }
            }
        }
        None => {}
    }
}

/// Put a record's live object back to its baseline, preserving
/// container identity wherever a live container already exists.
fn restore_record(store: &mut RecordStore, config: &TrackerConfig, id: RecordId) {
    let Some((current, original, original_status)) = store.get(id).map(|record| {
        (
            record.current.clone(),
            record.original.clone(),
            record.original_status,
        )
    }) else {
        return;
    };

    if let Some(baseline) = original.as_object() {
        for (name, snapshot) in baseline {
            if config.is_ignored(name) {
                continue;
            }
            match snapshot {
                Snapshot::Array(items) => restore_array_field(store, &current, name, items),
                Snapshot::Object(_) => restore_object_field(store, &current, name, snapshot),
                scalar => {
                    let unchanged = current
                        .get(name)
                        .is_some_and(|live| scalar.matches_scalar(&live));
                    if !unchanged {
                        current.set(name.clone(), scalar.materialize());
                    }
                }
            }
        }
        for name in current.field_names() {
            if !config.is_ignored(&name) && !baseline.contains_key(&name) {
                current.remove(&name);
            }
        }
    } else {
        warn!(record = %id, "baseline is not an object, restoring status only");
    }

    if let Some(record) = store.get_mut(id) {
        record.status = original_status;
        record.changeset.clear();
    }
}

/// Refill a live array from its baseline in place so external holders
/// keep a valid handle. Object elements re-attach the live object of
/// the record parented to this array whose baseline equals the
/// element, consumed at most once; everything else materializes fresh.
fn restore_array_field(
    store: &RecordStore,
    owner: &ObjectHandle,
    property: &str,
    items: &[Snapshot],
) {
    let Some(Value::Array(arr)) = owner.get(property) else {
        owner.set(
            property.to_owned(),
            Snapshot::Array(items.to_vec()).materialize(),
        );
        return;
    };
    if array_matches_baseline(store, &arr, items) {
        return;
    }

    let mut consumed: BTreeSet<RecordId> = BTreeSet::new();
    let rebuilt = items
        .iter()
        .map(|item| match item {
            Snapshot::Object(_) => match element_claimant(store, &arr, item, &consumed) {
                Some((claim, live)) => {
                    consumed.insert(claim);
                    Value::Object(live)
                }
                None => item.materialize(),
            },
            other => other.materialize(),
        })
        .collect();
    arr.replace_contents(rebuilt);
}

/// Restore an object-valued field. The slot is left alone when the
/// attached object's own record carries this baseline (its fields are
/// that record's business); a wholesale replacement re-attaches the
/// record that claims the slot, or materializes the baseline fresh.
fn restore_object_field(
    store: &RecordStore,
    owner: &ObjectHandle,
    property: &str,
    snapshot: &Snapshot,
) {
    if let Some(Value::Object(live)) = owner.get(property) {
        let attached_matches = store
            .id_for(&live)
            .and_then(|id| store.get(id))
            .is_some_and(|record| record.original == *snapshot);
        if attached_matches {
            return;
        }
    }
    match field_claimant(store, owner, property, Some(snapshot)) {
        Some((_, live)) => owner.set(property.to_owned(), live),
        None => owner.set(property.to_owned(), snapshot.materialize()),
    }
}

/// After commit, drop every record whose recorded parent no longer
/// actually references it. Membership is resolved against what the
/// parent property holds now, not the handle recorded at discovery,
/// so a wholesale-replaced container orphans its old members.
pub(crate) fn reclaim_orphans(store: &mut RecordStore) -> usize {
    let mut dropped = 0;
    for id in store.ids() {
        let Some(record) = store.get(id) else { continue };
        let reachable = match &record.parent {
            None => true,
            Some(ParentLink::Field { object, property }) => matches!(
                object.get(property),
                Some(Value::Object(live)) if live.ptr_eq(&record.current)
            ),
            Some(ParentLink::Element { owner, property, .. }) => matches!(
                owner.get(property),
                Some(Value::Array(live)) if array_reaches(&live, &record.current)
            ),
        };
        if !reachable {
            store.remove(id);
            dropped += 1;
        }
    }
    dropped
}

/// Whether the array, or any array nested in it, holds the target.
fn array_reaches(arr: &ArrayHandle, target: &ObjectHandle) -> bool {
    let Ok(items) = arr.try_items() else {
        return false;
    };
    items.iter().any(|item| match item {
        Value::Object(obj) => obj.ptr_eq(target),
        Value::Array(inner) => array_reaches(inner, target),
        _ => false,
    })
}

fn descendants_by_root(store: &RecordStore, root: &ObjectHandle) -> Vec<RecordId> {
    store
        .iter()
        .filter(|record| record.root.as_ref().is_some_and(|held| held.ptr_eq(root)))
        .map(|record| record.id)
        .collect()
}

/// First record claiming the given field slot, optionally required to
/// carry a specific baseline.
fn field_claimant(
    store: &RecordStore,
    owner: &ObjectHandle,
    property: &str,
    expected_baseline: Option<&Snapshot>,
) -> Option<(RecordId, ObjectHandle)> {
    store
        .iter()
        .find(|record| {
            let claims_slot = matches!(
                &record.parent,
                Some(ParentLink::Field { object, property: held })
                    if object.ptr_eq(owner) && held == property
            );
            claims_slot
                && expected_baseline.is_none_or(|expected| record.original == *expected)
        })
        .map(|record| (record.id, record.current.clone()))
}

fn element_claimant(
    store: &RecordStore,
    arr: &ArrayHandle,
    item: &Snapshot,
    consumed: &BTreeSet<RecordId>,
) -> Option<(RecordId, ObjectHandle)> {
    store
        .iter()
        .find(|record| {
            !consumed.contains(&record.id)
                && matches!(
                    &record.parent,
                    Some(ParentLink::Element { array, .. }) if array.ptr_eq(arr)
                )
                && record.original == *item
        })
        .map(|record| (record.id, record.current.clone()))
}

/// Restore-time array comparison: raw lengths (a pending element
/// removal must trigger the refill), object elements by their record's
/// baseline, primitives by value.
fn array_matches_baseline(store: &RecordStore, live: &ArrayHandle, baseline: &[Snapshot]) -> bool {
    let Ok(items) = live.try_items() else {
        return false;
    };
    if items.len() != baseline.len() {
        return false;
    }
    items
        .iter()
        .zip(baseline)
        .all(|(live_el, snap_el)| match (live_el, snap_el) {
            (Value::Object(obj), Snapshot::Object(_)) => store
                .id_for(obj)
                .and_then(|id| store.get(id))
                .is_some_and(|record| record.original == *snap_el),
            (Value::Array(inner), Snapshot::Array(inner_base)) => {
                array_matches_baseline(store, inner, inner_base)
            }
            (live_el, snap_el) if live_el.is_scalar() && snap_el.is_scalar() => {
                snap_el.matches_scalar(live_el)
            }
            _ => false,
        })
}
