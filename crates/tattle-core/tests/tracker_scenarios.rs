//! Integration tests: the engine contract, end to end.
//!
//! Each test drives a `ChangeTracker` through register → mutate →
//! evaluate → query/commit/rollback exactly the way a host would, and
//! asserts the observable contract: statuses, changesets, enumeration,
//! and listener notification.

use std::cell::RefCell;
use std::rc::Rc;

use tattle_core::{ChangeTracker, TrackError, TrackStatus};
use tattle_value::{ObjectHandle, Snapshot, Value};

fn player(name: &str) -> (ObjectHandle, Value) {
    let obj = ObjectHandle::from_fields([("_type", Value::from("player")), ("name", name.into())]);
    let value = Value::Object(obj.clone());
    (obj, value)
}

#[test]
fn registration_without_as_added_is_unmodified_and_clean() {
    let mut tracker = ChangeTracker::new();
    let (_, tiger) = player("Tiger");
    tracker.register(&tiger, false).expect("registers");

    assert!(!tracker.has_changes_for(&tiger));
    assert_eq!(tracker.status_of(&tiger), Ok(TrackStatus::Unmodified));
    assert!(!tracker.has_changes());
}

#[test]
fn registration_as_added_is_pending_even_without_edits() {
    let mut tracker = ChangeTracker::new();
    let (_, tiger) = player("Tiger");
    tracker.register(&tiger, true).expect("registers");

    assert!(tracker.has_changes_for(&tiger));
    assert_eq!(tracker.status_of(&tiger), Ok(TrackStatus::Added));
    let pending = tracker.pending_changes();
    assert_eq!(pending.added.len(), 1);
    assert!(pending.modified.is_empty());
}

#[test]
fn evaluation_is_idempotent() {
    let mut tracker = ChangeTracker::new();
    let (obj, tiger) = player("Tiger");
    tracker.register(&tiger, false).expect("registers");
    obj.set("name", "Jack");
    obj.set("ranking", 1);

    tracker.evaluate();
    let first_status = tracker.status_of(&tiger).expect("tracked");
    let first_changes = tracker.changeset_of(&tiger).expect("tracked");

    tracker.evaluate();
    assert_eq!(tracker.status_of(&tiger), Ok(first_status));
    assert_eq!(tracker.changeset_of(&tiger), Ok(first_changes));
}

#[test]
fn tiger_to_jack_records_exactly_one_change() {
    let mut tracker = ChangeTracker::new();
    let (obj, tiger) = player("Tiger");
    tracker.register(&tiger, false).expect("registers");

    obj.set("name", "Jack");
    tracker.evaluate();

    assert_eq!(tracker.status_of(&tiger), Ok(TrackStatus::Modified));
    let changes = tracker.changeset_of(&tiger).expect("tracked");
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].property, "name");
    assert_eq!(changes[0].old_value.to_json(), serde_json::json!("Tiger"));
    assert_eq!(changes[0].new_value.to_json(), serde_json::json!("Jack"));
}

#[test]
fn scalar_edit_then_subtree_reject_round_trips() {
    let mut tracker = ChangeTracker::new();
    let (obj, tiger) = player("Tiger");
    tracker.register(&tiger, false).expect("registers");

    obj.set("name", "Jack");
    tracker.evaluate();
    tracker.reject_changes_for(&tiger).expect("tracked");

    assert!(!tracker.has_changes_for(&tiger));
    assert_eq!(obj.get("name"), Some(Value::Text("Tiger".to_owned())));
    assert_eq!(tracker.status_of(&tiger), Ok(TrackStatus::Unmodified));
}

#[test]
fn scalar_edit_then_accept_then_reject_is_a_no_op() {
    let mut tracker = ChangeTracker::new();
    let (obj, tiger) = player("Tiger");
    tracker.register(&tiger, false).expect("registers");

    obj.set("name", "Jack");
    tracker.evaluate();
    tracker.accept_changes(None);

    assert_eq!(tracker.status_of(&tiger), Ok(TrackStatus::Unmodified));
    tracker.reject_changes_for(&tiger).expect("tracked");
    assert_eq!(
        obj.get("name"),
        Some(Value::Text("Jack".to_owned())),
        "the accepted value is the new baseline",
    );
    assert!(!tracker.has_changes());
}

#[test]
fn a_committed_deletion_survives_later_rollbacks() {
    let mut tracker = ChangeTracker::new();
    let sport = ObjectHandle::from_fields([("_type", Value::from("sport")), ("name", "Golf".into())]);
    let root = ObjectHandle::from_fields([
        ("_type", Value::from("player")),
        ("name", Value::from("Tiger")),
        ("sport", Value::Object(sport.clone())),
    ]);
    let root_value = Value::Object(root.clone());
    let sport_value = Value::Object(sport);
    tracker.register(&root_value, false).expect("registers");

    tracker.delete(&sport_value, false).expect("tracked");
    tracker.accept_changes(None);
    assert_eq!(root.get("sport"), None);

    root.set("name", "Jack");
    tracker.evaluate();
    tracker.reject_changes();

    assert_eq!(root.get("name"), Some(Value::Text("Tiger".to_owned())));
    assert_eq!(root.get("sport"), None, "the committed deletion holds");
    assert!(!tracker.has_changes());
    assert_eq!(tracker.len(), 1);
}

#[test]
fn child_edit_leaves_root_unmodified_but_flags_child_changes() {
    let mut tracker = ChangeTracker::new();
    let sport = ObjectHandle::from_fields([("_type", Value::from("sport")), ("name", "Golf".into())]);
    let root = ObjectHandle::from_fields([
        ("_type", Value::from("player")),
        ("name", Value::from("Tiger")),
        ("sport", Value::Object(sport.clone())),
    ]);
    let root_value = Value::Object(root.clone());
    let sport_value = Value::Object(sport.clone());
    tracker.register(&root_value, false).expect("registers");
    tracker.evaluate();
    assert_eq!(tracker.status_of(&root_value), Ok(TrackStatus::Unmodified));

    sport.set("name", "Hockey");
    tracker.evaluate();

    assert_eq!(tracker.status_of(&root_value), Ok(TrackStatus::Unmodified));
    assert_eq!(tracker.has_child_changes(&root_value), Ok(true));
    assert_eq!(tracker.status_of(&sport_value), Ok(TrackStatus::Modified));
}

#[test]
fn soft_delete_hides_from_live_enumeration_only() {
    let mut tracker = ChangeTracker::new();
    let (obj, tiger) = player("Tiger");
    tracker.register(&tiger, false).expect("registers");

    tracker.delete(&tiger, false).expect("tracked");

    assert!(tracker.objects().is_empty());
    let deleted = tracker.objects_with_status(TrackStatus::Deleted);
    assert_eq!(deleted.len(), 1);
    assert!(deleted[0].ptr_eq(&obj));
    assert_eq!(tracker.pending_changes().deleted.len(), 1);
}

#[test]
fn hard_deleting_an_added_tree_removes_every_record() {
    let mut tracker = ChangeTracker::new();
    let sport = ObjectHandle::from_fields([("name", "Golf")]);
    let root = ObjectHandle::from_fields([
        ("name", Value::from("Tiger")),
        ("sport", Value::Object(sport.clone())),
    ]);
    let root_value = Value::Object(root.clone());
    tracker.register(&root_value, true).expect("registers");
    assert_eq!(tracker.objects().len(), 2);

    tracker.delete(&root_value, false).expect("tracked");

    assert!(tracker.objects().is_empty());
    assert!(tracker.is_empty());
}

#[test]
fn accept_leaves_no_pending_statuses() {
    let mut tracker = ChangeTracker::new();
    let (team_obj, team) = player("Team");
    let (_, veteran) = player("Veteran");
    let (_, rookie) = player("Rookie");
    tracker.register(&team, false).expect("registers");
    tracker.register(&veteran, false).expect("registers");
    tracker.register(&rookie, true).expect("registers");
    team_obj.set("name", "All Stars");
    tracker.evaluate();
    tracker.delete(&veteran, false).expect("tracked");

    tracker.accept_changes(None);

    assert!(tracker.pending_changes().is_empty());
    assert!(!tracker.has_changes());
    for view in tracker.records() {
        assert_eq!(view.status, TrackStatus::Unmodified);
    }
    assert_eq!(tracker.len(), 2, "the deleted record is gone");
}

#[test]
fn full_reject_restores_the_baseline_state() {
    let mut tracker = ChangeTracker::new();
    let (team_obj, team) = player("Team");
    let (_, veteran) = player("Veteran");
    let (_, rookie) = player("Rookie");
    tracker.register(&team, false).expect("registers");
    tracker.register(&veteran, false).expect("registers");
    tracker.register(&rookie, true).expect("registers");
    team_obj.set("name", "All Stars");
    tracker.evaluate();
    tracker.delete(&veteran, false).expect("tracked");

    tracker.reject_changes();

    assert!(!tracker.has_changes());
    assert_eq!(tracker.len(), 2, "the added record is gone");
    assert_eq!(team_obj.get("name"), Some(Value::Text("Team".to_owned())));
    assert_eq!(tracker.status_of(&veteran), Ok(TrackStatus::Unmodified));
}

#[test]
fn listeners_hear_each_evaluation_once() {
    let mut tracker = ChangeTracker::new();
    let (obj, tiger) = player("Tiger");
    tracker.register(&tiger, false).expect("registers");

    let seen: Rc<RefCell<Vec<bool>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    tracker.subscribe(Rc::new(move |flag| sink.borrow_mut().push(flag)));

    tracker.evaluate();
    obj.set("name", "Jack");
    tracker.evaluate();

    assert_eq!(*seen.borrow(), vec![false, true]);
}

#[test]
fn identity_queries_expose_type_id_and_baseline() {
    let mut tracker = ChangeTracker::new();
    let (obj, tiger) = player("Tiger");
    let id = tracker.register(&tiger, false).expect("registers");

    assert_eq!(tracker.type_of(&tiger), Ok("player".to_owned()));
    assert_eq!(tracker.id_of(&tiger), Ok(id));

    obj.set("name", "Jack");
    tracker.evaluate();
    let baseline = tracker.original_of(&tiger).expect("tracked");
    assert_eq!(
        baseline.field("name"),
        Some(&Snapshot::Text("Tiger".to_owned())),
        "the baseline predates the edit",
    );

    let (_, stranger) = player("Stranger");
    assert_eq!(tracker.type_of(&stranger), Err(TrackError::NotTracked));
    assert_eq!(tracker.id_of(&stranger), Err(TrackError::NotTracked));
    assert!(tracker.original_of(&stranger).is_none());
}
