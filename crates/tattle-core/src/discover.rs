//! Graph discovery: walking live objects into tracked records.
//!
//! Discovery runs at registration (the whole subtree enters with the
//! root's initial status) and incrementally during evaluation (objects
//! that appeared since the last pass enter as Added). Walking is
//! identity-driven: a reference that is already tracked is skipped
//! silently, which also terminates cycles because a record is inserted
//! before its children are walked.

use tracing::warn;

use tattle_value::{ArrayHandle, ObjectHandle, Snapshot, Value, ValueKind};

use crate::config::TrackerConfig;
use crate::record::{ParentLink, RecordId, TrackedRecord};
use crate::registry::{IdSource, RecordStore};
use crate::status::TrackStatus;

/// Register `object` and every untracked object reachable from it.
pub(crate) fn register_tree(
    store: &mut RecordStore,
    config: &TrackerConfig,
    ids: &mut IdSource,
    object: ObjectHandle,
    status: TrackStatus,
    root: Option<ObjectHandle>,
    parent: Option<ParentLink>,
) -> RecordId {
    Walker { store, config, ids }.register(object, status, root, parent)
}

/// Incremental discovery from an already-tracked record.
pub(crate) fn discover_children(
    store: &mut RecordStore,
    config: &TrackerConfig,
    ids: &mut IdSource,
    id: RecordId,
    status: TrackStatus,
) {
    let Some((object, child_root)) = store.get(id).map(|record| {
        let child_root = record
            .root
            .clone()
            .unwrap_or_else(|| record.current.clone());
        (record.current.clone(), child_root)
    }) else {
        return;
    };
    Walker { store, config, ids }.walk_object(&object, status, &child_root);
}

struct Walker<'a> {
    store: &'a mut RecordStore,
    config: &'a TrackerConfig,
    ids: &'a mut IdSource,
}

impl Walker<'_> {
    fn register(
        &mut self,
        object: ObjectHandle,
        status: TrackStatus,
        root: Option<ObjectHandle>,
        parent: Option<ParentLink>,
    ) -> RecordId {
        let id = self.insert_record(object.clone(), status, root.clone(), parent);
        let child_root = root.unwrap_or_else(|| object.clone());
        self.walk_object(&object, status, &child_root);
        id
    }

    fn insert_record(
        &mut self,
        object: ObjectHandle,
        status: TrackStatus,
        root: Option<ObjectHandle>,
        parent: Option<ParentLink>,
    ) -> RecordId {
        let id = self.ids.next_id();
        let type_name = resolve_type(self.config, &object);
        let key = object
            .get(&self.config.key_property)
            .map(|value| Snapshot::capture(&value));
        let original = Snapshot::capture(&Value::Object(object.clone()));
        self.store.insert(TrackedRecord {
            id,
            current: object,
            original,
            status,
            original_status: status,
            changeset: Vec::new(),
            root,
            parent,
            type_name,
            key,
        });
        id
    }

    fn walk_object(&mut self, object: &ObjectHandle, status: TrackStatus, root: &ObjectHandle) {
        let entries = match object.try_entries() {
            Ok(entries) => entries,
            Err(err) => {
                warn!(%err, "discovery skipped a borrowed object");
                return;
            }
        };
        for (name, value) in entries {
            if self.config.is_ignored(&name) {
                continue;
            }
            match value {
                Value::Object(child) => {
                    let parent = ParentLink::Field {
                        object: object.clone(),
                        property: name,
                    };
                    self.adopt(child, status, root, parent);
                }
                Value::Array(arr) => self.walk_array(object, &arr, &name, status, root),
                _ => {}
            }
        }
    }

    /// Element-wise walk of an array property; nested arrays flatten,
    /// and every object element keeps its containing array as parent
    /// with the owning field's name.
    fn walk_array(
        &mut self,
        owner: &ObjectHandle,
        arr: &ArrayHandle,
        property: &str,
        status: TrackStatus,
        root: &ObjectHandle,
    ) {
        let items = match arr.try_items() {
            Ok(items) => items,
            Err(err) => {
                warn!(%err, property, "discovery skipped a borrowed array");
                return;
            }
        };
        for item in items {
            match item {
                Value::Object(child) => {
                    let parent = ParentLink::Element {
                        owner: owner.clone(),
                        array: arr.clone(),
                        property: property.to_owned(),
                    };
                    self.adopt(child, status, root, parent);
                }
                Value::Array(inner) => self.walk_array(owner, &inner, property, status, root),
                _ => {}
            }
        }
    }

    fn adopt(
        &mut self,
        child: ObjectHandle,
        status: TrackStatus,
        root: &ObjectHandle,
        parent: ParentLink,
    ) {
        if self.store.contains_object(&child) {
            return;
        }
        self.register(child, status, Some(root.clone()), Some(parent));
    }
}

fn resolve_type(config: &TrackerConfig, object: &ObjectHandle) -> String {
    object
        .get(&config.type_property)
        .and_then(|value| value.as_text().map(str::to_owned))
        .unwrap_or_else(|| ValueKind::Object.name().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (RecordStore, TrackerConfig, IdSource) {
        (RecordStore::new(), TrackerConfig::default(), IdSource::default())
    }

    fn register_root(
        store: &mut RecordStore,
        config: &TrackerConfig,
        ids: &mut IdSource,
        object: &ObjectHandle,
    ) -> RecordId {
        register_tree(
            store,
            config,
            ids,
            object.clone(),
            TrackStatus::Unmodified,
            None,
            None,
        )
    }

    #[test]
    fn nested_objects_become_child_records() {
        let (mut store, config, mut ids) = fixture();
        let sport = ObjectHandle::from_fields([("name", "Golf")]);
        let player = ObjectHandle::from_fields([
            ("name", Value::from("Tiger")),
            ("sport", Value::Object(sport.clone())),
        ]);

        register_root(&mut store, &config, &mut ids, &player);

        assert_eq!(store.len(), 2);
        let child_id = store.id_for(&sport).expect("sport should be tracked");
        let child = store.get(child_id).expect("record should exist");
        assert!(child.root.as_ref().is_some_and(|root| root.ptr_eq(&player)));
        assert!(matches!(
            &child.parent,
            Some(ParentLink::Field { object, property })
                if object.ptr_eq(&player) && property == "sport"
        ));
    }

    #[test]
    fn arrays_flatten_and_elements_link_to_their_array() {
        let (mut store, config, mut ids) = fixture();
        let a = ObjectHandle::from_fields([("n", 1)]);
        let b = ObjectHandle::from_fields([("n", 2)]);
        let inner = ArrayHandle::from_values([Value::Object(b.clone())]);
        let rounds = ArrayHandle::from_values([
            Value::Object(a.clone()),
            Value::Array(inner.clone()),
            Value::Int(7),
        ]);
        let team = ObjectHandle::from_fields([("rounds", Value::Array(rounds.clone()))]);

        register_root(&mut store, &config, &mut ids, &team);

        assert_eq!(store.len(), 3);
        let a_record = store
            .id_for(&a)
            .and_then(|id| store.get(id))
            .expect("a should be tracked");
        assert!(matches!(
            &a_record.parent,
            Some(ParentLink::Element { owner, array, property })
                if owner.ptr_eq(&team) && array.ptr_eq(&rounds) && property == "rounds"
        ));
        let b_record = store
            .id_for(&b)
            .and_then(|id| store.get(id))
            .expect("b should be tracked");
        assert!(matches!(
            &b_record.parent,
            Some(ParentLink::Element { array, property, .. })
                if array.ptr_eq(&inner) && property == "rounds"
        ));
    }

    #[test]
    fn reserved_and_ignored_properties_are_not_walked() {
        let (mut store, mut config, mut ids) = fixture();
        config.ignored_properties.push("cache".to_owned());
        let hidden = ObjectHandle::from_fields([("n", 1)]);
        let cached = ObjectHandle::from_fields([("n", 2)]);
        let root = ObjectHandle::from_fields([
            ("_type", Value::from("player")),
            ("_key", Value::Object(hidden.clone())),
            ("cache", Value::Object(cached.clone())),
            ("name", Value::from("Tiger")),
        ]);

        register_root(&mut store, &config, &mut ids, &root);

        assert_eq!(store.len(), 1);
        assert!(!store.contains_object(&hidden));
        assert!(!store.contains_object(&cached));
    }

    #[test]
    fn duplicate_references_register_once() {
        let (mut store, config, mut ids) = fixture();
        let shared = ObjectHandle::from_fields([("n", 1)]);
        let root = ObjectHandle::from_fields([
            ("first", Value::Object(shared.clone())),
            ("second", Value::Object(shared.clone())),
        ]);

        register_root(&mut store, &config, &mut ids, &root);

        assert_eq!(store.len(), 2, "the shared child is tracked once");
    }

    #[test]
    fn cyclic_graphs_terminate() {
        let (mut store, config, mut ids) = fixture();
        let root = ObjectHandle::from_fields([("name", "loop")]);
        root.set("me", Value::Object(root.clone()));

        register_root(&mut store, &config, &mut ids, &root);

        assert_eq!(store.len(), 1);
    }

    #[test]
    fn children_inherit_the_initial_status() {
        let (mut store, config, mut ids) = fixture();
        let sport = ObjectHandle::from_fields([("name", "Golf")]);
        let player = ObjectHandle::from_fields([("sport", Value::Object(sport.clone()))]);

        register_tree(
            &mut store,
            &config,
            &mut ids,
            player,
            TrackStatus::Added,
            None,
            None,
        );

        let child = store
            .id_for(&sport)
            .and_then(|id| store.get(id))
            .expect("sport should be tracked");
        assert_eq!(child.status, TrackStatus::Added);
        assert_eq!(child.original_status, TrackStatus::Added);
    }

    #[test]
    fn type_and_key_come_from_configured_properties() {
        let (mut store, config, mut ids) = fixture();
        let root = ObjectHandle::from_fields([
            ("_type", Value::from("player")),
            ("_key", Value::from(42)),
        ]);
        let plain = ObjectHandle::from_fields([("n", 1)]);

        let typed = register_root(&mut store, &config, &mut ids, &root);
        let untyped = register_root(&mut store, &config, &mut ids, &plain);

        let typed = store.get(typed).expect("record should exist");
        assert_eq!(typed.type_name, "player");
        assert_eq!(typed.key, Some(Snapshot::Int(42)));
        let untyped = store.get(untyped).expect("record should exist");
        assert_eq!(untyped.type_name, "object", "kind name is the fallback");
        assert_eq!(untyped.key, None);
    }
}
