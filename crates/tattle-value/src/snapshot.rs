//! Owned deep snapshots of live values.
//!
//! A [`Snapshot`] is the pristine-baseline side of the tracker: it owns
//! all of its storage, so it can never alias the live graph it was
//! captured from. Capture tolerates aliasing and cycles in the live
//! graph by recording `Null` at the offending slot instead of
//! recursing forever.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;

use crate::value::{ArrId, ArrayHandle, ObjId, ObjectHandle, Value, ValueKind};

/// An exclusively-owned deep copy of a [`Value`] tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(DateTime<Utc>),
    Array(Vec<Snapshot>),
    Object(BTreeMap<String, Snapshot>),
}

#[derive(PartialEq)]
enum ContainerMark {
    Obj(ObjId),
    Arr(ArrId),
}

impl Snapshot {
    /// Deep-copy a live value.
    ///
    /// Re-entering a container already on the capture path (a cycle in
    /// the live graph) records `Null` for that slot and warns; so does
    /// a container that is mutably borrowed elsewhere.
    pub fn capture(value: &Value) -> Snapshot {
        let mut path = Vec::new();
        capture_guarded(value, &mut path)
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Snapshot::Null => ValueKind::Null,
            Snapshot::Bool(_) => ValueKind::Bool,
            Snapshot::Int(_) => ValueKind::Int,
            Snapshot::Float(_) => ValueKind::Float,
            Snapshot::Text(_) => ValueKind::Text,
            Snapshot::Date(_) => ValueKind::Date,
            Snapshot::Array(_) => ValueKind::Array,
            Snapshot::Object(_) => ValueKind::Object,
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.kind().is_scalar()
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Snapshot>> {
        match self {
            Snapshot::Object(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut BTreeMap<String, Snapshot>> {
        match self {
            Snapshot::Object(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Snapshot]> {
        match self {
            Snapshot::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Shortcut field lookup for object snapshots.
    pub fn field(&self, name: &str) -> Option<&Snapshot> {
        self.as_object().and_then(|fields| fields.get(name))
    }

    /// Rebuild a live value tree with fresh container handles.
    pub fn materialize(&self) -> Value {
        match self {
            Snapshot::Null => Value::Null,
            Snapshot::Bool(flag) => Value::Bool(*flag),
            Snapshot::Int(int) => Value::Int(*int),
            Snapshot::Float(float) => Value::Float(*float),
            Snapshot::Text(text) => Value::Text(text.clone()),
            Snapshot::Date(date) => Value::Date(*date),
            Snapshot::Array(items) => {
                Value::Array(ArrayHandle::from_values(items.iter().map(Snapshot::materialize)))
            }
            Snapshot::Object(fields) => Value::Object(ObjectHandle::from_fields(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.materialize())),
            )),
        }
    }

    /// Whether a live scalar equals this snapshot scalar.
    ///
    /// Exactly one side being a date means different; two dates compare
    /// as canonical instants; everything else is strict kind-and-value
    /// equality. Containers on either side never match here (they are
    /// compared structurally elsewhere).
    pub fn matches_scalar(&self, live: &Value) -> bool {
        match (self, live) {
            (Snapshot::Date(a), Value::Date(b)) => a == b,
            (Snapshot::Date(_), _) | (_, Value::Date(_)) => false,
            (Snapshot::Null, Value::Null) => true,
            (Snapshot::Bool(a), Value::Bool(b)) => a == b,
            (Snapshot::Int(a), Value::Int(b)) => a == b,
            (Snapshot::Float(a), Value::Float(b)) => a == b,
            (Snapshot::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }

    /// Convert parsed JSON into a snapshot (strings stay text, no date
    /// sniffing).
    pub fn from_json(json: &serde_json::Value) -> Snapshot {
        match json {
            serde_json::Value::Null => Snapshot::Null,
            serde_json::Value::Bool(flag) => Snapshot::Bool(*flag),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(int) => Snapshot::Int(int),
                None => Snapshot::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(text) => Snapshot::Text(text.clone()),
            serde_json::Value::Array(items) => {
                Snapshot::Array(items.iter().map(Snapshot::from_json).collect())
            }
            serde_json::Value::Object(fields) => Snapshot::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), Snapshot::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// Render to JSON. Dates become their canonical RFC 3339 string.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Snapshot::Null => serde_json::Value::Null,
            Snapshot::Bool(flag) => serde_json::Value::Bool(*flag),
            Snapshot::Int(int) => serde_json::Value::from(*int),
            Snapshot::Float(float) => serde_json::Value::from(*float),
            Snapshot::Text(text) => serde_json::Value::String(text.clone()),
            Snapshot::Date(date) => {
                serde_json::Value::String(date.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Snapshot::Array(items) => {
                serde_json::Value::Array(items.iter().map(Snapshot::to_json).collect())
            }
            Snapshot::Object(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl serde::Serialize for Snapshot {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

fn capture_guarded(value: &Value, path: &mut Vec<ContainerMark>) -> Snapshot {
    match value {
        Value::Null => Snapshot::Null,
        Value::Bool(flag) => Snapshot::Bool(*flag),
        Value::Int(int) => Snapshot::Int(*int),
        Value::Float(float) => Snapshot::Float(*float),
        Value::Text(text) => Snapshot::Text(text.clone()),
        Value::Date(date) => Snapshot::Date(*date),
        Value::Array(arr) => {
            let mark = ContainerMark::Arr(arr.id());
            if path.contains(&mark) {
                warn!("snapshot capture hit an array cycle; recording null");
                return Snapshot::Null;
            }
            let items = match arr.try_items() {
                Ok(items) => items,
                Err(err) => {
                    warn!(%err, "snapshot capture skipped a borrowed array");
                    return Snapshot::Null;
                }
            };
            path.push(mark);
            let copied = items
                .iter()
                .map(|item| capture_guarded(item, path))
                .collect();
            path.pop();
            Snapshot::Array(copied)
        }
        Value::Object(obj) => {
            let mark = ContainerMark::Obj(obj.id());
            if path.contains(&mark) {
                warn!("snapshot capture hit an object cycle; recording null");
                return Snapshot::Null;
            }
            let entries = match obj.try_entries() {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(%err, "snapshot capture skipped a borrowed object");
                    return Snapshot::Null;
                }
            };
            path.push(mark);
            let copied = entries
                .iter()
                .map(|(name, field)| (name.clone(), capture_guarded(field, path)))
                .collect();
            path.pop();
            Snapshot::Object(copied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_object() -> ObjectHandle {
        ObjectHandle::from_fields([
            ("name", Value::from("Tiger")),
            ("age", Value::Int(43)),
            ("tags", Value::Array(ArrayHandle::from_values(["a", "b"]))),
        ])
    }

    #[test]
    fn capture_is_independent_of_later_edits() {
        let obj = sample_object();
        let snap = Snapshot::capture(&Value::Object(obj.clone()));

        obj.set("name", "Jack");
        obj.get("tags")
            .and_then(|tags| tags.as_array().cloned())
            .expect("tags should be an array")
            .push("c");

        assert_eq!(snap.field("name"), Some(&Snapshot::Text("Tiger".into())));
        assert_eq!(
            snap.field("tags").and_then(Snapshot::as_array).map(<[_]>::len),
            Some(2),
        );
    }

    #[test]
    fn capture_records_null_at_cycles() {
        let obj = ObjectHandle::from_fields([("n", 1)]);
        obj.set("me", Value::Object(obj.clone()));

        let snap = Snapshot::capture(&Value::Object(obj));

        assert_eq!(snap.field("n"), Some(&Snapshot::Int(1)));
        assert_eq!(snap.field("me"), Some(&Snapshot::Null));
    }

    #[test]
    fn scalar_matching_applies_the_date_rule() {
        let instant = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let snap = Snapshot::Date(instant);

        assert!(snap.matches_scalar(&Value::Date(instant)));
        assert!(!snap.matches_scalar(&Value::Text(instant.to_rfc3339())));
        assert!(!Snapshot::Text("x".into()).matches_scalar(&Value::Date(instant)));
        assert!(Snapshot::Int(3).matches_scalar(&Value::Int(3)));
        assert!(!Snapshot::Int(3).matches_scalar(&Value::Float(3.0)));
    }

    #[test]
    fn materialize_builds_fresh_handles() {
        let obj = sample_object();
        let snap = Snapshot::capture(&Value::Object(obj.clone()));

        let rebuilt = snap.materialize();
        let rebuilt_obj = rebuilt.as_object().expect("rebuilt root should be object");

        assert!(!rebuilt_obj.ptr_eq(&obj));
        assert_eq!(rebuilt_obj.get("age"), Some(Value::Int(43)));
    }

    #[test]
    fn dates_render_as_canonical_strings() {
        let instant = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let json = Snapshot::Date(instant).to_json();
        assert_eq!(json, serde_json::Value::String("2024-05-01T12:00:00Z".into()));
    }
}
