//! Dynamic values and the shared live containers they live in.
//!
//! Containers are handles over `Rc<RefCell<...>>`: cloning a
//! [`Value::Object`] clones the handle, not the fields, so application
//! code and the tracker observe the same live data. Identity is pointer
//! identity, stable for as long as any handle is alive.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Utc};

/// Borrow conflict while reading a live container.
///
/// Live containers are freely aliased by application code; a conflict
/// means a mutable borrow is still held across an engine call. Callers
/// in the evaluator treat this as skip-and-continue, not as fatal.
#[derive(Debug, Clone, thiserror::Error)]
#[error("live {kind} container is mutably borrowed elsewhere")]
pub struct AliasError {
    pub kind: ValueKind,
}

/// Kind tag for a [`Value`], used by graph walking and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Text,
    Date,
    Array,
    Object,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Text => "text",
            ValueKind::Date => "date",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        }
    }

    /// Scalars are everything a changeset entry can hold directly.
    /// Dates count as scalars; containers do not.
    pub fn is_scalar(self) -> bool {
        !matches!(self, ValueKind::Array | ValueKind::Object)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A dynamic value in a tracked graph.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(DateTime<Utc>),
    Array(ArrayHandle),
    Object(ObjectHandle),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Text(_) => ValueKind::Text,
            Value::Date(_) => ValueKind::Date,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.kind().is_scalar()
    }

    pub fn as_object(&self) -> Option<&ObjectHandle> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayHandle> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Build a value tree from parsed JSON.
    ///
    /// Strings stay [`Value::Text`]; there is no date sniffing. Numbers
    /// become [`Value::Int`] when they fit `i64`, otherwise
    /// [`Value::Float`].
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(flag) => Value::Bool(*flag),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(int) => Value::Int(int),
                None => Value::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(text) => Value::Text(text.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(ArrayHandle::from_values(items.iter().map(Value::from_json)))
            }
            serde_json::Value::Object(fields) => Value::Object(ObjectHandle::from_fields(
                fields.iter().map(|(name, value)| (name.clone(), Value::from_json(value))),
            )),
        }
    }
}

/// Strict equality: scalars by kind and value (dates by canonical
/// instant), containers by pointer identity.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Value {
        Value::Bool(flag)
    }
}

impl From<i64> for Value {
    fn from(int: i64) -> Value {
        Value::Int(int)
    }
}

impl From<i32> for Value {
    fn from(int: i32) -> Value {
        Value::Int(int.into())
    }
}

impl From<f64> for Value {
    fn from(float: f64) -> Value {
        Value::Float(float)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Value {
        Value::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Value {
        Value::Text(text)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(date: DateTime<Utc>) -> Value {
        Value::Date(date)
    }
}

impl From<ArrayHandle> for Value {
    fn from(arr: ArrayHandle) -> Value {
        Value::Array(arr)
    }
}

impl From<ObjectHandle> for Value {
    fn from(obj: ObjectHandle) -> Value {
        Value::Object(obj)
    }
}

/// Identity of a live object, stable while any handle is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjId(usize);

/// Identity of a live array, stable while any handle is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArrId(usize);

/// Shared handle to a live object: named fields in deterministic
/// (sorted) order.
#[derive(Debug, Clone, Default)]
pub struct ObjectHandle(Rc<RefCell<BTreeMap<String, Value>>>);

impl ObjectHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields<K, V, I>(fields: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map = fields
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        Self(Rc::new(RefCell::new(map)))
    }

    pub fn id(&self) -> ObjId {
        ObjId(Rc::as_ptr(&self.0) as usize)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.borrow().contains_key(name)
    }

    /// Clone the field's value out (a handle clone for containers).
    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.borrow().get(name).cloned()
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.borrow_mut().insert(name.into(), value.into());
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.0.borrow_mut().remove(name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    /// Copy all fields out under a short-lived borrow.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Like [`ObjectHandle::entries`], but fails instead of panicking
    /// when the container is mutably borrowed elsewhere.
    pub fn try_entries(&self) -> Result<Vec<(String, Value)>, AliasError> {
        let fields = self.0.try_borrow().map_err(|_| AliasError {
            kind: ValueKind::Object,
        })?;
        Ok(fields
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect())
    }
}

/// Shared handle to a live array.
#[derive(Debug, Clone, Default)]
pub struct ArrayHandle(Rc<RefCell<Vec<Value>>>);

impl ArrayHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self(Rc::new(RefCell::new(
            items.into_iter().map(Into::into).collect(),
        )))
    }

    pub fn id(&self) -> ArrId {
        ArrId(Rc::as_ptr(&self.0) as usize)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.0.borrow_mut().push(value.into());
    }

    /// Overwrite the element at `index`. Returns false when out of
    /// bounds (the array is left untouched).
    pub fn set(&self, index: usize, value: impl Into<Value>) -> bool {
        let mut items = self.0.borrow_mut();
        match items.get_mut(index) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, index: usize) -> Option<Value> {
        let mut items = self.0.borrow_mut();
        if index < items.len() {
            Some(items.remove(index))
        } else {
            None
        }
    }

    /// Splice the given live object out of the array, by identity.
    /// Returns true when something was removed.
    pub fn remove_object(&self, obj: &ObjectHandle) -> bool {
        let mut items = self.0.borrow_mut();
        let before = items.len();
        items.retain(|item| !matches!(item, Value::Object(held) if held.ptr_eq(obj)));
        items.len() != before
    }

    /// Whether the given live object is an element, by identity.
    pub fn contains_object(&self, obj: &ObjectHandle) -> bool {
        self.0
            .borrow()
            .iter()
            .any(|item| matches!(item, Value::Object(held) if held.ptr_eq(obj)))
    }

    /// Replace the array's contents in place, preserving its identity
    /// so external holders of the handle stay valid.
    pub fn replace_contents(&self, items: Vec<Value>) {
        let mut held = self.0.borrow_mut();
        held.clear();
        held.extend(items);
    }

    /// Copy all elements out under a short-lived borrow.
    pub fn items(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    /// Like [`ArrayHandle::items`], but fails instead of panicking when
    /// the container is mutably borrowed elsewhere.
    pub fn try_items(&self) -> Result<Vec<Value>, AliasError> {
        let items = self.0.try_borrow().map_err(|_| AliasError {
            kind: ValueKind::Array,
        })?;
        Ok(items.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cloned_object_handles_alias_the_same_fields() {
        let obj = ObjectHandle::from_fields([("name", "Tiger")]);
        let alias = obj.clone();

        alias.set("name", "Jack");

        assert_eq!(obj.get("name"), Some(Value::Text("Jack".to_string())));
        assert!(obj.ptr_eq(&alias));
        assert_eq!(obj.id(), alias.id());
    }

    #[test]
    fn distinct_objects_have_distinct_identity() {
        let a = ObjectHandle::from_fields([("n", 1)]);
        let b = ObjectHandle::from_fields([("n", 1)]);

        assert!(!a.ptr_eq(&b));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn value_equality_is_strict_for_scalars_and_identity_for_containers() {
        assert_eq!(Value::Int(3), Value::Int(3));
        assert_ne!(Value::Int(3), Value::Float(3.0));

        let instant = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(Value::Date(instant), Value::Date(instant));

        let arr = ArrayHandle::from_values([1, 2]);
        assert_eq!(Value::Array(arr.clone()), Value::Array(arr.clone()));
        assert_ne!(
            Value::Array(arr),
            Value::Array(ArrayHandle::from_values([1, 2]))
        );
    }

    #[test]
    fn from_json_maps_kinds_without_date_sniffing() {
        let json: serde_json::Value = serde_json::from_str(
            r#"{"name":"Tiger","age":43,"score":7.5,"tags":["a","b"],"when":"2024-05-01T12:00:00Z"}"#,
        )
        .expect("fixture json should parse");

        let value = Value::from_json(&json);
        let obj = value.as_object().expect("root should be an object");

        let name = obj.get("name").expect("name should exist");
        assert_eq!(name.as_text(), Some("Tiger"));
        assert_eq!(obj.get("age"), Some(Value::Int(43)));
        assert_eq!(obj.get("score"), Some(Value::Float(7.5)));
        assert_eq!(
            obj.get("when").map(|v| v.kind()),
            Some(ValueKind::Text),
            "json strings must stay text",
        );
        let tags = obj.get("tags").expect("tags should exist");
        assert_eq!(tags.as_array().expect("tags should be an array").len(), 2);
    }

    #[test]
    fn try_entries_reports_alias_conflicts() {
        let obj = ObjectHandle::from_fields([("n", 1)]);
        assert_eq!(obj.try_entries().expect("no conflict").len(), 1);

        let err = {
            let _hold = obj.0.borrow_mut();
            obj.try_entries().expect_err("conflict must surface")
        };
        assert_eq!(err.kind, ValueKind::Object);
    }

    #[test]
    fn replace_contents_preserves_array_identity() {
        let arr = ArrayHandle::from_values([1, 2, 3]);
        let external = arr.clone();

        arr.replace_contents(vec![Value::Int(9)]);

        assert_eq!(external.len(), 1);
        assert_eq!(external.get(0), Some(Value::Int(9)));
        assert!(arr.ptr_eq(&external));
    }

    #[test]
    fn remove_object_splices_by_identity() {
        let target = ObjectHandle::from_fields([("n", 1)]);
        let twin = ObjectHandle::from_fields([("n", 1)]);
        let arr = ArrayHandle::from_values([
            Value::Object(target.clone()),
            Value::Object(twin.clone()),
        ]);

        assert!(arr.remove_object(&target));
        assert_eq!(arr.len(), 1);
        assert!(arr.contains_object(&twin));
        assert!(!arr.remove_object(&target));
    }
}
