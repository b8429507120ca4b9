//! Dynamic Values
//!
//! Reactive data is dynamic: a [`Target`] is a shared raw object or array,
//! and a [`Value`] is anything that can be stored in one. Targets are the
//! tracked sources of the wrapping layer; each carries a [`SourceId`] that
//! keys its dependency-graph entries.
//!
//! Values read through a deep wrapper come back as [`Value::Reactive`].
//! Storing a wrapper stores its raw target, so a target never holds a
//! wrapper.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::proxy::{self, Reactive};
use super::runtime::Runtime;
use crate::graph::SourceId;

/// Raw contents of a target.
#[derive(Debug, Clone)]
pub enum Data {
    Object(IndexMap<String, Value>),
    Array(Vec<Value>),
}

struct TargetInner {
    id: SourceId,
    data: RefCell<Data>,
}

impl Drop for TargetInner {
    fn drop(&mut self) {
        Runtime::forget_source(self.id);
        proxy::forget_target(self.id);
    }
}

/// A shared raw object or array.
///
/// Cloning a `Target` yields another handle to the same data; equality is
/// identity.
#[derive(Clone)]
pub struct Target {
    inner: Rc<TargetInner>,
}

impl Target {
    fn from_data(data: Data) -> Self {
        Self {
            inner: Rc::new(TargetInner {
                id: SourceId::new(),
                data: RefCell::new(data),
            }),
        }
    }

    /// Create an empty object.
    pub fn object() -> Self {
        Self::from_data(Data::Object(IndexMap::new()))
    }

    /// Create an empty array.
    pub fn array() -> Self {
        Self::from_data(Data::Array(Vec::new()))
    }

    /// Build a target from a JSON object or array.
    ///
    /// Returns `None` for JSON scalars.
    pub fn from_json(json: serde_json::Value) -> Option<Self> {
        match Value::from(json) {
            Value::Object(target) => Some(target),
            _ => None,
        }
    }

    /// The source id keying this target's dependency entries.
    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    pub fn is_array(&self) -> bool {
        matches!(*self.inner.data.borrow(), Data::Array(_))
    }

    /// Whether two handles refer to the same target.
    pub fn ptr_eq(&self, other: &Target) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Borrow the raw data without tracking.
    pub fn data(&self) -> Ref<'_, Data> {
        self.inner.data.borrow()
    }

    pub(crate) fn data_mut(&self) -> RefMut<'_, Data> {
        self.inner.data.borrow_mut()
    }

    /// Number of entries (fields or elements), untracked.
    pub fn len(&self) -> usize {
        match &*self.data() {
            Data::Object(fields) => fields.len(),
            Data::Array(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.id())
            .field("array", &self.is_array())
            .field("len", &self.len())
            .finish()
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &*self.data() {
            Data::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (key, value) in fields {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Data::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// Create an object target from key/value pairs.
pub fn object<K, I>(entries: I) -> Target
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    Target::from_data(Data::Object(
        entries
            .into_iter()
            .map(|(key, value)| (key.into(), value.into_raw()))
            .collect(),
    ))
}

/// Create an array target from values.
pub fn array<I>(items: I) -> Target
where
    I: IntoIterator<Item = Value>,
{
    Target::from_data(Data::Array(items.into_iter().map(Value::into_raw).collect()))
}

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// A raw (unwrapped) object or array.
    Object(Target),
    /// An object or array read through a deep wrapper.
    Reactive(Reactive),
}

impl Value {
    /// Replace a wrapper by its raw target.
    pub fn into_raw(self) -> Value {
        match self {
            Value::Reactive(reactive) => Value::Object(reactive.raw()),
            other => other,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_f64()
            .filter(|number| number.fract() == 0.0)
            .map(|number| number as i64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Value::Reactive(reactive) => Some(reactive),
            _ => None,
        }
    }

    /// The raw target behind an object value, wrapped or not.
    pub fn as_target(&self) -> Option<Target> {
        match self {
            Value::Object(target) => Some(target.clone()),
            Value::Reactive(reactive) => Some(reactive.raw()),
            _ => None,
        }
    }

    /// Snapshot the value as JSON without tracking.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl PartialEq for Value {
    /// Primitives compare by value, objects and wrappers by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Reactive(a), Value::Reactive(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(flag) => write!(f, "Bool({flag})"),
            Value::Number(number) => write!(f, "Number({number})"),
            Value::String(text) => write!(f, "String({text:?})"),
            Value::Object(target) => write!(f, "Object({:?})", target.id()),
            Value::Reactive(reactive) => write!(f, "Reactive({:?})", reactive.raw().id()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(flag) => write!(f, "{flag}"),
            Value::Number(number) => write!(f, "{number}"),
            Value::String(text) => f.write_str(text),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(flag) => serializer.serialize_bool(*flag),
            Value::Number(number) if number.fract() == 0.0 && number.abs() < 9.0e15 => {
                serializer.serialize_i64(*number as i64)
            }
            Value::Number(number) => serializer.serialize_f64(*number),
            Value::String(text) => serializer.serialize_str(text),
            Value::Object(target) => target.serialize(serializer),
            Value::Reactive(reactive) => reactive.raw().serialize(serializer),
        }
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Bool(flag)
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::Number(number)
    }
}

impl From<i32> for Value {
    fn from(number: i32) -> Self {
        Value::Number(f64::from(number))
    }
}

impl From<i64> for Value {
    fn from(number: i64) -> Self {
        Value::Number(number as f64)
    }
}

impl From<usize> for Value {
    fn from(number: usize) -> Self {
        Value::Number(number as f64)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::String(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::String(text)
    }
}

impl From<Target> for Value {
    fn from(target: Target) -> Self {
        Value::Object(target)
    }
}

impl From<Reactive> for Value {
    fn from(reactive: Reactive) -> Self {
        Value::Reactive(reactive)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(flag) => Value::Bool(flag),
            serde_json::Value::Number(number) => Value::Number(number.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(text) => Value::String(text),
            serde_json::Value::Array(items) => Value::Object(array(items.into_iter().map(Value::from))),
            serde_json::Value::Object(fields) => Value::Object(object(
                fields.into_iter().map(|(key, value)| (key, Value::from(value))),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primitives_compare_by_value() {
        assert_eq!(Value::from(1), Value::from(1.0));
        assert_eq!(Value::from("a"), Value::from("a".to_string()));
        assert_ne!(Value::from(1), Value::from("1"));
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = object([("x", Value::from(1))]);
        let b = object([("x", Value::from(1))]);

        assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
        assert_ne!(Value::from(a), Value::from(b));
    }

    #[test]
    fn json_round_trips_through_targets() {
        let source = json!({"name": "todo", "done": false, "tags": ["a", "b"], "count": 3});
        let target = Target::from_json(source.clone()).expect("object");

        assert!(!target.is_array());
        assert_eq!(target.len(), 4);
        assert_eq!(Value::from(target).to_json(), source);
    }

    #[test]
    fn json_scalars_are_not_targets() {
        assert!(Target::from_json(json!(3)).is_none());
        assert!(Target::from_json(json!([1, 2])).expect("array").is_array());
    }

    #[test]
    fn fractional_numbers_serialize_as_floats() {
        assert_eq!(Value::from(1.5).to_json(), json!(1.5));
        assert_eq!(Value::from(2).to_json(), json!(2));
    }

    #[test]
    fn display_renders_primitives_plainly() {
        assert_eq!(Value::from("hi").to_string(), "hi");
        assert_eq!(Value::from(3).to_string(), "3");
        assert_eq!(Value::Null.to_string(), "null");
    }
}
