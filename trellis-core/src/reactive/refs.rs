//! Ref Implementation
//!
//! A [`Ref`] boxes a single value behind a tracked `value` field.
//!
//! # How Refs Work
//!
//! 1. Reading a ref within a running effect registers the effect as a
//!    subscriber of the ref's `value` key.
//!
//! 2. Writing a ref compares the new raw value with the stored one and
//!    notifies subscribers only if it changed.
//!
//! 3. A deep ref (`r#ref`) stores object values as reactive wrappers; a
//!    shallow ref stores them as they are.
//!
//! Field refs (`to_ref`, `to_refs`) do no tracking of their own: they forward
//! to a reactive wrapper, which tracks the underlying field.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::proxy::{reactive, Reactive};
use super::runtime::Runtime;
use super::value::{Data, Value};
use crate::graph::{Key, SourceId, Trigger};

enum RefKind {
    Owned {
        source: SourceId,
        /// The value as written, before deep conversion.
        raw: RefCell<Value>,
        /// The value as read.
        value: RefCell<Value>,
        shallow: bool,
    },
    Field {
        target: Reactive,
        key: Key,
    },
}

struct RefInner {
    kind: RefKind,
}

impl Drop for RefInner {
    fn drop(&mut self) {
        if let RefKind::Owned { source, .. } = &self.kind {
            Runtime::forget_source(*source);
        }
    }
}

/// A reactive box holding one value.
///
/// # Example
///
/// ```rust,ignore
/// let count = r#ref(0);
///
/// // Read the value
/// let value = count.get();
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// ```
#[derive(Clone)]
pub struct Ref {
    inner: Rc<RefInner>,
}

fn convert(value: Value, shallow: bool) -> Value {
    match value {
        Value::Object(target) if !shallow => Value::Reactive(reactive(&target)),
        other => other,
    }
}

impl Ref {
    /// Create a deep ref.
    pub fn new(value: impl Into<Value>) -> Self {
        Self::owned(value.into(), false)
    }

    /// Create a ref that does not wrap object values.
    pub fn shallow(value: impl Into<Value>) -> Self {
        Self::owned(value.into(), true)
    }

    fn owned(value: Value, shallow: bool) -> Self {
        let raw = value.into_raw();
        let value = convert(raw.clone(), shallow);
        Self {
            inner: Rc::new(RefInner {
                kind: RefKind::Owned {
                    source: SourceId::new(),
                    raw: RefCell::new(raw),
                    value: RefCell::new(value),
                    shallow,
                },
            }),
        }
    }

    fn field(target: Reactive, key: Key) -> Self {
        Self {
            inner: Rc::new(RefInner {
                kind: RefKind::Field { target, key },
            }),
        }
    }

    /// The source id of an owned ref; `None` for field refs.
    pub fn source(&self) -> Option<SourceId> {
        match &self.inner.kind {
            RefKind::Owned { source, .. } => Some(*source),
            RefKind::Field { .. } => None,
        }
    }

    /// Get the current value, tracking the read.
    pub fn get(&self) -> Value {
        match &self.inner.kind {
            RefKind::Owned { source, value, .. } => {
                Runtime::track(*source, Key::Value);
                value.borrow().clone()
            }
            RefKind::Field { target, key } => target.get(key.clone()),
        }
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> Value {
        match &self.inner.kind {
            RefKind::Owned { value, .. } => value.borrow().clone(),
            RefKind::Field { target, key } => {
                let key = key.clone().normalize(target.is_array());
                let raw = target.raw();
                let data = raw.data();
                let value = match (&*data, &key) {
                    (Data::Object(fields), Key::Field(name)) => {
                        fields.get(name).cloned().unwrap_or_default()
                    }
                    (Data::Array(items), Key::Index(index)) => {
                        items.get(*index).cloned().unwrap_or_default()
                    }
                    _ => Value::Null,
                };
                value
            }
        }
    }

    /// Set a new value and notify subscribers if it changed.
    pub fn set(&self, new_value: impl Into<Value>) {
        match &self.inner.kind {
            RefKind::Owned {
                source,
                raw,
                value,
                shallow,
            } => {
                let new_raw = new_value.into().into_raw();
                if *raw.borrow() == new_raw {
                    return;
                }
                *value.borrow_mut() = convert(new_raw.clone(), *shallow);
                *raw.borrow_mut() = new_raw;
                Runtime::trigger(*source, Trigger::set(Key::Value));
            }
            RefKind::Field { target, key } => {
                target.set(key.clone(), new_value);
            }
        }
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&Value) -> Value,
    {
        let next = f(&self.get_untracked());
        self.set(next);
    }

    /// Number of effects subscribed to an owned ref.
    pub fn subscriber_count(&self) -> usize {
        self.source()
            .map_or(0, |source| Runtime::subscriber_count(source, &Key::Value))
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.kind {
            RefKind::Owned { source, .. } => f
                .debug_struct("Ref")
                .field("source", source)
                .field("value", &self.get_untracked())
                .finish(),
            RefKind::Field { key, .. } => f
                .debug_struct("Ref")
                .field("key", key)
                .field("value", &self.get_untracked())
                .finish(),
        }
    }
}

/// Create a deep ref.
pub fn r#ref(value: impl Into<Value>) -> Ref {
    Ref::new(value)
}

/// Create a shallow ref.
pub fn shallow_ref(value: impl Into<Value>) -> Ref {
    Ref::shallow(value)
}

/// A ref forwarding to one field of a reactive wrapper.
pub fn to_ref(target: &Reactive, key: impl Into<Key>) -> Ref {
    Ref::field(target.clone(), key.into())
}

/// One field ref per current key of the wrapper, in key order.
pub fn to_refs(target: &Reactive) -> IndexMap<String, Ref> {
    target
        .keys()
        .into_iter()
        .map(|key| (key.to_string(), to_ref(target, key)))
        .collect()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::value::{array, object};
    use crate::reactive::Effect;
    use std::cell::Cell;

    #[test]
    fn ref_get_and_set() {
        let count = r#ref(0);
        assert_eq!(count.get(), Value::from(0));

        count.set(42);
        assert_eq!(count.get(), Value::from(42));
    }

    #[test]
    fn ref_update() {
        let count = r#ref(10);
        count.update(|v| Value::from(v.as_f64().unwrap_or_default() + 5.0));
        assert_eq!(count.get(), Value::from(15));
    }

    #[test]
    fn ref_notifies_only_on_change() {
        let count = r#ref(0);
        let runs = Rc::new(Cell::new(0));

        let view = count.clone();
        let runs_clone = runs.clone();
        let _effect = Effect::new(move || {
            view.get();
            runs_clone.set(runs_clone.get() + 1);
        });
        assert_eq!(count.subscriber_count(), 1);

        count.set(1);
        assert_eq!(runs.get(), 2);

        count.set(1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn deep_ref_wraps_objects() {
        let target = object([("x", Value::from(1))]);

        let deep = r#ref(target.clone());
        assert!(matches!(deep.get(), Value::Reactive(r) if r.raw().ptr_eq(&target)));

        let shallow = shallow_ref(target.clone());
        assert!(matches!(shallow.get(), Value::Object(t) if t.ptr_eq(&target)));
    }

    #[test]
    fn writing_the_same_object_is_a_no_op() {
        let target = object([("x", Value::from(1))]);
        let holder = r#ref(target.clone());
        let runs = Rc::new(Cell::new(0));

        let view = holder.clone();
        let runs_clone = runs.clone();
        let _effect = Effect::new(move || {
            view.get();
            runs_clone.set(runs_clone.get() + 1);
        });

        // Storing the wrapper of the same target compares equal on the raw side.
        holder.set(reactive(&target));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn to_ref_forwards_to_the_wrapper() {
        let state = reactive(&object([("name", Value::from("a"))]));
        let name = to_ref(&state, "name");
        let runs = Rc::new(Cell::new(0));

        let view = name.clone();
        let runs_clone = runs.clone();
        let _effect = Effect::new(move || {
            view.get();
            runs_clone.set(runs_clone.get() + 1);
        });

        state.set("name", "b");
        assert_eq!(runs.get(), 2);
        assert_eq!(name.get_untracked(), Value::from("b"));

        name.set("c");
        assert_eq!(runs.get(), 3);
        assert_eq!(state.get("name"), Value::from("c"));
        assert_eq!(name.source(), None);
    }

    #[test]
    fn to_refs_covers_every_key() {
        let state = reactive(&object([("a", Value::from(1)), ("b", Value::from(2))]));
        let refs = to_refs(&state);

        assert_eq!(refs.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        refs["b"].set(20);
        assert_eq!(state.get("b"), Value::from(20));

        let list = reactive(&array([Value::from("x"), Value::from("y")]));
        let refs = to_refs(&list);
        assert_eq!(refs["1"].get(), Value::from("y"));
    }
}
