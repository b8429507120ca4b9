//! Reactive Wrappers
//!
//! A [`Reactive`] wraps a raw [`Target`] and intercepts reads and writes:
//!
//! - A read of key `k` registers the running effect as a dependent of
//!   `(target, k)` unless the wrapper is read-only. Nested objects come back
//!   wrapped with the same read-only-ness, unless the wrapper is shallow.
//! - A write distinguishes *addition* (new key, or an array index at or past
//!   the end) from *update* (existing key whose value changed). No-op writes
//!   do not notify. Writes through a read-only wrapper are rejected with a
//!   diagnostic and leave the target untouched.
//!
//! # Identity
//!
//! Each raw target has at most one wrapper per [`WrapFlags`] combination.
//! Wrapping the same target twice returns the same wrapper while it is
//! alive, so wrappers can be compared with [`Reactive::ptr_eq`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::warn;

use super::runtime::Runtime;
use super::value::{Data, Target, Value};
use crate::graph::{Key, SourceId, Trigger};

/// Largest length an array wrapper accepts. Indices must stay below it.
pub const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

/// How a target is wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WrapFlags {
    pub readonly: bool,
    pub shallow: bool,
}

impl WrapFlags {
    pub const MUTABLE: WrapFlags = WrapFlags { readonly: false, shallow: false };
    pub const READONLY: WrapFlags = WrapFlags { readonly: true, shallow: false };
    pub const SHALLOW: WrapFlags = WrapFlags { readonly: false, shallow: true };
    pub const SHALLOW_READONLY: WrapFlags = WrapFlags { readonly: true, shallow: true };
}

thread_local! {
    static WRAPPERS: RefCell<HashMap<(SourceId, WrapFlags), Weak<ProxyInner>>> =
        RefCell::new(HashMap::new());
}

/// Drop the cache entries of a disposed target.
pub(crate) fn forget_target(id: SourceId) {
    let _ = WRAPPERS.try_with(|wrappers| {
        if let Ok(mut wrappers) = wrappers.try_borrow_mut() {
            wrappers.retain(|(source, _), _| *source != id);
        }
    });
}

struct ProxyInner {
    target: Target,
    flags: WrapFlags,
}

/// A tracked view over a raw object or array.
#[derive(Clone)]
pub struct Reactive {
    inner: Rc<ProxyInner>,
}

/// Wrap a target, reusing the cached wrapper for these flags if one exists.
pub fn wrap(target: &Target, flags: WrapFlags) -> Reactive {
    let cache_key = (target.id(), flags);

    let cached = WRAPPERS.with(|wrappers| {
        wrappers
            .borrow()
            .get(&cache_key)
            .and_then(Weak::upgrade)
    });
    if let Some(inner) = cached {
        return Reactive { inner };
    }

    let inner = Rc::new(ProxyInner {
        target: target.clone(),
        flags,
    });
    WRAPPERS.with(|wrappers| {
        wrappers
            .borrow_mut()
            .insert(cache_key, Rc::downgrade(&inner));
    });
    Reactive { inner }
}

/// Deep, mutable wrapper.
pub fn reactive(target: &Target) -> Reactive {
    wrap(target, WrapFlags::MUTABLE)
}

/// Deep, read-only wrapper. Reads are not tracked.
pub fn readonly(target: &Target) -> Reactive {
    wrap(target, WrapFlags::READONLY)
}

/// Mutable wrapper whose nested objects are returned raw.
pub fn shallow_reactive(target: &Target) -> Reactive {
    wrap(target, WrapFlags::SHALLOW)
}

/// Read-only wrapper whose nested objects are returned raw.
pub fn shallow_readonly(target: &Target) -> Reactive {
    wrap(target, WrapFlags::SHALLOW_READONLY)
}

impl Reactive {
    /// The wrapped raw target.
    pub fn raw(&self) -> Target {
        self.inner.target.clone()
    }

    pub fn id(&self) -> SourceId {
        self.inner.target.id()
    }

    pub fn flags(&self) -> WrapFlags {
        self.inner.flags
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.flags.readonly
    }

    pub fn is_shallow(&self) -> bool {
        self.inner.flags.shallow
    }

    pub fn is_array(&self) -> bool {
        self.inner.target.is_array()
    }

    /// Whether two wrappers are the same instance.
    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Read a field, tracking it unless the wrapper is read-only.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let target = &self.inner.target;
        let key = key.into().normalize(target.is_array());

        let value = match (&*target.data(), &key) {
            (Data::Object(fields), Key::Field(name)) => {
                fields.get(name).cloned().unwrap_or_default()
            }
            (Data::Array(items), Key::Index(index)) => {
                items.get(*index).cloned().unwrap_or_default()
            }
            (Data::Array(items), Key::Length) => Value::from(items.len()),
            _ => Value::Null,
        };

        if !self.inner.flags.readonly {
            Runtime::track(target.id(), key);
        }

        match value {
            Value::Object(nested) if !self.inner.flags.shallow => {
                let flags = WrapFlags {
                    readonly: self.inner.flags.readonly,
                    shallow: false,
                };
                Value::Reactive(wrap(&nested, flags))
            }
            other => other,
        }
    }

    /// Write a field.
    ///
    /// Returns `false` if the write was rejected (read-only wrapper, or a key
    /// that does not fit the container).
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        let target = &self.inner.target;
        let key = key.into().normalize(target.is_array());

        if self.inner.flags.readonly {
            warn!(key = %key, "set on key {key} failed: target is readonly");
            return false;
        }

        let value = value.into().into_raw();
        let trigger = {
            let mut data = target.data_mut();
            match (&mut *data, &key) {
                (Data::Object(fields), Key::Field(name)) => {
                    match fields.insert(name.clone(), value.clone()) {
                        None => Some(Trigger::add(key.clone())),
                        Some(old) if old != value => Some(Trigger::set(key.clone())),
                        Some(_) => None,
                    }
                }
                (Data::Array(items), Key::Index(index)) => {
                    let index = *index;
                    if index >= MAX_ARRAY_LENGTH {
                        warn!(index, "array index out of range");
                        return false;
                    }
                    if index >= items.len() {
                        items.resize(index, Value::Null);
                        items.push(value);
                        Some(Trigger::add(key.clone()))
                    } else {
                        let old = std::mem::replace(&mut items[index], value.clone());
                        (old != value).then(|| Trigger::set(key.clone()))
                    }
                }
                (Data::Array(items), Key::Length) => {
                    let Some(new_length) = value
                        .as_f64()
                        .filter(|length| {
                            *length >= 0.0
                                && length.fract() == 0.0
                                && *length <= MAX_ARRAY_LENGTH as f64
                        })
                    else {
                        warn!(value = ?value, "invalid array length");
                        return false;
                    };
                    let new_length = new_length as usize;
                    if new_length == items.len() {
                        None
                    } else {
                        items.resize(new_length, Value::Null);
                        Some(Trigger::length(new_length))
                    }
                }
                _ => {
                    warn!(key = %key, "key {key} does not apply to this target");
                    return false;
                }
            }
        };

        if let Some(trigger) = trigger {
            Runtime::trigger(target.id(), trigger);
        }
        true
    }

    /// Append to an array wrapper.
    pub fn push(&self, value: impl Into<Value>) -> bool {
        let next = self.inner.target.len();
        self.set(Key::Index(next), value)
    }

    /// Length of an array (tracked), or number of fields of an object.
    pub fn len(&self) -> usize {
        if self.is_array() {
            self.get(Key::Length).as_f64().unwrap_or_default() as usize
        } else {
            self.inner.target.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the target currently holds `key`, untracked.
    pub fn contains_key(&self, key: impl Into<Key>) -> bool {
        let target = &self.inner.target;
        let key = key.into().normalize(target.is_array());
        match (&*target.data(), &key) {
            (Data::Object(fields), Key::Field(name)) => fields.contains_key(name),
            (Data::Array(items), Key::Index(index)) => *index < items.len(),
            (Data::Array(_), Key::Length) => true,
            _ => false,
        }
    }

    /// Current keys, untracked.
    pub fn keys(&self) -> Vec<Key> {
        match &*self.inner.target.data() {
            Data::Object(fields) => fields.keys().cloned().map(Key::Field).collect(),
            Data::Array(items) => (0..items.len()).map(Key::Index).collect(),
        }
    }

    /// Snapshot of the raw data as JSON, untracked.
    pub fn to_json(&self) -> serde_json::Value {
        Value::Object(self.raw()).to_json()
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("target", &self.inner.target)
            .field("flags", &self.inner.flags)
            .finish()
    }
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
    use tracing_test::traced_test;

    fn counting_effect<F>(read: F) -> (Effect, Rc<Cell<usize>>)
    where
        F: Fn() + 'static,
    {
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let effect = Effect::new(move || {
            read();
            runs_clone.set(runs_clone.get() + 1);
        });
        (effect, runs)
    }

    #[test]
    fn wrapping_twice_returns_the_same_wrapper() {
        let target = object([("a", Value::from(1))]);

        assert!(reactive(&target).ptr_eq(&reactive(&target)));
        assert!(readonly(&target).ptr_eq(&readonly(&target)));
        assert!(!reactive(&target).ptr_eq(&readonly(&target)));
    }

    #[test]
    fn nested_objects_are_wrapped_with_the_same_kind() {
        let target = Target::from_json(serde_json::json!({"inner": {"x": 1}})).unwrap();

        let nested = reactive(&target).get("inner");
        let nested = nested.as_reactive().expect("wrapped");
        assert!(!nested.is_readonly());
        assert!(nested.ptr_eq(reactive(&target).get("inner").as_reactive().unwrap()));

        let frozen = readonly(&target).get("inner");
        assert!(frozen.as_reactive().expect("wrapped").is_readonly());

        assert!(matches!(shallow_reactive(&target).get("inner"), Value::Object(_)));
    }

    #[test]
    fn write_reruns_dependent_effect() {
        let state = reactive(&object([("count", Value::from(0))]));
        let view = state.clone();
        let (_effect, runs) = counting_effect(move || {
            view.get("count");
        });

        state.set("count", 1);
        assert_eq!(runs.get(), 2);

        // Same value: no notification.
        state.set("count", 1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn adding_a_field_notifies_its_readers() {
        let state = reactive(&Target::object());
        let view = state.clone();
        let (_effect, runs) = counting_effect(move || {
            view.get("late");
        });

        assert!(state.set("late", "here"));
        assert_eq!(runs.get(), 2);
        assert_eq!(state.get("late"), Value::from("here"));
    }

    #[test]
    fn deep_writes_track_nested_targets() {
        let state = reactive(&Target::from_json(serde_json::json!({"user": {"name": "a"}})).unwrap());
        let view = state.clone();
        let (_effect, runs) = counting_effect(move || {
            if let Value::Reactive(user) = view.get("user") {
                user.get("name");
            }
        });

        let user = state.get("user");
        user.as_reactive().unwrap().set("name", "b");
        assert_eq!(runs.get(), 2);
    }

    #[test]
    #[traced_test]
    fn readonly_write_is_rejected_with_diagnostic() {
        let target = object([("count", Value::from(0))]);
        let frozen = readonly(&target);

        assert!(!frozen.set("count", 5));
        assert_eq!(frozen.get("count"), Value::from(0));
        assert!(logs_contain("target is readonly"));
    }

    #[test]
    fn readonly_reads_are_not_tracked() {
        let target = object([("count", Value::from(0))]);
        let frozen = readonly(&target);
        let view = frozen.clone();
        let (effect, _runs) = counting_effect(move || {
            view.get("count");
        });

        assert_eq!(effect.dependency_count(), 0);
    }

    #[test]
    fn length_truncation_notifies_truncated_index_readers() {
        let list = reactive(&array((0..5).map(Value::from)));
        let view = list.clone();
        let (_effect, runs) = counting_effect(move || {
            view.get(3usize);
        });

        list.set(Key::Length, 10);
        assert_eq!(runs.get(), 1);
        assert_eq!(list.raw().len(), 10);

        list.set("length", 2);
        assert_eq!(runs.get(), 2);
        assert_eq!(list.get(3usize), Value::Null);
    }

    #[test]
    #[traced_test]
    fn out_of_range_lengths_and_indices_are_rejected() {
        let list = reactive(&array([Value::from(1)]));
        let view = list.clone();
        let (_effect, runs) = counting_effect(move || {
            view.len();
        });

        assert!(!list.set(Key::Length, 1e300));
        assert!(!list.set(Key::Length, MAX_ARRAY_LENGTH as f64 + 1.0));
        assert!(logs_contain("invalid array length"));

        assert!(!list.set(usize::MAX, 1));
        assert!(!list.set(MAX_ARRAY_LENGTH, 1));
        assert!(logs_contain("array index out of range"));

        assert_eq!(list.raw().len(), 1);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn dropping_the_last_handle_forgets_the_target() {
        let state = reactive(&object([("n", Value::from(1))]));
        let id = state.id();
        let view = state.clone();
        let (effect, _runs) = counting_effect(move || {
            view.get("n");
        });
        assert!(Runtime::is_tracked(id));

        effect.stop();
        drop(effect);
        drop(state);

        assert!(!Runtime::is_tracked(id));
        assert!(WRAPPERS.with(|wrappers| !wrappers.borrow().keys().any(|(source, _)| *source == id)));
    }

    #[test]
    #[traced_test]
    fn shallow_readonly_returns_raw_nested_targets() {
        let target = Target::from_json(serde_json::json!({"n": {"x": 1}})).unwrap();
        let view = shallow_readonly(&target);

        assert!(view.is_readonly() && view.is_shallow());
        assert!(matches!(view.get("n"), Value::Object(_)));

        assert!(!view.set("n", 2));
        assert!(logs_contain("target is readonly"));
        assert!(matches!(reactive(&target).get("n"), Value::Reactive(_)));
    }

    #[test]
    fn appending_notifies_length_readers() {
        let list = reactive(&array([Value::from("a")]));
        let view = list.clone();
        let (_effect, runs) = counting_effect(move || {
            view.len();
        });

        list.push("b");
        assert_eq!(runs.get(), 2);

        // Overwriting an existing slot does not change the length.
        list.set(0usize, "z");
        assert_eq!(runs.get(), 2);

        // Writing past the end pads with nulls.
        list.set(5usize, "f");
        assert_eq!(runs.get(), 3);
        assert_eq!(list.raw().len(), 6);
        assert_eq!(list.get("4"), Value::Null);
    }

    #[test]
    fn storing_a_wrapper_stores_the_raw_target() {
        let child = Target::object();
        let parent = reactive(&Target::object());

        parent.set("child", reactive(&child));
        let stored = parent.raw();
        let data = stored.data();
        match &*data {
            Data::Object(fields) => assert!(matches!(fields.get("child"), Some(Value::Object(t)) if t.ptr_eq(&child))),
            Data::Array(_) => unreachable!(),
        }
    }

    #[test]
    fn keys_follow_insertion_order() {
        let state = reactive(&object([("b", Value::from(1)), ("a", Value::from(2))]));
        assert_eq!(state.keys(), vec![Key::from("b"), Key::from("a")]);
    }
}
