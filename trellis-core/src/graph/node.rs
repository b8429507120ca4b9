//! Graph Nodes
//!
//! This module defines the identifiers that live in the dependency graph:
//! the tracked source a dependency hangs off, the field inside that source,
//! and the kind of write that triggered a change.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a tracked source (a raw target, a ref, a computed
/// cell or a component's props).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    /// Generate a new unique source ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for SourceId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A field inside a tracked source.
///
/// Arrays use [`Key::Index`] and the [`Key::Length`] pseudo-field, objects use
/// [`Key::Field`]. Refs and computed cells expose a single [`Key::Value`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Field(String),
    Index(usize),
    Length,
    Value,
}

impl Key {
    /// Re-interpret the key for the kind of container it is applied to.
    ///
    /// On arrays an integer-looking field name becomes an index and
    /// `"length"` becomes the length pseudo-field. On objects indexes and
    /// pseudo-fields are plain field names.
    pub fn normalize(self, is_array: bool) -> Key {
        if is_array {
            match self {
                Key::Field(name) if name == "length" => Key::Length,
                Key::Field(name) => match name.parse::<usize>() {
                    Ok(index) if index.to_string() == name => Key::Index(index),
                    _ => Key::Field(name),
                },
                other => other,
            }
        } else {
            match self {
                Key::Index(index) => Key::Field(index.to_string()),
                Key::Length => Key::Field("length".to_string()),
                Key::Value => Key::Field("value".to_string()),
                field => field,
            }
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Field(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{index}"),
            Key::Length => f.write_str("length"),
            Key::Value => f.write_str("value"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Field(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Field(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

/// The kind of write that caused a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOp {
    /// The key did not exist before (or an array index at or past the end).
    Add,
    /// An existing key changed value.
    Set,
}

/// A change notification for one field of a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub op: TriggerOp,
    pub key: Key,
    /// New array length, carried when the length pseudo-field is written.
    pub new_length: Option<usize>,
}

impl Trigger {
    pub fn add(key: Key) -> Self {
        Self { op: TriggerOp::Add, key, new_length: None }
    }

    pub fn set(key: Key) -> Self {
        Self { op: TriggerOp::Set, key, new_length: None }
    }

    /// A write of the array length pseudo-field.
    pub fn length(new_length: usize) -> Self {
        Self {
            op: TriggerOp::Set,
            key: Key::Length,
            new_length: Some(new_length),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_ids_are_unique() {
        let id1 = SourceId::new();
        let id2 = SourceId::new();
        assert_ne!(id1, id2);
        assert!(id1 < id2);
    }

    #[test]
    fn array_keys_normalize_to_indexes() {
        assert_eq!(Key::from("3").normalize(true), Key::Index(3));
        assert_eq!(Key::from("length").normalize(true), Key::Length);
        // Leading zeros are not canonical integers.
        assert_eq!(Key::from("03").normalize(true), Key::Field("03".into()));
        assert_eq!(Key::from("name").normalize(true), Key::Field("name".into()));
    }

    #[test]
    fn object_keys_normalize_to_fields() {
        assert_eq!(Key::Index(2).normalize(false), Key::Field("2".into()));
        assert_eq!(Key::Length.normalize(false), Key::Field("length".into()));
        assert_eq!(Key::from("3").normalize(false), Key::Field("3".into()));
    }

    #[test]
    fn length_trigger_carries_new_length() {
        let trigger = Trigger::length(2);
        assert_eq!(trigger.key, Key::Length);
        assert_eq!(trigger.new_length, Some(2));
        assert_eq!(Trigger::add(Key::Index(5)).op, TriggerOp::Add);
    }
}
