//! Dependency Table
//!
//! Maps `source -> (field -> effects)`. Entries are created lazily the first
//! time an effect reads a field and live until the source is forgotten or
//! the effect is stopped.

use std::collections::HashMap;

use indexmap::IndexMap;

use super::node::{Key, SourceId, Trigger, TriggerOp};
use crate::reactive::{Effect, SubscriberId};

type Subscribers = IndexMap<SubscriberId, Effect>;

/// The table from `(source, field)` to subscribed effects.
#[derive(Default)]
pub struct DependencyGraph {
    sources: HashMap<SourceId, IndexMap<Key, Subscribers>>,
}

impl DependencyGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `effect` to `(source, key)`.
    ///
    /// Returns `true` if the subscription is new.
    pub fn add(&mut self, source: SourceId, key: Key, effect: &Effect) -> bool {
        let subscribers = self
            .sources
            .entry(source)
            .or_default()
            .entry(key)
            .or_default();

        if subscribers.contains_key(&effect.id()) {
            return false;
        }
        subscribers.insert(effect.id(), effect.clone());
        true
    }

    /// Remove one subscription.
    pub fn remove(&mut self, source: SourceId, key: &Key, effect: SubscriberId) {
        if let Some(fields) = self.sources.get_mut(&source) {
            if let Some(subscribers) = fields.get_mut(key) {
                subscribers.shift_remove(&effect);
            }
        }
    }

    /// Drop every entry of a source.
    pub fn remove_source(&mut self, source: SourceId) {
        self.sources.remove(&source);
    }

    /// Collect the effects a change must notify, deduplicated, in
    /// subscription order.
    ///
    /// Writing an array's length notifies the length subscribers and the
    /// subscribers of every index at or past the new length. Adding an index
    /// also notifies the length subscribers.
    pub fn collect(&self, source: SourceId, trigger: &Trigger) -> Vec<Effect> {
        let Some(fields) = self.sources.get(&source) else {
            return Vec::new();
        };

        let mut effects: Subscribers = IndexMap::new();
        let mut add = |subscribers: &Subscribers| {
            for (id, effect) in subscribers {
                effects.entry(*id).or_insert_with(|| effect.clone());
            }
        };

        match (&trigger.key, trigger.new_length) {
            (Key::Length, Some(new_length)) => {
                for (key, subscribers) in fields {
                    match key {
                        Key::Length => add(subscribers),
                        Key::Index(index) if *index >= new_length => add(subscribers),
                        _ => {}
                    }
                }
            }
            (key, _) => {
                if let Some(subscribers) = fields.get(key) {
                    add(subscribers);
                }
                if trigger.op == TriggerOp::Add && matches!(key, Key::Index(_)) {
                    if let Some(subscribers) = fields.get(&Key::Length) {
                        add(subscribers);
                    }
                }
            }
        }

        effects.into_values().collect()
    }

    /// Number of effects subscribed to `(source, key)`.
    pub fn subscriber_count(&self, source: SourceId, key: &Key) -> usize {
        self.sources
            .get(&source)
            .and_then(|fields| fields.get(key))
            .map_or(0, |subscribers| subscribers.len())
    }

    /// Whether the graph holds any entry for `source`.
    pub fn contains_source(&self, source: SourceId) -> bool {
        self.sources.contains_key(&source)
    }

    /// Number of sources with at least one tracked field.
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}
