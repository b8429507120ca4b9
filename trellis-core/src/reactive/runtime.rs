//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects tracked sources to
//! effects. It owns the dependency graph and dispatches notifications when a
//! source changes.
//!
//! # How It Works
//!
//! 1. When a tracked source is read inside a running effect, the runtime
//!    records `(source, key) -> effect` in the graph.
//!
//! 2. When a source is written, the runtime:
//!    a. Collects the effects subscribed to the written key (plus the array
//!       length/index cross-links)
//!    b. Hands each effect to its scheduler, or runs it synchronously
//!
//! # Thread Safety
//!
//! The graph is thread-local. Reactivity is single-threaded and cooperative,
//! so the only discipline required is releasing the graph borrow before any
//! effect runs.

use std::cell::RefCell;

use tracing::trace;

use super::context::ReactiveContext;
use super::{Effect, SubscriberId};
use crate::graph::{DependencyGraph, Key, SourceId, Trigger};

thread_local! {
    static GRAPH: RefCell<DependencyGraph> = RefCell::new(DependencyGraph::new());
}

/// The reactive runtime.
///
/// All state lives in thread-local storage; this type only namespaces the
/// operations.
pub struct Runtime;

impl Runtime {
    /// Record that the running effect (if any) depends on `(source, key)`.
    pub fn track(source: SourceId, key: Key) {
        let Some(effect) = ReactiveContext::current() else {
            return;
        };
        if !effect.is_active() {
            return;
        }

        let added = GRAPH.with(|graph| graph.borrow_mut().add(source, key.clone(), &effect));
        if added {
            effect.record_dependency(source, key);
        }
    }

    /// Notify every effect depending on the changed key.
    pub fn trigger(source: SourceId, trigger: Trigger) {
        let effects = GRAPH.with(|graph| graph.borrow().collect(source, &trigger));
        if effects.is_empty() {
            return;
        }

        trace!(
            source = source.raw(),
            key = %trigger.key,
            op = ?trigger.op,
            effects = effects.len(),
            "triggering effects"
        );

        for effect in effects {
            effect.schedule();
        }
    }

    /// Remove an effect from the given graph entries.
    pub fn untrack(subscriber_id: SubscriberId, dependencies: &[(SourceId, Key)]) {
        // Stopping can happen from a drop while the graph itself is being
        // mutated; the entries being dropped then go away with it.
        let _ = GRAPH.try_with(|graph| {
            if let Ok(mut graph) = graph.try_borrow_mut() {
                for (source, key) in dependencies {
                    graph.remove(*source, key, subscriber_id);
                }
            }
        });
    }

    /// Drop every graph entry of a disposed source.
    pub fn forget_source(source: SourceId) {
        // Sources may be dropped during thread teardown, after the graph.
        let _ = GRAPH.try_with(|graph| {
            if let Ok(mut graph) = graph.try_borrow_mut() {
                graph.remove_source(source);
            }
        });
    }

    /// Number of effects subscribed to `(source, key)`.
    pub fn subscriber_count(source: SourceId, key: &Key) -> usize {
        GRAPH.with(|graph| graph.borrow().subscriber_count(source, key))
    }

    /// Whether the graph holds entries for `source`.
    pub fn is_tracked(source: SourceId) -> bool {
        GRAPH.with(|graph| graph.borrow().contains_source(source))
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a reactive context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }

    /// Run `f` with tracking paused: reads inside it subscribe nothing,
    /// not even the effect that is running around it.
    pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
        let blank = Effect::new_lazy(|| {});
        blank.stop();
        let _ctx = ReactiveContext::enter(&blank);
        f()
    }
}
