//! Reactive Primitives
//!
//! This module implements the reactive data layer: wrapped state, refs,
//! computed values, and effects. These primitives form the foundation of
//! Trellis's rendering: every component render is an effect.
//!
//! # Concepts
//!
//! ## Reactive wrappers
//!
//! A [`Reactive`] wraps a raw [`Target`] (object or array). Reading a field
//! through the wrapper inside a running effect registers that effect as a
//! dependent of the field. Writing a field notifies every dependent.
//!
//! ## Refs
//!
//! A [`Ref`] boxes a single value behind a tracked `value` field.
//!
//! ## Computeds
//!
//! A [`Computed`] is a derived value that caches its result. It re-evaluates
//! only when one of its dependencies changed and it is read again.
//!
//! ## Effects
//!
//! An [`Effect`] is a side-effecting computation that runs whenever its
//! dependencies change, either synchronously or through a custom scheduler
//! such as the batching job queue.
//!
//! # Implementation Notes
//!
//! Dependency tracking is automatic. A thread-local stack of running effects
//! decides which effect a read is attributed to; see [`ReactiveContext`].

mod computed;
mod context;
mod effect;
mod proxy;
mod refs;
mod runtime;
mod subscriber;
mod value;

pub use computed::{computed, computed_with, Computed};
pub use context::ReactiveContext;
pub use effect::{effect, Effect, EffectOptions, SchedulerFn};
pub use proxy::{
    reactive, readonly, shallow_reactive, shallow_readonly, wrap, Reactive, WrapFlags, MAX_ARRAY_LENGTH,
};
pub use refs::{r#ref, shallow_ref, to_ref, to_refs, Ref};
pub use runtime::Runtime;
pub use subscriber::SubscriberId;
pub use value::{array, object, Data, Target, Value};
