//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis reactive rendering
//! framework. It implements:
//!
//! - Reactive state (proxied objects and arrays, refs, computed values)
//! - Effects with automatic dependency tracking
//! - A batching job scheduler
//! - Virtual nodes and a keyed reconciler
//! - Components and app bootstrap over a pluggable host adapter
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: Dependency bookkeeping and the job scheduler
//! - `reactive`: Reactive wrappers, effects, refs and computed values
//! - `render`: Virtual nodes, host adapters and the reconciler
//! - `error`: Errors surfaced by app mounting
//!
//! # Example
//!
//! ```rust
//! use trellis_core::reactive::{effect, object, reactive, EffectOptions, Value};
//!
//! let state = reactive(&object([("count", Value::from(0))]));
//!
//! let watcher = state.clone();
//! let logger = effect(
//!     move || println!("count is {}", watcher.get("count")),
//!     EffectOptions::default(),
//! );
//!
//! state.set("count", 5);
//! // Effect reruns synchronously, prints: "count is 5"
//! assert_eq!(logger.run_count(), 2);
//! ```

pub mod error;
pub mod graph;
pub mod reactive;
pub mod render;

pub use error::{RenderError, Result};
pub use graph::{flush_jobs, queue_job, tick};
pub use reactive::{
    computed, effect, reactive, readonly, r#ref, shallow_reactive, shallow_readonly, Computed, Effect,
    EffectOptions, Reactive, Ref, Value,
};
pub use render::{create_renderer, define_component, h, text, App, Component, HostAdapter, MemoryHost, Renderer, VNode};
