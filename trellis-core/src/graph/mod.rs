//! Dependency Graph
//!
//! This module holds the table that connects tracked sources to the effects
//! that read them, and the job queue that batches effect re-runs.
//!
//! # Overview
//!
//! The dependency graph maps `source -> key -> effects`:
//!
//! - A source is a wrapped object or array, a ref, or a computed, named by a
//!   [`SourceId`]
//! - A key is a field of that source ([`Key`])
//! - The effects are every computation that read the key while running
//!
//! When a key is written, the graph answers which effects must be notified
//! for a [`Trigger`]. Arrays cross-link `length` and index keys:
//!
//! - Setting `length` to `L` notifies `length` readers and readers of every
//!   index `>= L`
//! - Adding an index past the end notifies `length` readers
//!
//! # Design Decisions
//!
//! 1. Entries are created lazily on the first tracked read and are never
//!    pruned on re-run. They go away when an effect is stopped or the source
//!    is dropped.
//!
//! 2. Subscriber sets keep insertion order so notification order is stable.
//!
//! # Flushing
//!
//! Effects with a scheduler (component renders among them) only queue a job
//! when notified. Nothing drains the queue on its own: embedders inside a
//! tokio `LocalSet` should install a flush hook that spawns [`tick`], so
//! every burst of writes is followed by exactly one flush:
//!
//! ```no_run
//! use trellis_core::graph::{scheduler::set_flush_hook, tick};
//!
//! # async fn run() {
//! let local = tokio::task::LocalSet::new();
//! local
//!     .run_until(async {
//!         set_flush_hook(|| {
//!             tokio::task::spawn_local(tick());
//!         });
//!         // mount apps and handle events here
//!     })
//!     .await;
//! # }
//! ```
//!
//! Embedders without an async runtime call [`flush_jobs`] after each unit
//! of work instead.

mod deps;
mod node;
pub mod scheduler;

pub use deps::DependencyGraph;
pub use node::{Key, SourceId, Trigger, TriggerOp};
pub use scheduler::{flush_jobs, queue_job, tick};
