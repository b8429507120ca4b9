//! Rendering
//!
//! Virtual nodes, the host adapter boundary, and the reconciler that turns
//! one into calls on the other.
//!
//! # Concepts
//!
//! ## Virtual nodes
//!
//! A [`VNode`] describes one node of the host tree. Render functions build a
//! fresh tree on every run with [`h`] and [`text`].
//!
//! ## Host adapters
//!
//! The reconciler only talks to a [`HostAdapter`]. [`MemoryHost`] is a
//! complete in-memory implementation.
//!
//! ## Components
//!
//! A [`Component`] renders inside an effect. When state it read changes, the
//! effect is queued on the job scheduler and re-renders once per flush.

mod app;
mod component;
mod host;
mod memory;
mod renderer;
mod sequence;
mod shape;
mod vnode;

pub use app::{App, MountTarget};
pub use component::{
    define_component, Component, ComponentDefinition, ComponentInstance, ComponentProps, RenderContext, RenderFn,
    SetupContext, SetupFn, SetupResult,
};
pub use host::{Event, HostAdapter, HostNode};
pub use memory::{HostOp, MemoryHost};
pub use renderer::{create_renderer, Renderer};
pub use sequence::{longest_increasing_subsequence, Sequence};
pub use shape::ShapeFlags;
pub use vnode::{create_vnode, h, normalize, text, Child, Children, DiffKey, EventHandler, PropValue, Props, VNode, VNodeType, KEY_PROP};
