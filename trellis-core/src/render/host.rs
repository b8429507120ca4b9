//! Host Adapter
//!
//! The reconciler never touches a real tree. It drives a [`HostAdapter`],
//! which owns the host nodes and hands out opaque [`HostNode`] handles.

use std::fmt;

use serde::Serialize;

use super::vnode::PropValue;

/// Opaque handle to a node owned by a host adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HostNode(u64);

impl HostNode {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for HostNode {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for HostNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// An event delivered to an `on*` handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Lower-case event name, e.g. `click` for an `onClick` prop.
    pub name: String,
    pub target: HostNode,
}

/// Primitive operations on a host tree.
///
/// Creation is idempotent from the reconciler's point of view: every call
/// returns a fresh detached node. `insert` with an anchor places the node
/// before the anchor; without one it appends. Inserting a node that is
/// already attached moves it.
pub trait HostAdapter {
    fn create_element(&self, tag: &str) -> HostNode;

    fn create_text(&self, text: &str) -> HostNode;

    fn insert(&self, node: HostNode, parent: HostNode, anchor: Option<HostNode>);

    fn remove(&self, node: HostNode);

    /// Replace the content of an element with text.
    fn set_element_text(&self, node: HostNode, text: &str);

    /// Set the content of a text node.
    fn set_text(&self, node: HostNode, text: &str);

    /// Apply a prop change. `next` is `None` when the prop was removed.
    fn patch_prop(&self, el: HostNode, key: &str, prev: Option<&PropValue>, next: Option<&PropValue>);

    fn query_selector(&self, selector: &str) -> Option<HostNode>;

    fn next_sibling(&self, node: HostNode) -> Option<HostNode>;
}
