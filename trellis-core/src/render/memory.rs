//! In-Memory Host
//!
//! [`MemoryHost`] is a complete [`HostAdapter`] over an arena of nodes. It
//! records every mutating call in an operation log, so tests can count
//! exactly what the reconciler did, and it serializes subtrees to HTML for
//! assertions.
//!
//! Prop handling follows the usual DOM split:
//!
//! - `class` sets the class attribute (removal sets it empty)
//! - `style` merges entries, removing entries absent from the new map
//! - `on*` props bind a stable invoker per event; a changed handler only
//!   swaps the invoker's callback
//! - anything else is a plain attribute

use std::cell::RefCell;
use std::fmt::Write as _;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::trace;

use super::host::{Event, HostAdapter, HostNode};
use super::vnode::{EventHandler, PropValue};

/// One recorded host mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HostOp {
    CreateElement { node: HostNode, tag: String },
    CreateText { node: HostNode, text: String },
    Insert {
        node: HostNode,
        parent: HostNode,
        anchor: Option<HostNode>,
        /// The node was already attached, so this insert is a move.
        moved: bool,
    },
    Remove { node: HostNode },
    SetElementText { node: HostNode, text: String },
    SetText { node: HostNode, text: String },
    PatchProp { node: HostNode, key: String },
}

impl HostOp {
    pub fn is_move(&self) -> bool {
        matches!(self, HostOp::Insert { moved: true, .. })
    }

    pub fn is_create(&self) -> bool {
        matches!(self, HostOp::CreateElement { .. } | HostOp::CreateText { .. })
    }
}

#[derive(Debug)]
enum NodeKind {
    Element(String),
    Text,
}

/// Stable listener whose callback can be swapped.
struct Invoker {
    handler: RefCell<EventHandler>,
}

struct NodeData {
    kind: NodeKind,
    /// Text of a text node, or text content set on an element.
    text: String,
    parent: Option<HostNode>,
    children: Vec<HostNode>,
    attrs: IndexMap<String, String>,
    style: IndexMap<String, String>,
    listeners: IndexMap<String, Invoker>,
}

impl NodeData {
    fn new(kind: NodeKind, text: &str) -> Self {
        Self {
            kind,
            text: text.to_string(),
            parent: None,
            children: Vec::new(),
            attrs: IndexMap::new(),
            style: IndexMap::new(),
            listeners: IndexMap::new(),
        }
    }
}

fn is_event_prop(key: &str) -> bool {
    key.len() > 2
        && key.starts_with("on")
        && !key[2..].starts_with(|c: char| c.is_ascii_lowercase())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// An in-memory host tree.
#[derive(Default)]
pub struct MemoryHost {
    nodes: RefCell<Vec<NodeData>>,
    ops: RefCell<Vec<HostOp>>,
    roots: RefCell<IndexMap<String, HostNode>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached `div` reachable through the `#id` selector.
    ///
    /// Not recorded in the operation log.
    pub fn create_root(&self, id: &str) -> HostNode {
        let node = self.alloc(NodeData::new(NodeKind::Element("div".to_string()), ""));
        self.with_node_mut(node, |data| {
            data.attrs.insert("id".to_string(), id.to_string());
        });
        self.roots.borrow_mut().insert(format!("#{id}"), node);
        node
    }

    /// All recorded operations.
    pub fn ops(&self) -> Vec<HostOp> {
        self.ops.borrow().clone()
    }

    /// Drain the operation log.
    pub fn take_ops(&self) -> Vec<HostOp> {
        self.ops.take()
    }

    pub fn clear_ops(&self) {
        self.ops.borrow_mut().clear();
    }

    pub fn node_count(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn parent(&self, node: HostNode) -> Option<HostNode> {
        self.with_node(node, |data| data.parent).flatten()
    }

    pub fn children(&self, node: HostNode) -> Vec<HostNode> {
        self.with_node(node, |data| data.children.clone())
            .unwrap_or_default()
    }

    pub fn tag(&self, node: HostNode) -> Option<String> {
        self.with_node(node, |data| match &data.kind {
            NodeKind::Element(tag) => Some(tag.clone()),
            NodeKind::Text => None,
        })
        .flatten()
    }

    pub fn attribute(&self, node: HostNode, name: &str) -> Option<String> {
        self.with_node(node, |data| data.attrs.get(name).cloned())
            .flatten()
    }

    pub fn style(&self, node: HostNode, name: &str) -> Option<String> {
        self.with_node(node, |data| data.style.get(name).cloned())
            .flatten()
    }

    pub fn has_listener(&self, node: HostNode, event: &str) -> bool {
        self.with_node(node, |data| data.listeners.contains_key(event))
            .unwrap_or(false)
    }

    /// Concatenated text of a subtree.
    pub fn text_content(&self, node: HostNode) -> String {
        let nodes = self.nodes.borrow();
        let mut out = String::new();
        Self::collect_text(&nodes, node, &mut out);
        out
    }

    fn collect_text(nodes: &[NodeData], node: HostNode, out: &mut String) {
        let Some(data) = nodes.get(node.raw() as usize) else {
            return;
        };
        out.push_str(&data.text);
        for child in &data.children {
            Self::collect_text(nodes, *child, out);
        }
    }

    /// Serialize a subtree as HTML.
    pub fn to_html(&self, node: HostNode) -> String {
        let nodes = self.nodes.borrow();
        let mut out = String::new();
        Self::write_html(&nodes, node, &mut out);
        out
    }

    fn write_html(nodes: &[NodeData], node: HostNode, out: &mut String) {
        let Some(data) = nodes.get(node.raw() as usize) else {
            return;
        };
        match &data.kind {
            NodeKind::Text => out.push_str(&escape(&data.text)),
            NodeKind::Element(tag) => {
                let _ = write!(out, "<{tag}");
                for (name, value) in &data.attrs {
                    let _ = write!(out, " {name}=\"{}\"", escape(value));
                }
                if !data.style.is_empty() {
                    let style = data
                        .style
                        .iter()
                        .map(|(name, value)| format!("{name}: {value}"))
                        .collect::<Vec<_>>()
                        .join("; ");
                    let _ = write!(out, " style=\"{}\"", escape(&style));
                }
                out.push('>');
                out.push_str(&escape(&data.text));
                for child in &data.children {
                    Self::write_html(nodes, *child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    /// Deliver an event to the node's listener.
    ///
    /// Returns `false` if no listener is bound for the event.
    pub fn dispatch(&self, node: HostNode, event: &str) -> bool {
        let handler = self
            .with_node(node, |data| {
                data.listeners
                    .get(event)
                    .map(|invoker| invoker.handler.borrow().clone())
            })
            .flatten();

        match handler {
            Some(handler) => {
                handler.call(&Event {
                    name: event.to_string(),
                    target: node,
                });
                true
            }
            None => false,
        }
    }

    fn alloc(&self, data: NodeData) -> HostNode {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(data);
        HostNode::from((nodes.len() - 1) as u64)
    }

    fn record(&self, op: HostOp) {
        trace!(?op, "host op");
        self.ops.borrow_mut().push(op);
    }

    fn with_node<R>(&self, node: HostNode, f: impl FnOnce(&NodeData) -> R) -> Option<R> {
        self.nodes.borrow().get(node.raw() as usize).map(f)
    }

    fn with_node_mut<R>(&self, node: HostNode, f: impl FnOnce(&mut NodeData) -> R) -> Option<R> {
        self.nodes.borrow_mut().get_mut(node.raw() as usize).map(f)
    }

    fn detach(nodes: &mut [NodeData], node: HostNode) {
        let Some(parent) = nodes.get_mut(node.raw() as usize).and_then(|data| data.parent.take()) else {
            return;
        };
        if let Some(parent) = nodes.get_mut(parent.raw() as usize) {
            parent.children.retain(|child| *child != node);
        }
    }

    fn patch_style(data: &mut NodeData, prev: Option<&PropValue>, next: Option<&PropValue>) {
        let Some(PropValue::Style(next)) = next else {
            data.style.clear();
            return;
        };
        if let Some(PropValue::Style(prev)) = prev {
            for key in prev.keys() {
                if !next.contains_key(key) {
                    data.style.shift_remove(key);
                }
            }
        }
        for (key, value) in next {
            data.style.insert(key.clone(), value.clone());
        }
    }

    fn patch_event(data: &mut NodeData, key: &str, next: Option<&PropValue>) {
        let event = key[2..].to_ascii_lowercase();
        match next.and_then(PropValue::as_handler) {
            Some(handler) => match data.listeners.get(&event) {
                Some(invoker) => *invoker.handler.borrow_mut() = handler.clone(),
                None => {
                    data.listeners.insert(
                        event,
                        Invoker {
                            handler: RefCell::new(handler.clone()),
                        },
                    );
                }
            },
            None => {
                data.listeners.shift_remove(&event);
            }
        }
    }
}

impl HostAdapter for MemoryHost {
    fn create_element(&self, tag: &str) -> HostNode {
        let node = self.alloc(NodeData::new(NodeKind::Element(tag.to_string()), ""));
        self.record(HostOp::CreateElement {
            node,
            tag: tag.to_string(),
        });
        node
    }

    fn create_text(&self, text: &str) -> HostNode {
        let node = self.alloc(NodeData::new(NodeKind::Text, text));
        self.record(HostOp::CreateText {
            node,
            text: text.to_string(),
        });
        node
    }

    fn insert(&self, node: HostNode, parent: HostNode, anchor: Option<HostNode>) {
        let moved = {
            let mut nodes = self.nodes.borrow_mut();
            let moved = nodes
                .get(node.raw() as usize)
                .is_some_and(|data| data.parent.is_some());
            Self::detach(&mut nodes, node);

            if let Some(parent_data) = nodes.get_mut(parent.raw() as usize) {
                let position = anchor
                    .and_then(|anchor| parent_data.children.iter().position(|child| *child == anchor))
                    .unwrap_or(parent_data.children.len());
                parent_data.children.insert(position, node);
            }
            if let Some(data) = nodes.get_mut(node.raw() as usize) {
                data.parent = Some(parent);
            }
            moved
        };

        self.record(HostOp::Insert {
            node,
            parent,
            anchor,
            moved,
        });
    }

    fn remove(&self, node: HostNode) {
        Self::detach(&mut self.nodes.borrow_mut(), node);
        self.record(HostOp::Remove { node });
    }

    fn set_element_text(&self, node: HostNode, text: &str) {
        {
            let mut nodes = self.nodes.borrow_mut();
            let children = nodes
                .get_mut(node.raw() as usize)
                .map(|data| {
                    data.text = text.to_string();
                    std::mem::take(&mut data.children)
                })
                .unwrap_or_default();
            for child in children {
                if let Some(data) = nodes.get_mut(child.raw() as usize) {
                    data.parent = None;
                }
            }
        }
        self.record(HostOp::SetElementText {
            node,
            text: text.to_string(),
        });
    }

    fn set_text(&self, node: HostNode, text: &str) {
        self.with_node_mut(node, |data| data.text = text.to_string());
        self.record(HostOp::SetText {
            node,
            text: text.to_string(),
        });
    }

    fn patch_prop(&self, el: HostNode, key: &str, prev: Option<&PropValue>, next: Option<&PropValue>) {
        self.with_node_mut(el, |data| match key {
            "class" => {
                let class = next.and_then(PropValue::to_attribute).unwrap_or_default();
                data.attrs.insert("class".to_string(), class);
            }
            "style" => Self::patch_style(data, prev, next),
            _ if is_event_prop(key) => Self::patch_event(data, key, next),
            _ => match next.and_then(PropValue::to_attribute) {
                Some(value) => {
                    data.attrs.insert(key.to_string(), value);
                }
                None => {
                    data.attrs.shift_remove(key);
                }
            },
        });
        self.record(HostOp::PatchProp {
            node: el,
            key: key.to_string(),
        });
    }

    fn query_selector(&self, selector: &str) -> Option<HostNode> {
        self.roots.borrow().get(selector).copied()
    }

    fn next_sibling(&self, node: HostNode) -> Option<HostNode> {
        let nodes = self.nodes.borrow();
        let parent = nodes.get(node.raw() as usize)?.parent?;
        let siblings = &nodes.get(parent.raw() as usize)?.children;
        let index = siblings.iter().position(|child| *child == node)?;
        siblings.get(index + 1).copied()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
