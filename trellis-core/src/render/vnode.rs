//! Virtual Nodes
//!
//! A [`VNode`] describes one host-tree node: its type, props, children and
//! optional diff key. Nodes are created fresh on every render and never
//! mutated after mount, except for the host handle (and the component
//! instance of a component node), which a patch carries over from the
//! predecessor.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::component::{Component, ComponentInstance};
use super::host::{Event, HostNode};
use super::shape::ShapeFlags;
use crate::reactive::{object, Value};

/// Prop name holding the diff key. Never forwarded to the host.
pub const KEY_PROP: &str = "key";

/// An event callback stored in props.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Event)>);

impl EventHandler {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Event) + 'static,
    {
        Self(Rc::new(handler))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &EventHandler) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventHandler")
    }
}

/// A prop value.
#[derive(Debug, Clone)]
pub enum PropValue {
    Str(String),
    Number(f64),
    Bool(bool),
    /// Inline style entries.
    Style(IndexMap<String, String>),
    /// Event handler for an `on*` prop.
    Handler(EventHandler),
}

impl PropValue {
    /// Build a style prop from `(property, value)` pairs.
    pub fn style<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        PropValue::Style(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Build an event handler prop.
    pub fn handler<F>(handler: F) -> Self
    where
        F: Fn(&Event) + 'static,
    {
        PropValue::Handler(EventHandler::new(handler))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            PropValue::Handler(handler) => Some(handler),
            _ => None,
        }
    }

    /// The value as a reactive [`Value`]. Handlers have none.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            PropValue::Str(text) => Some(Value::from(text.as_str())),
            PropValue::Number(number) => Some(Value::from(*number)),
            PropValue::Bool(flag) => Some(Value::from(*flag)),
            PropValue::Style(entries) => Some(Value::from(object(
                entries
                    .iter()
                    .map(|(key, value)| (key.as_str(), Value::from(value.as_str()))),
            ))),
            PropValue::Handler(_) => None,
        }
    }

    /// Plain attribute text; `None` for styles and handlers.
    pub fn to_attribute(&self) -> Option<String> {
        match self {
            PropValue::Str(text) => Some(text.clone()),
            PropValue::Number(number) => Some(Value::from(*number).to_string()),
            PropValue::Bool(flag) => Some(flag.to_string()),
            PropValue::Style(_) | PropValue::Handler(_) => None,
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Str(a), PropValue::Str(b)) => a == b,
            (PropValue::Number(a), PropValue::Number(b)) => a == b,
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Style(a), PropValue::Style(b)) => a == b,
            (PropValue::Handler(a), PropValue::Handler(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<&str> for PropValue {
    fn from(text: &str) -> Self {
        PropValue::Str(text.to_string())
    }
}

impl From<String> for PropValue {
    fn from(text: String) -> Self {
        PropValue::Str(text)
    }
}

impl From<f64> for PropValue {
    fn from(number: f64) -> Self {
        PropValue::Number(number)
    }
}

impl From<i32> for PropValue {
    fn from(number: i32) -> Self {
        PropValue::Number(f64::from(number))
    }
}

impl From<usize> for PropValue {
    fn from(number: usize) -> Self {
        PropValue::Number(number as f64)
    }
}

impl From<bool> for PropValue {
    fn from(flag: bool) -> Self {
        PropValue::Bool(flag)
    }
}

impl From<EventHandler> for PropValue {
    fn from(handler: EventHandler) -> Self {
        PropValue::Handler(handler)
    }
}

/// Ordered prop map.
pub type Props = IndexMap<String, PropValue>;

/// Build a [`Props`] map.
///
/// ```rust,ignore
/// let props = props! { "key" => "a", "class" => "item", "count" => 3 };
/// ```
#[macro_export]
macro_rules! props {
    () => {
        $crate::render::Props::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut props = $crate::render::Props::new();
        $(
            props.insert(
                ::std::string::String::from($key),
                $crate::render::PropValue::from($value),
            );
        )+
        props
    }};
}

/// Diff key used to match siblings across renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DiffKey {
    Str(String),
    Int(i64),
}

impl DiffKey {
    /// Read a diff key out of a `key` prop.
    pub fn from_prop(value: &PropValue) -> Option<Self> {
        match value {
            PropValue::Str(text) => Some(DiffKey::Str(text.clone())),
            PropValue::Number(number) if number.fract() == 0.0 => Some(DiffKey::Int(*number as i64)),
            PropValue::Number(number) => Some(DiffKey::Str(number.to_string())),
            PropValue::Bool(flag) => Some(DiffKey::Str(flag.to_string())),
            PropValue::Style(_) | PropValue::Handler(_) => None,
        }
    }
}

impl fmt::Display for DiffKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffKey::Str(text) => f.write_str(text),
            DiffKey::Int(number) => write!(f, "{number}"),
        }
    }
}

/// What a node is.
#[derive(Clone)]
pub enum VNodeType {
    Text,
    Element(Rc<str>),
    Component(Component),
}

impl VNodeType {
    fn shape(&self) -> ShapeFlags {
        match self {
            VNodeType::Text => ShapeFlags::TEXT,
            VNodeType::Element(_) => ShapeFlags::ELEMENT,
            VNodeType::Component(_) => ShapeFlags::STATEFUL_COMPONENT,
        }
    }
}

impl PartialEq for VNodeType {
    /// Tags compare by name, components by definition identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (VNodeType::Text, VNodeType::Text) => true,
            (VNodeType::Element(a), VNodeType::Element(b)) => a == b,
            (VNodeType::Component(a), VNodeType::Component(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for VNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNodeType::Text => f.write_str("Text"),
            VNodeType::Element(tag) => write!(f, "Element({tag})"),
            VNodeType::Component(component) => write!(f, "Component({})", component.name()),
        }
    }
}

impl From<&str> for VNodeType {
    fn from(tag: &str) -> Self {
        VNodeType::Element(Rc::from(tag))
    }
}

impl From<String> for VNodeType {
    fn from(tag: String) -> Self {
        VNodeType::Element(Rc::from(tag))
    }
}

impl From<Component> for VNodeType {
    fn from(component: Component) -> Self {
        VNodeType::Component(component)
    }
}

impl From<&Component> for VNodeType {
    fn from(component: &Component) -> Self {
        VNodeType::Component(component.clone())
    }
}

/// A child as written by the caller: raw text or a node.
pub enum Child {
    Text(String),
    Node(VNode),
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(text.to_string())
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(text)
    }
}

impl From<f64> for Child {
    fn from(number: f64) -> Self {
        Child::Text(Value::from(number).to_string())
    }
}

impl From<i32> for Child {
    fn from(number: i32) -> Self {
        Child::Text(number.to_string())
    }
}

impl From<Value> for Child {
    fn from(value: Value) -> Self {
        Child::Text(value.to_string())
    }
}

impl From<VNode> for Child {
    fn from(node: VNode) -> Self {
        Child::Node(node)
    }
}

/// Turn a child into a node, wrapping raw text in its own text node.
///
/// Each text child needs its own host node: writing element text twice to
/// the same parent would overwrite the first write.
pub fn normalize(child: impl Into<Child>) -> VNode {
    match child.into() {
        Child::Text(content) => text(content),
        Child::Node(node) => node,
    }
}

/// Children of a node.
#[derive(Debug, Clone, Default)]
pub enum Children {
    #[default]
    None,
    Text(String),
    List(Vec<VNode>),
}

impl Children {
    fn shape(&self) -> ShapeFlags {
        match self {
            Children::None => ShapeFlags::empty(),
            Children::Text(_) => ShapeFlags::TEXT_CHILDREN,
            Children::List(_) => ShapeFlags::ARRAY_CHILDREN,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Children::Text(content) => Some(content),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[VNode]> {
        match self {
            Children::List(nodes) => Some(nodes),
            _ => None,
        }
    }
}

impl From<()> for Children {
    fn from(_: ()) -> Self {
        Children::None
    }
}

impl From<&str> for Children {
    fn from(content: &str) -> Self {
        Children::Text(content.to_string())
    }
}

impl From<String> for Children {
    fn from(content: String) -> Self {
        Children::Text(content)
    }
}

impl From<Value> for Children {
    fn from(value: Value) -> Self {
        Children::Text(value.to_string())
    }
}

impl From<VNode> for Children {
    fn from(node: VNode) -> Self {
        Children::List(vec![node])
    }
}

impl From<Vec<VNode>> for Children {
    fn from(nodes: Vec<VNode>) -> Self {
        Children::List(nodes)
    }
}

impl From<Vec<Child>> for Children {
    fn from(children: Vec<Child>) -> Self {
        Children::List(children.into_iter().map(normalize).collect())
    }
}

/// A virtual node.
pub struct VNode {
    node_type: VNodeType,
    props: Props,
    children: Children,
    key: Option<DiffKey>,
    shape: ShapeFlags,
    el: Cell<Option<HostNode>>,
    component: RefCell<Option<Rc<ComponentInstance>>>,
}

impl VNode {
    pub fn node_type(&self) -> &VNodeType {
        &self.node_type
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn children(&self) -> &Children {
        &self.children
    }

    pub fn key(&self) -> Option<&DiffKey> {
        self.key.as_ref()
    }

    pub fn shape(&self) -> ShapeFlags {
        self.shape
    }

    /// The element tag, if this is an element node.
    pub fn tag(&self) -> Option<&str> {
        match &self.node_type {
            VNodeType::Element(tag) => Some(tag),
            _ => None,
        }
    }

    /// Whether two nodes can be patched in place.
    pub fn same_type(&self, other: &VNode) -> bool {
        self.node_type == other.node_type && self.key == other.key
    }

    /// The host node this vnode is mounted as.
    ///
    /// For a component node this is the root of its current subtree.
    pub fn host_el(&self) -> Option<HostNode> {
        match &*self.component.borrow() {
            Some(instance) => instance.host_el(),
            None => self.el.get(),
        }
    }

    /// The component instance of a mounted component node.
    pub fn component(&self) -> Option<Rc<ComponentInstance>> {
        self.component.borrow().clone()
    }

    pub(crate) fn set_el(&self, el: HostNode) {
        self.el.set(Some(el));
    }

    pub(crate) fn set_component(&self, instance: Rc<ComponentInstance>) {
        *self.component.borrow_mut() = Some(instance);
    }

    pub(crate) fn take_component(&self) -> Option<Rc<ComponentInstance>> {
        self.component.borrow_mut().take()
    }
}

impl Clone for VNode {
    /// Structural clone: same shape, not mounted.
    fn clone(&self) -> Self {
        Self {
            node_type: self.node_type.clone(),
            props: self.props.clone(),
            children: self.children.clone(),
            key: self.key.clone(),
            shape: self.shape,
            el: Cell::new(None),
            component: RefCell::new(None),
        }
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VNode")
            .field("type", &self.node_type)
            .field("key", &self.key)
            .field("props", &self.props.keys().collect::<Vec<_>>())
            .field("children", &self.children)
            .field("el", &self.el.get())
            .finish()
    }
}

/// Create a node, classifying its type and children and extracting the diff
/// key from the `key` prop.
pub fn create_vnode(node_type: VNodeType, props: Props, children: Children) -> VNode {
    let key = props.get(KEY_PROP).and_then(DiffKey::from_prop);
    let shape = node_type.shape() | children.shape();

    VNode {
        node_type,
        props,
        children,
        key,
        shape,
        el: Cell::new(None),
        component: RefCell::new(None),
    }
}

/// Create a node from a tag or component, props and children.
///
/// ```rust,ignore
/// let list = h("ul", props! {}, vec![
///     h("li", props! { "key" => "a" }, "a"),
///     h("li", props! { "key" => "b" }, "b"),
/// ]);
/// ```
pub fn h(node_type: impl Into<VNodeType>, props: Props, children: impl Into<Children>) -> VNode {
    create_vnode(node_type.into(), props, children.into())
}

/// Create a text node.
pub fn text(content: impl Into<String>) -> VNode {
    create_vnode(VNodeType::Text, Props::new(), Children::Text(content.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_shape_and_key() {
        let node = h("li", props! { "key" => "a", "class" => "item" }, "a");

        assert_eq!(node.shape(), ShapeFlags::ELEMENT | ShapeFlags::TEXT_CHILDREN);
        assert_eq!(node.key(), Some(&DiffKey::Str("a".into())));
        assert_eq!(node.tag(), Some("li"));
        assert_eq!(node.children().as_text(), Some("a"));
    }

    #[test]
    fn numeric_keys_become_integer_keys() {
        let node = h("li", props! { "key" => 7 }, ());
        assert_eq!(node.key(), Some(&DiffKey::Int(7)));
        assert_eq!(node.shape(), ShapeFlags::ELEMENT);
    }

    #[test]
    fn mixed_children_are_normalized() {
        let node = h(
            "p",
            props! {},
            vec![Child::from("hello "), Child::from(h("b", props! {}, "world"))],
        );

        let children = node.children().as_list().expect("list children");
        assert!(node.shape().has_array_children());
        assert!(children[0].shape().is_text());
        assert_eq!(children[0].children().as_text(), Some("hello "));
        assert!(children[1].shape().is_element());
    }

    #[test]
    fn single_node_child_becomes_a_list() {
        let node = h("div", props! {}, h("span", props! {}, "x"));
        assert_eq!(node.children().as_list().map(<[VNode]>::len), Some(1));
    }

    #[test]
    fn same_type_compares_type_and_key() {
        let a = h("li", props! { "key" => 1 }, ());
        let b = h("li", props! { "key" => 1 }, "different children");
        let c = h("li", props! { "key" => 2 }, ());
        let d = h("div", props! { "key" => 1 }, ());

        assert!(a.same_type(&b));
        assert!(!a.same_type(&c));
        assert!(!a.same_type(&d));
    }

    #[test]
    fn clone_is_unmounted() {
        let node = text("x");
        node.set_el(HostNode::from(3u64));

        let copy = node.clone();
        assert_eq!(node.host_el(), Some(HostNode::from(3u64)));
        assert_eq!(copy.host_el(), None);
    }

    #[test]
    fn handler_props_compare_by_identity() {
        let handler = PropValue::handler(|_| {});
        let other = PropValue::handler(|_| {});

        assert_eq!(handler, handler.clone());
        assert_ne!(handler, other);
        assert_eq!(handler.to_value(), None);
    }
}
