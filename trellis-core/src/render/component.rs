//! Components
//!
//! A component definition pairs an optional `setup` with an optional render
//! function. Mounting a component vnode creates a [`ComponentInstance`]:
//! setup runs once, then a render effect renders the subtree and re-renders
//! it through the job queue whenever something it read changes.
//!
//! Render functions read through a [`RenderContext`], which resolves a name
//! against the setup state first and the props second.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::warn;

use super::host::HostNode;
use super::vnode::{text, PropValue, Props, VNode, KEY_PROP};
use crate::graph::{Key, SourceId, Trigger};
use crate::reactive::{Effect, Reactive, Runtime, Value};

/// Produces a component's subtree.
pub type RenderFn = Rc<dyn Fn(&RenderContext<'_>) -> VNode>;

/// Runs once per instance, before the first render.
pub type SetupFn = Rc<dyn Fn(&ComponentProps, &SetupContext<'_>) -> SetupResult>;

/// What `setup` hands back.
pub enum SetupResult {
    /// Use this render function for the instance.
    Render(RenderFn),
    /// Expose this object to the render context.
    State(Reactive),
    None,
}

impl SetupResult {
    pub fn render<F>(render: F) -> Self
    where
        F: Fn(&RenderContext<'_>) -> VNode + 'static,
    {
        SetupResult::Render(Rc::new(render))
    }
}

impl From<Reactive> for SetupResult {
    fn from(state: Reactive) -> Self {
        SetupResult::State(state)
    }
}

/// A component definition under construction.
pub struct ComponentDefinition {
    name: String,
    setup: Option<SetupFn>,
    render: Option<RenderFn>,
}

impl ComponentDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            setup: None,
            render: None,
        }
    }

    pub fn setup<F>(mut self, setup: F) -> Self
    where
        F: Fn(&ComponentProps, &SetupContext<'_>) -> SetupResult + 'static,
    {
        self.setup = Some(Rc::new(setup));
        self
    }

    pub fn render<F>(mut self, render: F) -> Self
    where
        F: Fn(&RenderContext<'_>) -> VNode + 'static,
    {
        self.render = Some(Rc::new(render));
        self
    }

    pub fn build(self) -> Component {
        Component(Rc::new(self))
    }
}

/// A shared component definition. Equality is identity.
#[derive(Clone)]
pub struct Component(Rc<ComponentDefinition>);

impl Component {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn ptr_eq(&self, other: &Component) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component").field("name", &self.name()).finish()
    }
}

/// Start a component definition.
pub fn define_component(name: impl Into<String>) -> ComponentDefinition {
    ComponentDefinition::new(name)
}

/// Passed to `setup` next to the props.
pub struct SetupContext<'a> {
    component: &'a Component,
}

impl SetupContext<'_> {
    pub fn name(&self) -> &str {
        self.component.name()
    }
}

/// A component's props, tracked per key.
///
/// Reading a prop inside the render effect subscribes the component to that
/// prop; a parent re-render that changes it re-renders the component.
pub struct ComponentProps {
    source: SourceId,
    values: RefCell<Props>,
}

impl ComponentProps {
    pub(crate) fn new(props: &Props) -> Self {
        Self {
            source: SourceId::new(),
            values: RefCell::new(Self::strip_key(props)),
        }
    }

    fn strip_key(props: &Props) -> Props {
        props
            .iter()
            .filter(|(key, _)| key.as_str() != KEY_PROP)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Read a prop, tracking it.
    pub fn get(&self, key: &str) -> Option<PropValue> {
        Runtime::track(self.source, Key::Field(key.to_string()));
        self.values.borrow().get(key).cloned()
    }

    /// Read a prop as a [`Value`], tracking it.
    pub fn value(&self, key: &str) -> Value {
        self.get(key)
            .and_then(|prop| prop.to_value())
            .unwrap_or_default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.borrow().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    /// Swap in the props of a new vnode, notifying readers of changed keys.
    pub(crate) fn replace(&self, next: &Props) {
        let next = Self::strip_key(next);
        let mut triggers = Vec::new();
        {
            let prev = self.values.borrow();
            for (key, value) in &next {
                match prev.get(key) {
                    None => triggers.push(Trigger::add(Key::Field(key.clone()))),
                    Some(old) if old != value => triggers.push(Trigger::set(Key::Field(key.clone()))),
                    Some(_) => {}
                }
            }
            for key in prev.keys() {
                if !next.contains_key(key) {
                    triggers.push(Trigger::set(Key::Field(key.clone())));
                }
            }
        }

        *self.values.borrow_mut() = next;
        for trigger in triggers {
            Runtime::trigger(self.source, trigger);
        }
    }
}

impl Drop for ComponentProps {
    fn drop(&mut self) {
        Runtime::forget_source(self.source);
    }
}

/// What a render function sees.
pub struct RenderContext<'a> {
    state: Option<&'a Reactive>,
    props: &'a ComponentProps,
}

impl<'a> RenderContext<'a> {
    pub(crate) fn new(state: Option<&'a Reactive>, props: &'a ComponentProps) -> Self {
        Self { state, props }
    }

    /// Resolve a name against the setup state, then the props.
    ///
    /// Names starting with `$` are reserved and resolve to nothing.
    pub fn get(&self, key: &str) -> Option<Value> {
        if key.starts_with('$') {
            return None;
        }
        if let Some(state) = self.state.filter(|state| state.contains_key(key)) {
            return Some(state.get(key));
        }
        self.props.get(key).and_then(|prop| prop.to_value())
    }

    /// Write a setup-state field. Names not in the state are ignored.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        match self.state {
            Some(state) if state.contains_key(key) => state.set(key, value),
            _ => false,
        }
    }

    pub fn state(&self) -> Option<&Reactive> {
        self.state
    }

    pub fn props(&self) -> &ComponentProps {
        self.props
    }
}

fn render_nothing(_: &RenderContext<'_>) -> VNode {
    text("")
}

/// A mounted component.
pub struct ComponentInstance {
    component: Component,
    props: ComponentProps,
    setup_state: Option<Reactive>,
    render: RenderFn,
    sub_tree: RefCell<Option<VNode>>,
    is_mounted: Cell<bool>,
    update: RefCell<Option<Effect>>,
    container: Cell<Option<HostNode>>,
    anchor: Cell<Option<HostNode>>,
}

impl ComponentInstance {
    /// Create the instance and run setup.
    pub(crate) fn new(component: &Component, props: &Props) -> Self {
        let props = ComponentProps::new(props);
        let definition = &component.0;

        let mut setup_state = None;
        let mut render = None;
        if let Some(setup) = &definition.setup {
            let ctx = SetupContext { component };
            // Setup reads are never tracked.
            match Runtime::untracked(|| setup(&props, &ctx)) {
                SetupResult::Render(f) => render = Some(f),
                SetupResult::State(state) => setup_state = Some(state),
                SetupResult::None => {}
            }
        }

        let render = render
            .or_else(|| definition.render.clone())
            .unwrap_or_else(|| {
                warn!(component = %definition.name, "component is missing a render function");
                let fallback: RenderFn = Rc::new(render_nothing);
                fallback
            });

        Self {
            component: component.clone(),
            props,
            setup_state,
            render,
            sub_tree: RefCell::new(None),
            is_mounted: Cell::new(false),
            update: RefCell::new(None),
            container: Cell::new(None),
            anchor: Cell::new(None),
        }
    }

    pub fn name(&self) -> &str {
        self.component.name()
    }

    pub fn props(&self) -> &ComponentProps {
        &self.props
    }

    pub fn setup_state(&self) -> Option<&Reactive> {
        self.setup_state.as_ref()
    }

    pub fn is_mounted(&self) -> bool {
        self.is_mounted.get()
    }

    /// The render effect, once mounted.
    pub fn update_effect(&self) -> Option<Effect> {
        self.update.borrow().clone()
    }

    /// Root host node of the current subtree.
    pub fn host_el(&self) -> Option<HostNode> {
        self.sub_tree.borrow().as_ref().and_then(VNode::host_el)
    }

    /// Call the render function.
    pub(crate) fn render_tree(&self) -> VNode {
        let ctx = RenderContext::new(self.setup_state.as_ref(), &self.props);
        (self.render)(&ctx)
    }

    pub(crate) fn mark_mounted(&self) {
        self.is_mounted.set(true);
    }

    pub(crate) fn set_update(&self, effect: Effect) {
        *self.update.borrow_mut() = Some(effect);
    }

    pub(crate) fn set_mount_point(&self, container: HostNode, anchor: Option<HostNode>) {
        self.container.set(Some(container));
        self.anchor.set(anchor);
    }

    pub(crate) fn container(&self) -> Option<HostNode> {
        self.container.get()
    }

    pub(crate) fn anchor(&self) -> Option<HostNode> {
        self.anchor.get()
    }

    pub(crate) fn take_sub_tree(&self) -> Option<VNode> {
        self.sub_tree.borrow_mut().take()
    }

    pub(crate) fn set_sub_tree(&self, tree: VNode) {
        *self.sub_tree.borrow_mut() = Some(tree);
    }

    /// Stop the render effect. Returns the subtree to unmount.
    pub(crate) fn stop(&self) -> Option<VNode> {
        if let Some(effect) = self.update.borrow_mut().take() {
            effect.stop();
        }
        self.is_mounted.set(false);
        self.take_sub_tree()
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("name", &self.name())
            .field("mounted", &self.is_mounted())
            .field("props", &self.props.len())
            .finish()
    }
}
