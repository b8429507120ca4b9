//! App Bootstrap
//!
//! `renderer.create_app(root, props).mount(target)` renders a root component
//! into a host container.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, warn};

use super::component::{Component, ComponentInstance};
use super::host::{HostAdapter, HostNode};
use super::renderer::Renderer;
use super::vnode::{create_vnode, Children, Props, VNode, VNodeType};
use crate::error::{RenderError, Result};

/// Where to mount an app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountTarget {
    /// Look the container up with the host's selector query. The
    /// container's content is cleared before mounting.
    Selector(String),
    /// Mount into this node as it is.
    Node(HostNode),
}

impl From<&str> for MountTarget {
    fn from(selector: &str) -> Self {
        MountTarget::Selector(selector.to_string())
    }
}

impl From<String> for MountTarget {
    fn from(selector: String) -> Self {
        MountTarget::Selector(selector)
    }
}

impl From<HostNode> for MountTarget {
    fn from(node: HostNode) -> Self {
        MountTarget::Node(node)
    }
}

struct Mounted {
    vnode: VNode,
    container: HostNode,
}

/// A root component bound to a renderer.
pub struct App<H: HostAdapter + 'static> {
    renderer: Renderer<H>,
    root: Component,
    props: Props,
    mounted: RefCell<Option<Mounted>>,
}

impl<H: HostAdapter + 'static> App<H> {
    pub(crate) fn new(renderer: Renderer<H>, root: Component, props: Props) -> Self {
        Self {
            renderer,
            root,
            props,
            mounted: RefCell::new(None),
        }
    }

    /// Render the root component into `target`.
    ///
    /// Returns the container node.
    pub fn mount(&self, target: impl Into<MountTarget>) -> Result<HostNode> {
        if self.mounted.borrow().is_some() {
            return Err(RenderError::AlreadyMounted);
        }

        let host = self.renderer.host();
        let container = match target.into() {
            MountTarget::Selector(selector) => {
                let Some(container) = host.query_selector(&selector) else {
                    warn!(%selector, "failed to mount app: no container matches selector");
                    return Err(RenderError::ContainerNotFound { selector });
                };
                host.set_element_text(container, "");
                container
            }
            MountTarget::Node(node) => node,
        };

        let vnode = create_vnode(
            VNodeType::Component(self.root.clone()),
            self.props.clone(),
            Children::None,
        );
        debug!(component = self.root.name(), %container, "mounting app");
        self.renderer.render(&vnode, container);

        *self.mounted.borrow_mut() = Some(Mounted { vnode, container });
        Ok(container)
    }

    /// Unmount the root component. No-op if not mounted.
    pub fn unmount(&self) {
        let mounted = self.mounted.borrow_mut().take();
        if let Some(mounted) = mounted {
            self.renderer.unmount(&mounted.vnode);
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.borrow().is_some()
    }

    pub fn container(&self) -> Option<HostNode> {
        self.mounted.borrow().as_ref().map(|mounted| mounted.container)
    }

    /// The root component instance, once mounted.
    pub fn root_instance(&self) -> Option<Rc<ComponentInstance>> {
        self.mounted
            .borrow()
            .as_ref()
            .and_then(|mounted| mounted.vnode.component())
    }

    pub fn renderer(&self) -> &Renderer<H> {
        &self.renderer
    }
}
