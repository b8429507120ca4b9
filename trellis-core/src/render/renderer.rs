//! Reconciler
//!
//! The renderer turns virtual trees into host mutations. `patch(old, new)`
//! compares two trees and issues the smallest set of [`HostAdapter`] calls
//! that makes the host match `new`.
//!
//! # Algorithm
//!
//! 1. Nodes of a different type or key are never patched in place: the old
//!    node is unmounted and the new one mounted where it was.
//! 2. Elements reuse their host node, diff props, then diff children.
//! 3. Child lists go through the keyed diff:
//!    a. Patch the common prefix, then the common suffix
//!    b. Pure insertion or pure deletion finishes there
//!    c. Otherwise match the middle by key, unmount what has no match, and
//!       move only the matched nodes outside the longest increasing
//!       subsequence of their old positions
//! 4. Components render inside an effect whose re-runs go through the job
//!    queue, so a burst of writes re-renders once.
//!
//! Duplicate keys among siblings are a caller error; the resulting host tree
//! is unspecified.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace};

use super::app::App;
use super::component::{Component, ComponentInstance};
use super::host::{HostAdapter, HostNode};
use super::sequence::longest_increasing_subsequence;
use super::vnode::{Children, DiffKey, Props, VNode, VNodeType, KEY_PROP};
use crate::graph::queue_job;
use crate::reactive::{Effect, EffectOptions};

struct RendererInner<H> {
    host: H,
}

/// A renderer bound to one host adapter.
///
/// Cloning yields another handle to the same renderer.
pub struct Renderer<H: HostAdapter + 'static> {
    inner: Rc<RendererInner<H>>,
}

impl<H: HostAdapter + 'static> Clone for Renderer<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Create a renderer over a host adapter.
pub fn create_renderer<H: HostAdapter + 'static>(host: H) -> Renderer<H> {
    Renderer::new(host)
}

impl<H: HostAdapter + 'static> Renderer<H> {
    pub fn new(host: H) -> Self {
        Self {
            inner: Rc::new(RendererInner { host }),
        }
    }

    pub fn host(&self) -> &H {
        &self.inner.host
    }

    /// Create an app rendering `root` with `props`.
    pub fn create_app(&self, root: Component, props: Props) -> App<H> {
        App::new(self.clone(), root, props)
    }

    /// Mount a tree into `container`.
    pub fn render(&self, vnode: &VNode, container: HostNode) {
        self.patch(None, vnode, container, None);
    }

    /// Reconcile `new` against `old` inside `container`.
    ///
    /// New nodes are inserted before `anchor`, or appended without one.
    pub fn patch(&self, old: Option<&VNode>, new: &VNode, container: HostNode, anchor: Option<HostNode>) {
        let mut old = old;
        let mut anchor = anchor;

        if let Some(prev) = old {
            if !prev.same_type(new) {
                anchor = prev.host_el().and_then(|el| self.host().next_sibling(el));
                self.unmount(prev);
                old = None;
            }
        }

        let shape = new.shape();
        if shape.is_text() {
            self.process_text(old, new, container, anchor);
        } else if shape.is_element() {
            self.process_element(old, new, container, anchor);
        } else if shape.is_component() {
            self.process_component(old, new, container, anchor);
        }
    }

    /// Remove a mounted tree from the host and stop its components.
    pub fn unmount(&self, vnode: &VNode) {
        self.unmount_node(vnode, true);
    }

    // ---- Text ----

    fn process_text(&self, old: Option<&VNode>, new: &VNode, container: HostNode, anchor: Option<HostNode>) {
        let content = new.children().as_text().unwrap_or_default();

        match old.and_then(|prev| prev.host_el().map(|el| (prev, el))) {
            Some((prev, el)) => {
                new.set_el(el);
                if prev.children().as_text() != Some(content) {
                    self.host().set_text(el, content);
                }
            }
            None => {
                let el = self.host().create_text(content);
                new.set_el(el);
                self.host().insert(el, container, anchor);
            }
        }
    }

    // ---- Elements ----

    fn process_element(&self, old: Option<&VNode>, new: &VNode, container: HostNode, anchor: Option<HostNode>) {
        match old {
            Some(prev) => self.patch_element(prev, new, container, anchor),
            None => self.mount_element(new, container, anchor),
        }
    }

    fn mount_element(&self, vnode: &VNode, container: HostNode, anchor: Option<HostNode>) {
        let host = self.host();
        let el = host.create_element(vnode.tag().unwrap_or_default());
        vnode.set_el(el);

        for (key, value) in vnode.props() {
            if key != KEY_PROP {
                host.patch_prop(el, key, None, Some(value));
            }
        }

        match vnode.children() {
            Children::Text(content) => host.set_element_text(el, content),
            Children::List(children) => self.mount_children(children, el, None),
            Children::None => {}
        }

        host.insert(el, container, anchor);
    }

    fn mount_children(&self, children: &[VNode], container: HostNode, anchor: Option<HostNode>) {
        for child in children {
            self.patch(None, child, container, anchor);
        }
    }

    fn patch_element(&self, old: &VNode, new: &VNode, container: HostNode, anchor: Option<HostNode>) {
        let Some(el) = old.host_el() else {
            self.mount_element(new, container, anchor);
            return;
        };
        new.set_el(el);

        self.patch_props(old.props(), new.props(), el);
        self.patch_children(old, new, el);
    }

    fn patch_props(&self, old: &Props, new: &Props, el: HostNode) {
        let host = self.host();

        for (key, next) in new {
            if key == KEY_PROP {
                continue;
            }
            let prev = old.get(key);
            if prev != Some(next) {
                host.patch_prop(el, key, prev, Some(next));
            }
        }

        for (key, prev) in old {
            if key != KEY_PROP && !new.contains_key(key) {
                host.patch_prop(el, key, Some(prev), None);
            }
        }
    }

    fn patch_children(&self, old: &VNode, new: &VNode, el: HostNode) {
        let host = self.host();

        match (old.children(), new.children()) {
            (prev, Children::Text(next)) => {
                if let Children::List(prev_children) = prev {
                    self.unmount_children(prev_children);
                }
                if prev.as_text() != Some(next.as_str()) {
                    host.set_element_text(el, next);
                }
            }
            (Children::List(prev), Children::List(next)) => {
                self.patch_keyed_children(prev, next, el);
            }
            (Children::List(prev), Children::None) => self.unmount_children(prev),
            (prev, Children::List(next)) => {
                if prev.as_text().is_some() {
                    host.set_element_text(el, "");
                }
                self.mount_children(next, el, None);
            }
            (Children::Text(_), Children::None) => host.set_element_text(el, ""),
            (Children::None, Children::None) => {}
        }
    }

    /// Reconcile two sibling lists, moving as few host nodes as possible.
    fn patch_keyed_children(&self, c1: &[VNode], c2: &[VNode], container: HostNode) {
        let mut i = 0;
        // Exclusive ends of the unconsumed ranges.
        let mut e1 = c1.len();
        let mut e2 = c2.len();

        // Common prefix.
        while i < e1 && i < e2 && c1[i].same_type(&c2[i]) {
            self.patch(Some(&c1[i]), &c2[i], container, None);
            i += 1;
        }

        // Common suffix.
        while i < e1 && i < e2 && c1[e1 - 1].same_type(&c2[e2 - 1]) {
            self.patch(Some(&c1[e1 - 1]), &c2[e2 - 1], container, None);
            e1 -= 1;
            e2 -= 1;
        }

        if i == e1 {
            // Only insertions remain.
            if i < e2 {
                let anchor = c2.get(e2).and_then(VNode::host_el);
                for child in &c2[i..e2] {
                    self.patch(None, child, container, anchor);
                }
                trace!(mounted = e2 - i, "keyed diff: pure insertion");
            }
            return;
        }

        if i == e2 {
            // Only removals remain.
            for child in &c1[i..e1] {
                self.unmount(child);
            }
            trace!(removed = e1 - i, "keyed diff: pure removal");
            return;
        }

        // Unordered middle.
        let s1 = i;
        let s2 = i;

        let key_to_new_index: HashMap<&DiffKey, usize> = (s2..e2)
            .filter_map(|index| c2[index].key().map(|key| (key, index)))
            .collect();

        let to_be_patched = e2 - s2;
        // Old index + 1 for each new position; 0 means freshly inserted.
        let mut new_index_to_old = vec![0usize; to_be_patched];
        let mut removed = 0;

        for (old_index, prev) in c1.iter().enumerate().take(e1).skip(s1) {
            let new_index = match prev.key() {
                Some(key) => key_to_new_index.get(key).copied(),
                None => (s2..e2).find(|&index| {
                    new_index_to_old[index - s2] == 0 && c2[index].key().is_none() && prev.same_type(&c2[index])
                }),
            };

            match new_index {
                Some(new_index) => {
                    new_index_to_old[new_index - s2] = old_index + 1;
                    self.patch(Some(prev), &c2[new_index], container, None);
                }
                None => {
                    self.unmount(prev);
                    removed += 1;
                }
            }
        }

        let stable = longest_increasing_subsequence(&new_index_to_old);
        let mut stable_cursor = stable.len();
        let mut mounted = 0;
        let mut moved = 0;

        for offset in (0..to_be_patched).rev() {
            let index = s2 + offset;
            let child = &c2[index];
            let anchor = c2.get(index + 1).and_then(VNode::host_el);

            if new_index_to_old[offset] == 0 {
                self.patch(None, child, container, anchor);
                mounted += 1;
            } else if stable_cursor > 0 && stable[stable_cursor - 1] == offset {
                stable_cursor -= 1;
            } else if let Some(el) = child.host_el() {
                self.host().insert(el, container, anchor);
                moved += 1;
            }
        }

        debug!(
            middle = to_be_patched,
            stable = stable.len(),
            mounted,
            moved,
            removed,
            "keyed diff"
        );
    }

    // ---- Components ----

    fn process_component(&self, old: Option<&VNode>, new: &VNode, container: HostNode, anchor: Option<HostNode>) {
        match old.and_then(VNode::component) {
            Some(instance) => {
                new.set_component(Rc::clone(&instance));
                instance.props().replace(new.props());
            }
            None => self.mount_component(new, container, anchor),
        }
    }

    fn mount_component(&self, vnode: &VNode, container: HostNode, anchor: Option<HostNode>) {
        let VNodeType::Component(component) = vnode.node_type() else {
            return;
        };

        let instance = Rc::new(ComponentInstance::new(component, vnode.props()));
        instance.set_mount_point(container, anchor);
        vnode.set_component(Rc::clone(&instance));

        debug!(component = instance.name(), "mounting component");
        self.setup_render_effect(&instance);
    }

    fn setup_render_effect(&self, instance: &Rc<ComponentInstance>) {
        let renderer = Rc::downgrade(&self.inner);
        let target = Rc::downgrade(instance);

        let effect = Effect::with_options(
            move || {
                let (Some(inner), Some(instance)) = (renderer.upgrade(), target.upgrade()) else {
                    return;
                };
                Renderer { inner }.render_component(&instance);
            },
            EffectOptions::default()
                .lazy()
                .with_scheduler(|effect| queue_job(effect.clone())),
        );

        instance.set_update(effect.clone());
        effect.run();
    }

    fn render_component(&self, instance: &ComponentInstance) {
        let Some(container) = instance.container() else {
            return;
        };

        let next = instance.render_tree();
        let prev = instance.take_sub_tree();

        if instance.is_mounted() {
            trace!(component = instance.name(), "updating component");
            self.patch(prev.as_ref(), &next, container, None);
        } else {
            self.patch(None, &next, container, instance.anchor());
            instance.mark_mounted();
        }

        instance.set_sub_tree(next);
    }

    // ---- Unmount ----

    fn unmount_children(&self, children: &[VNode]) {
        for child in children {
            self.unmount(child);
        }
    }

    /// Stop every component in the tree; remove the root host node if
    /// `remove` is set. Descendants go away with their ancestor.
    fn unmount_node(&self, vnode: &VNode, remove: bool) {
        if vnode.shape().is_component() {
            if let Some(instance) = vnode.take_component() {
                debug!(component = instance.name(), "unmounting component");
                if let Some(tree) = instance.stop() {
                    self.unmount_node(&tree, remove);
                }
            }
            return;
        }

        if let Children::List(children) = vnode.children() {
            for child in children {
                self.unmount_node(child, false);
            }
        }

        if remove {
            if let Some(el) = vnode.host_el() {
                self.host().remove(el);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props;
    use crate::render::memory::{HostOp, MemoryHost};
    use crate::render::vnode::{h, text, Child, PropValue};

    fn setup() -> (Renderer<MemoryHost>, HostNode) {
        let renderer = Renderer::new(MemoryHost::new());
        let root = renderer.host().create_root("app");
        (renderer, root)
    }

    fn keyed_list(keys: &[&str]) -> VNode {
        h(
            "ul",
            props! {},
            keys.iter()
                .map(|key| h("li", props! { "key" => *key }, *key))
                .collect::<Vec<_>>(),
        )
    }

    fn count(ops: &[HostOp], predicate: impl Fn(&HostOp) -> bool) -> usize {
        ops.iter().filter(|op| predicate(*op)).count()
    }

    #[test]
    fn mounts_elements_with_props_and_children() {
        let (renderer, root) = setup();
        let tree = h(
            "div",
            props! { "class" => "box", "key" => "k" },
            vec![Child::from("hi "), Child::from(h("b", props! {}, "there"))],
        );

        renderer.render(&tree, root);

        assert_eq!(
            renderer.host().to_html(root),
            "<div id=\"app\"><div class=\"box\">hi <b>there</b></div></div>"
        );
        assert!(tree.host_el().is_some());
    }

    #[test]
    fn key_prop_is_not_forwarded() {
        let (renderer, root) = setup();
        let tree = h("p", props! { "key" => 1 }, ());
        renderer.render(&tree, root);

        let ops = renderer.host().ops();
        assert_eq!(count(&ops, |op| matches!(op, HostOp::PatchProp { .. })), 0);
    }

    #[test]
    fn patching_an_identical_tree_is_a_no_op() {
        let (renderer, root) = setup();
        let tree = h(
            "ul",
            props! { "class" => "list", "style" => PropValue::style([("color", "red")]) },
            vec![
                h("li", props! { "key" => "a" }, "a"),
                h("li", props! { "key" => "b" }, vec![Child::from("b"), Child::from(h("i", props! {}, "!"))]),
            ],
        );
        renderer.render(&tree, root);
        renderer.host().clear_ops();

        let copy = tree.clone();
        renderer.patch(Some(&tree), &copy, root, None);

        assert!(renderer.host().ops().is_empty());
        assert_eq!(copy.host_el(), tree.host_el());
    }

    #[test]
    fn props_are_diffed() {
        let (renderer, root) = setup();
        let old = h("a", props! { "href" => "/x", "title" => "t" }, ());
        renderer.render(&old, root);
        renderer.host().clear_ops();

        let new = h("a", props! { "href" => "/y" }, ());
        renderer.patch(Some(&old), &new, root, None);

        let el = new.host_el().expect("mounted");
        assert_eq!(renderer.host().attribute(el, "href").as_deref(), Some("/y"));
        assert_eq!(renderer.host().attribute(el, "title"), None);
        assert_eq!(renderer.host().ops().len(), 2);
    }

    #[test]
    fn type_change_replaces_in_place() {
        let (renderer, root) = setup();
        let old = h("div", props! {}, vec![h("p", props! {}, "1"), h("span", props! {}, "2"), h("p", props! {}, "3")]);
        renderer.render(&old, root);

        let new = h("div", props! {}, vec![h("p", props! {}, "1"), h("em", props! {}, "2"), h("p", props! {}, "3")]);
        renderer.patch(Some(&old), &new, root, None);

        assert_eq!(
            renderer.host().to_html(root),
            "<div id=\"app\"><div><p>1</p><em>2</em><p>3</p></div></div>"
        );
    }

    #[test]
    fn children_shape_transitions() {
        let (renderer, root) = setup();
        let list = h("div", props! {}, vec![text("a"), text("b")]);
        renderer.render(&list, root);

        let as_text = h("div", props! {}, "plain");
        renderer.patch(Some(&list), &as_text, root, None);
        assert_eq!(renderer.host().to_html(root), "<div id=\"app\"><div>plain</div></div>");

        let back = h("div", props! {}, vec![text("x")]);
        renderer.patch(Some(&as_text), &back, root, None);
        assert_eq!(renderer.host().to_html(root), "<div id=\"app\"><div>x</div></div>");

        let empty = h("div", props! {}, ());
        renderer.patch(Some(&back), &empty, root, None);
        assert_eq!(renderer.host().to_html(root), "<div id=\"app\"><div></div></div>");
    }

    #[test]
    fn text_nodes_update_in_place() {
        let (renderer, root) = setup();
        let old = text("before");
        renderer.render(&old, root);
        renderer.host().clear_ops();

        let new = text("after");
        renderer.patch(Some(&old), &new, root, None);

        assert_eq!(renderer.host().ops().len(), 1);
        assert_eq!(renderer.host().text_content(root), "after");
    }

    #[test]
    fn keyed_diff_moves_only_out_of_order_nodes() {
        let (renderer, root) = setup();
        let old = keyed_list(&["a", "b", "c", "d", "e", "f", "g"]);
        renderer.render(&old, root);
        renderer.host().clear_ops();

        let new = keyed_list(&["a", "b", "e", "c", "d", "h", "f", "g"]);
        renderer.patch(Some(&old), &new, root, None);

        let ops = renderer.host().ops();
        assert_eq!(count(&ops, |op| matches!(op, HostOp::CreateElement { .. })), 1);
        assert_eq!(count(&ops, HostOp::is_move), 1);
        assert_eq!(count(&ops, |op| matches!(op, HostOp::Remove { .. })), 0);
        assert_eq!(renderer.host().text_content(root), "abecdhfg");
    }

    #[test]
    fn keyed_diff_prefix_and_suffix_insertions() {
        let (renderer, root) = setup();
        let old = keyed_list(&["a", "b"]);
        renderer.render(&old, root);

        let appended = keyed_list(&["a", "b", "c"]);
        renderer.patch(Some(&old), &appended, root, None);
        assert_eq!(renderer.host().text_content(root), "abc");

        let prepended = keyed_list(&["z", "a", "b", "c"]);
        renderer.patch(Some(&appended), &prepended, root, None);
        assert_eq!(renderer.host().text_content(root), "zabc");

        let removed = keyed_list(&["z", "c"]);
        renderer.patch(Some(&prepended), &removed, root, None);
        assert_eq!(renderer.host().text_content(root), "zc");
    }

    #[test]
    fn keyed_diff_reverses_with_minimal_moves() {
        let (renderer, root) = setup();
        let old = keyed_list(&["a", "b", "c", "d"]);
        renderer.render(&old, root);
        renderer.host().clear_ops();

        let new = keyed_list(&["d", "c", "b", "a"]);
        renderer.patch(Some(&old), &new, root, None);

        let ops = renderer.host().ops();
        assert_eq!(count(&ops, HostOp::is_move), 3);
        assert_eq!(count(&ops, HostOp::is_create), 0);
        assert_eq!(renderer.host().text_content(root), "dcba");
    }

    #[test]
    fn keyed_diff_removes_unmatched_nodes() {
        let (renderer, root) = setup();
        let old = keyed_list(&["a", "b", "c", "d", "e"]);
        renderer.render(&old, root);
        renderer.host().clear_ops();

        let new = keyed_list(&["a", "d", "x", "b", "e"]);
        renderer.patch(Some(&old), &new, root, None);

        let ops = renderer.host().ops();
        assert_eq!(count(&ops, |op| matches!(op, HostOp::Remove { .. })), 1);
        assert_eq!(renderer.host().text_content(root), "adxbe");
    }

    #[test]
    fn unkeyed_children_are_matched_by_type() {
        let (renderer, root) = setup();
        let old = h("div", props! {}, vec![h("p", props! {}, "1"), h("span", props! {}, "2")]);
        renderer.render(&old, root);

        let new = h("div", props! {}, vec![h("span", props! {}, "2"), h("p", props! {}, "1")]);
        renderer.patch(Some(&old), &new, root, None);

        assert_eq!(
            renderer.host().to_html(root),
            "<div id=\"app\"><div><span>2</span><p>1</p></div></div>"
        );
    }
}
