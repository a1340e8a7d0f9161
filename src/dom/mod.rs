//! Host document - The in-memory document tree the engine renders into.
//!
//! The rendering engine only consumes a small host surface:
//! - create / insert / remove nodes
//! - set / remove attributes, set element properties
//! - add / remove event listeners
//! - realize markup as a node tree (`markup`)
//!
//! This module implements that surface in memory. Nodes are cheap `Rc`
//! handles; equality is identity, which is what the renderer's "same node
//! before and after" guarantees are measured against.
//!
//! # Connection
//!
//! A node is connected when its root (crossing shadow roots to their host) is a
//! document. Elements with registered [`ElementLifecycle`] callbacks are told
//! when they become connected or disconnected, and when their attributes change.
//!
//! ```ignore
//! let document = Node::document();
//! let div = Node::element("div");
//! div.set_attribute("id", "main");
//! document.append_child(&div);
//! assert!(div.is_connected());
//! ```

mod event;
mod selector;
pub mod capabilities;
pub mod markup;

pub use event::*;
pub use capabilities::{HostProfile, host_profile, listener_options_supported, set_host_profile};

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::value::Value;
use selector::Selector;

// =============================================================================
// Node Types
// =============================================================================

/// Kind of a host node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Document,
    Fragment,
    ShadowRoot,
    Element,
    Text,
    Comment,
}

/// Element namespace. Markup inside `<svg>` keeps tag and attribute case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Namespace {
    #[default]
    Html,
    Svg,
}

/// Callbacks an element receives from the host document.
pub trait ElementLifecycle {
    fn connected(&self) {}
    fn disconnected(&self) {}
    fn attribute_changed(&self, _name: &str, _old: Option<&str>, _new: Option<&str>) {}
}

// =============================================================================
// Node Storage
// =============================================================================

struct NodeData {
    parent: RefCell<Weak<NodeData>>,
    children: RefCell<Vec<Node>>,
    kind: NodeKind,
    /// Per-node slot for renderer bookkeeping (the persistent root part).
    render_state: RefCell<Option<Rc<dyn Any>>>,
}

enum NodeKind {
    Document,
    Fragment,
    ShadowRoot(ShadowRootData),
    Element(ElementData),
    Text(RefCell<String>),
    Comment(RefCell<String>),
}

struct ShadowRootData {
    host: Weak<NodeData>,
    adopted_styles: RefCell<Vec<String>>,
}

struct ElementData {
    tag: String,
    namespace: Namespace,
    attributes: RefCell<Vec<(String, String)>>,
    properties: RefCell<HashMap<String, Value>>,
    listeners: RefCell<Vec<ListenerRecord>>,
    shadow_root: RefCell<Option<Node>>,
    /// Content fragment of a `<template>` element.
    content: Option<Node>,
    lifecycle: RefCell<Option<Weak<dyn ElementLifecycle>>>,
}

/// A handle to a host node. Cloning the handle does not clone the node.
#[derive(Clone)]
pub struct Node(Rc<NodeData>);

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            NodeKind::Document => write!(f, "#document"),
            NodeKind::Fragment => write!(f, "#fragment"),
            NodeKind::ShadowRoot(_) => write!(f, "#shadow-root"),
            NodeKind::Element(el) => write!(f, "<{}>", el.tag),
            NodeKind::Text(text) => write!(f, "#text({:?})", text.borrow()),
            NodeKind::Comment(data) => write!(f, "<!--{}-->", data.borrow()),
        }
    }
}

// =============================================================================
// Creation
// =============================================================================

impl Node {
    fn from_kind(kind: NodeKind) -> Self {
        Node(Rc::new(NodeData {
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            kind,
            render_state: RefCell::new(None),
        }))
    }

    /// A new document root. Nodes appended under it are connected.
    pub fn document() -> Self {
        Self::from_kind(NodeKind::Document)
    }

    pub fn fragment() -> Self {
        Self::from_kind(NodeKind::Fragment)
    }

    /// An HTML element. The tag is lowercased.
    pub fn element(tag: &str) -> Self {
        Self::element_ns(&tag.to_ascii_lowercase(), Namespace::Html)
    }

    /// An element in the given namespace, tag kept as written.
    pub fn element_ns(tag: &str, namespace: Namespace) -> Self {
        let content = (namespace == Namespace::Html && tag == "template").then(Node::fragment);
        Self::from_kind(NodeKind::Element(ElementData {
            tag: tag.to_string(),
            namespace,
            attributes: RefCell::new(Vec::new()),
            properties: RefCell::new(HashMap::new()),
            listeners: RefCell::new(Vec::new()),
            shadow_root: RefCell::new(None),
            content,
            lifecycle: RefCell::new(None),
        }))
    }

    pub fn text(data: &str) -> Self {
        Self::from_kind(NodeKind::Text(RefCell::new(data.to_string())))
    }

    pub fn comment(data: &str) -> Self {
        Self::from_kind(NodeKind::Comment(RefCell::new(data.to_string())))
    }

    // =========================================================================
    // Identity and kind
    // =========================================================================

    pub fn node_type(&self) -> NodeType {
        match &self.0.kind {
            NodeKind::Document => NodeType::Document,
            NodeKind::Fragment => NodeType::Fragment,
            NodeKind::ShadowRoot(_) => NodeType::ShadowRoot,
            NodeKind::Element(_) => NodeType::Element,
            NodeKind::Text(_) => NodeType::Text,
            NodeKind::Comment(_) => NodeType::Comment,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.0.kind, NodeKind::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.0.kind, NodeKind::Text(_))
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.0.kind, NodeKind::Comment(_))
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        self == other
    }

    fn element_data(&self) -> Option<&ElementData> {
        match &self.0.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Tag name for elements, `None` otherwise.
    pub fn tag_name(&self) -> Option<&str> {
        self.element_data().map(|el| el.tag.as_str())
    }

    pub fn namespace(&self) -> Option<Namespace> {
        self.element_data().map(|el| el.namespace)
    }

    /// True for an HTML `<template>` element.
    pub fn is_template(&self) -> bool {
        self.element_data().is_some_and(|el| el.content.is_some())
    }

    /// Content fragment of a `<template>` element.
    pub fn template_content(&self) -> Option<Node> {
        self.element_data().and_then(|el| el.content.clone())
    }

    // =========================================================================
    // Character data
    // =========================================================================

    /// Data of a text or comment node.
    pub fn data(&self) -> Option<String> {
        match &self.0.kind {
            NodeKind::Text(data) | NodeKind::Comment(data) => Some(data.borrow().clone()),
            _ => None,
        }
    }

    pub fn set_data(&self, value: &str) {
        if let NodeKind::Text(data) | NodeKind::Comment(data) = &self.0.kind {
            let mut data = data.borrow_mut();
            data.clear();
            data.push_str(value);
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        match &self.0.kind {
            NodeKind::Text(data) => data.borrow().clone(),
            NodeKind::Comment(_) => String::new(),
            _ => {
                let mut out = String::new();
                for child in self.children() {
                    out.push_str(&child.text_content());
                }
                out
            }
        }
    }

    // =========================================================================
    // Tree navigation
    // =========================================================================

    pub fn parent(&self) -> Option<Node> {
        self.0.parent.borrow().upgrade().map(Node)
    }

    /// Snapshot of the child list.
    pub fn children(&self) -> Vec<Node> {
        self.0.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.0.children.borrow().len()
    }

    pub fn first_child(&self) -> Option<Node> {
        self.0.children.borrow().first().cloned()
    }

    pub fn last_child(&self) -> Option<Node> {
        self.0.children.borrow().last().cloned()
    }

    fn index_in_parent(&self) -> Option<(Node, usize)> {
        let parent = self.parent()?;
        let index = parent.0.children.borrow().iter().position(|c| c == self)?;
        Some((parent, index))
    }

    pub fn next_sibling(&self) -> Option<Node> {
        let (parent, index) = self.index_in_parent()?;
        parent.0.children.borrow().get(index + 1).cloned()
    }

    pub fn previous_sibling(&self) -> Option<Node> {
        let (parent, index) = self.index_in_parent()?;
        index
            .checked_sub(1)
            .and_then(|i| parent.0.children.borrow().get(i).cloned())
    }

    /// Host of a shadow root.
    pub fn host(&self) -> Option<Node> {
        match &self.0.kind {
            NodeKind::ShadowRoot(root) => root.host.upgrade().map(Node),
            _ => None,
        }
    }

    /// Whether the node's root is a document.
    pub fn is_connected(&self) -> bool {
        let mut current = self.clone();
        loop {
            match &current.0.kind {
                NodeKind::Document => return true,
                NodeKind::ShadowRoot(_) if current.parent().is_none() => match current.host() {
                    Some(host) => current = host,
                    None => return false,
                },
                _ => match current.parent() {
                    Some(parent) => current = parent,
                    None => return false,
                },
            }
        }
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    pub fn append_child(&self, child: &Node) {
        self.insert_before(child, None);
    }

    /// Insert `child` before `reference` (or at the end). Fragments insert
    /// their children and are left empty.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) {
        if reference == Some(child) {
            return;
        }
        if matches!(child.0.kind, NodeKind::Fragment) {
            let moved: Vec<Node> = child.0.children.borrow_mut().drain(..).collect();
            for node in &moved {
                *node.0.parent.borrow_mut() = Weak::new();
            }
            for node in &moved {
                self.insert_before(node, reference);
            }
            return;
        }

        child.remove();

        {
            let mut children = self.0.children.borrow_mut();
            let index = reference
                .and_then(|r| children.iter().position(|c| c == r))
                .unwrap_or(children.len());
            children.insert(index, child.clone());
        }
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);

        if self.is_connected() {
            child.notify_subtree(|lifecycle| lifecycle.connected());
        }
    }

    pub fn remove_child(&self, child: &Node) {
        if child.parent().as_ref() == Some(self) {
            child.remove();
        }
    }

    /// Detach the node from its parent.
    pub fn remove(&self) {
        let Some((parent, index)) = self.index_in_parent() else {
            return;
        };
        let was_connected = parent.is_connected();
        parent.0.children.borrow_mut().remove(index);
        *self.0.parent.borrow_mut() = Weak::new();
        if was_connected {
            self.notify_subtree(|lifecycle| lifecycle.disconnected());
        }
    }

    /// Remove every child.
    pub fn clear_children(&self) {
        for child in self.children() {
            child.remove();
        }
    }

    fn notify_subtree(&self, notify: impl Fn(&dyn ElementLifecycle)) {
        let mut targets = Vec::new();
        self.collect_lifecycles(&mut targets);
        for lifecycle in targets {
            notify(lifecycle.as_ref());
        }
    }

    fn collect_lifecycles(&self, out: &mut Vec<Rc<dyn ElementLifecycle>>) {
        if let Some(el) = self.element_data() {
            if let Some(lifecycle) = el.lifecycle.borrow().as_ref().and_then(Weak::upgrade) {
                out.push(lifecycle);
            }
            if let Some(root) = el.shadow_root.borrow().as_ref() {
                root.collect_lifecycles(out);
            }
        }
        for child in self.children() {
            child.collect_lifecycles(out);
        }
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        let el = self.element_data()?;
        el.attributes
            .borrow()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.get_attribute(name).is_some()
    }

    pub fn has_attributes(&self) -> bool {
        self.element_data()
            .is_some_and(|el| !el.attributes.borrow().is_empty())
    }

    /// Attribute names in document order.
    pub fn attribute_names(&self) -> Vec<String> {
        self.element_data()
            .map(|el| el.attributes.borrow().iter().map(|(n, _)| n.clone()).collect())
            .unwrap_or_default()
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        let Some(el) = self.element_data() else {
            return;
        };
        let old = {
            let mut attributes = el.attributes.borrow_mut();
            match attributes.iter_mut().find(|(n, _)| n == name) {
                Some((_, existing)) => Some(std::mem::replace(existing, value.to_string())),
                None => {
                    attributes.push((name.to_string(), value.to_string()));
                    None
                }
            }
        };
        self.attribute_changed(name, old.as_deref(), Some(value));
    }

    pub fn remove_attribute(&self, name: &str) {
        let Some(el) = self.element_data() else {
            return;
        };
        let old = {
            let mut attributes = el.attributes.borrow_mut();
            attributes
                .iter()
                .position(|(n, _)| n == name)
                .map(|index| attributes.remove(index).1)
        };
        if old.is_some() {
            self.attribute_changed(name, old.as_deref(), None);
        }
    }

    fn attribute_changed(&self, name: &str, old: Option<&str>, new: Option<&str>) {
        let lifecycle = self
            .element_data()
            .and_then(|el| el.lifecycle.borrow().as_ref().and_then(Weak::upgrade));
        if let Some(lifecycle) = lifecycle {
            lifecycle.attribute_changed(name, old, new);
        }
    }

    // =========================================================================
    // Properties
    // =========================================================================

    pub fn set_property(&self, name: &str, value: Value) {
        if let Some(el) = self.element_data() {
            el.properties.borrow_mut().insert(name.to_string(), value);
        }
    }

    pub fn property(&self, name: &str) -> Option<Value> {
        self.element_data()
            .and_then(|el| el.properties.borrow().get(name).cloned())
    }

    // =========================================================================
    // Lifecycle, shadow roots, renderer slot
    // =========================================================================

    /// Register the callbacks this element receives. The element does not keep
    /// the receiver alive.
    pub fn set_lifecycle(&self, lifecycle: Weak<dyn ElementLifecycle>) {
        if let Some(el) = self.element_data() {
            *el.lifecycle.borrow_mut() = Some(lifecycle);
        }
    }

    /// Attach (or return the existing) open shadow root.
    pub fn attach_shadow(&self) -> Node {
        let Some(el) = self.element_data() else {
            return Node::fragment();
        };
        if let Some(root) = el.shadow_root.borrow().as_ref() {
            return root.clone();
        }
        let root = Node::from_kind(NodeKind::ShadowRoot(ShadowRootData {
            host: Rc::downgrade(&self.0),
            adopted_styles: RefCell::new(Vec::new()),
        }));
        *el.shadow_root.borrow_mut() = Some(root.clone());
        root
    }

    pub fn shadow_root(&self) -> Option<Node> {
        self.element_data()
            .and_then(|el| el.shadow_root.borrow().clone())
    }

    /// Replace the constructable stylesheets adopted by a shadow root.
    pub fn set_adopted_styles(&self, styles: Vec<String>) {
        if let NodeKind::ShadowRoot(root) = &self.0.kind {
            *root.adopted_styles.borrow_mut() = styles;
        }
    }

    pub fn adopted_styles(&self) -> Vec<String> {
        match &self.0.kind {
            NodeKind::ShadowRoot(root) => root.adopted_styles.borrow().clone(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn render_state(&self) -> Option<Rc<dyn Any>> {
        self.0.render_state.borrow().clone()
    }

    pub(crate) fn set_render_state(&self, state: Option<Rc<dyn Any>>) {
        *self.0.render_state.borrow_mut() = state;
    }

    // =========================================================================
    // Cloning
    // =========================================================================

    /// Clone the node; `deep` also clones children and template content.
    /// Properties, listeners and shadow roots are not copied.
    pub fn clone_node(&self, deep: bool) -> Node {
        let copy = match &self.0.kind {
            NodeKind::Element(el) => {
                let copy = Node::element_ns(&el.tag, el.namespace);
                if let Some(copy_el) = copy.element_data() {
                    *copy_el.attributes.borrow_mut() = el.attributes.borrow().clone();
                    if let (true, Some(src), Some(dst)) = (deep, &el.content, &copy_el.content) {
                        for child in src.children() {
                            dst.append_child(&child.clone_node(true));
                        }
                    }
                }
                copy
            }
            NodeKind::Text(data) => Node::text(&data.borrow()),
            NodeKind::Comment(data) => Node::comment(&data.borrow()),
            NodeKind::Document | NodeKind::Fragment | NodeKind::ShadowRoot(_) => Node::fragment(),
        };
        if deep {
            for child in self.children() {
                copy.append_child(&child.clone_node(true));
            }
        }
        copy
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// First descendant element matching a simple compound selector.
    pub fn query_selector(&self, selector: &str) -> Option<Node> {
        let selector = Selector::parse(selector)?;
        let mut found = None;
        self.walk_elements(&mut |node| {
            if found.is_none() && selector.matches(node) {
                found = Some(node.clone());
            }
        });
        found
    }

    /// Every descendant element matching a simple compound selector.
    pub fn query_selector_all(&self, selector: &str) -> Vec<Node> {
        let Some(selector) = Selector::parse(selector) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        self.walk_elements(&mut |node| {
            if selector.matches(node) {
                found.push(node.clone());
            }
        });
        found
    }

    fn walk_elements(&self, visit: &mut dyn FnMut(&Node)) {
        for child in self.children() {
            if child.is_element() {
                visit(&child);
            }
            child.walk_elements(visit);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_insert_and_navigate() {
        let parent = Node::element("div");
        let a = Node::text("a");
        let b = Node::text("b");
        let c = Node::text("c");
        parent.append_child(&a);
        parent.append_child(&c);
        parent.insert_before(&b, Some(&c));

        assert_eq!(parent.children(), vec![a.clone(), b.clone(), c.clone()]);
        assert_eq!(b.previous_sibling(), Some(a.clone()));
        assert_eq!(b.next_sibling(), Some(c.clone()));
        assert_eq!(c.next_sibling(), None);
        assert_eq!(b.parent(), Some(parent.clone()));
    }

    #[test]
    fn test_fragment_insertion_moves_children() {
        let parent = Node::element("div");
        let fragment = Node::fragment();
        fragment.append_child(&Node::text("x"));
        fragment.append_child(&Node::element("span"));
        parent.append_child(&fragment);

        assert_eq!(parent.child_count(), 2);
        assert_eq!(fragment.child_count(), 0);
        assert_eq!(parent.first_child().and_then(|n| n.parent()), Some(parent.clone()));
    }

    #[test]
    fn test_reinsert_moves_node() {
        let a = Node::element("div");
        let b = Node::element("div");
        let child = Node::text("x");
        a.append_child(&child);
        b.append_child(&child);
        assert_eq!(a.child_count(), 0);
        assert_eq!(child.parent(), Some(b));
    }

    #[test]
    fn test_attributes() {
        let el = Node::element("DIV");
        assert_eq!(el.tag_name(), Some("div"));
        el.set_attribute("id", "x");
        el.set_attribute("class", "a");
        el.set_attribute("id", "y");
        assert_eq!(el.get_attribute("id"), Some("y".to_string()));
        assert_eq!(el.attribute_names(), vec!["id", "class"]);
        el.remove_attribute("id");
        assert!(!el.has_attribute("id"));
    }

    struct Recorder {
        connected: Cell<usize>,
        disconnected: Cell<usize>,
        changes: RefCell<Vec<(String, Option<String>, Option<String>)>>,
    }

    impl ElementLifecycle for Recorder {
        fn connected(&self) {
            self.connected.set(self.connected.get() + 1);
        }
        fn disconnected(&self) {
            self.disconnected.set(self.disconnected.get() + 1);
        }
        fn attribute_changed(&self, name: &str, old: Option<&str>, new: Option<&str>) {
            self.changes.borrow_mut().push((
                name.to_string(),
                old.map(str::to_string),
                new.map(str::to_string),
            ));
        }
    }

    #[test]
    fn test_lifecycle_callbacks() {
        let recorder = Rc::new(Recorder {
            connected: Cell::new(0),
            disconnected: Cell::new(0),
            changes: RefCell::new(Vec::new()),
        });
        let el = Node::element("x-el");
        let weak: Weak<dyn ElementLifecycle> = Rc::downgrade(&recorder) as Weak<dyn ElementLifecycle>;
        el.set_lifecycle(weak);

        let wrapper = Node::element("div");
        wrapper.append_child(&el);
        assert_eq!(recorder.connected.get(), 0, "not connected without a document");

        let document = Node::document();
        document.append_child(&wrapper);
        assert_eq!(recorder.connected.get(), 1);
        assert!(el.is_connected());

        el.set_attribute("a", "1");
        el.set_attribute("a", "2");
        el.remove_attribute("a");
        assert_eq!(recorder.changes.borrow().len(), 3);
        assert_eq!(
            recorder.changes.borrow()[1],
            ("a".to_string(), Some("1".to_string()), Some("2".to_string()))
        );

        wrapper.remove();
        assert_eq!(recorder.disconnected.get(), 1);
        assert!(!el.is_connected());
    }

    #[test]
    fn test_shadow_root_connection() {
        let host = Node::element("x-host");
        let root = host.attach_shadow();
        let inner = Node::element("span");
        root.append_child(&inner);
        assert_eq!(root.host(), Some(host.clone()));
        assert!(!inner.is_connected());

        let document = Node::document();
        document.append_child(&host);
        assert!(inner.is_connected());
        assert_eq!(host.attach_shadow(), root);
    }

    #[test]
    fn test_clone_node_deep() {
        let template = Node::element("template");
        let content = template.template_content().unwrap();
        let div = Node::element("div");
        div.set_attribute("id", "a");
        div.append_child(&Node::text("hi"));
        content.append_child(&div);

        let copy = template.clone_node(true);
        let copy_content = copy.template_content().unwrap();
        let copy_div = copy_content.first_child().unwrap();
        assert_ne!(copy_div, div);
        assert_eq!(copy_div.get_attribute("id"), Some("a".to_string()));
        assert_eq!(copy_div.text_content(), "hi");
    }

    #[test]
    fn test_query_selector() {
        let root = Node::element("div");
        let a = Node::element("span");
        a.set_attribute("class", "item first");
        let b = Node::element("span");
        b.set_attribute("id", "second");
        b.set_attribute("class", "item");
        root.append_child(&a);
        a.append_child(&b);

        assert_eq!(root.query_selector("span"), Some(a.clone()));
        assert_eq!(root.query_selector("#second"), Some(b.clone()));
        assert_eq!(root.query_selector("span.first"), Some(a));
        assert_eq!(root.query_selector_all(".item").len(), 2);
        assert_eq!(root.query_selector("[id=second]"), Some(b));
        assert_eq!(root.query_selector("p"), None);
    }
}
