//! Node parts - a range of child nodes between two marker nodes.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::{Part, PartKind, resolve_directives};
use crate::dom::Node;
use crate::error::{Error, Result};
use crate::render::RenderOptions;
use crate::template::{Template, TemplateInstance, TemplateResult};
use crate::value::Value;

/// What a node part currently shows.
enum Committed {
    Unset,
    /// A text node holding this value's text form.
    Text(Value),
    Node(Node),
    Instance(Rc<TemplateInstance>),
    /// One child part per item, in order.
    Items(Vec<Rc<NodePart>>),
    Nothing,
}

/// Child-node binding. Owns every node strictly between `start` and `end`.
pub struct NodePart {
    options: RenderOptions,
    start: RefCell<Option<Node>>,
    end: RefCell<Option<Node>>,
    committed: RefCell<Committed>,
    pending: RefCell<Value>,
    this: Weak<NodePart>,
}

impl fmt::Debug for NodePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodePart")
            .field("start", &self.start.borrow())
            .field("end", &self.end.borrow())
            .finish()
    }
}

impl NodePart {
    pub fn new(options: RenderOptions) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            options,
            start: RefCell::new(None),
            end: RefCell::new(None),
            committed: RefCell::new(Committed::Unset),
            pending: RefCell::new(Value::Null),
            this: this.clone(),
        })
    }

    pub fn start_node(&self) -> Option<Node> {
        self.start.borrow().clone()
    }

    pub fn end_node(&self) -> Option<Node> {
        self.end.borrow().clone()
    }

    /// Template of the instance this part currently shows, if any.
    pub(crate) fn instance_template(&self) -> Option<Rc<Template>> {
        match &*self.committed.borrow() {
            Committed::Instance(instance) => Some(instance.template().clone()),
            _ => None,
        }
    }

    // =========================================================================
    // Attaching
    // =========================================================================

    /// Append fresh start and end markers to `container`.
    pub fn append_into(&self, container: &Node) {
        let start = Node::comment("");
        let end = Node::comment("");
        container.append_child(&start);
        container.append_child(&end);
        *self.start.borrow_mut() = Some(start);
        *self.end.borrow_mut() = Some(end);
    }

    /// Use `node` as the start marker and its next sibling as the end marker.
    pub fn insert_after_node(&self, node: &Node) {
        *self.end.borrow_mut() = node.next_sibling();
        *self.start.borrow_mut() = Some(node.clone());
    }

    /// Append fresh markers at the end of another part's range.
    pub fn append_into_part(&self, part: &NodePart) {
        let start = Node::comment("");
        let end = Node::comment("");
        part.insert(&start);
        part.insert(&end);
        *self.start.borrow_mut() = Some(start);
        *self.end.borrow_mut() = Some(end);
    }

    /// Insert directly after `part`, taking over its end marker. `part` ends
    /// at the new start marker afterwards.
    pub fn insert_after_part(&self, part: &NodePart) {
        let start = Node::comment("");
        part.insert(&start);
        *self.end.borrow_mut() = part.end.replace(Some(start.clone()));
        *self.start.borrow_mut() = Some(start);
    }

    /// Insert `node` just before the end marker.
    fn insert(&self, node: &Node) {
        let end = self.end.borrow().clone();
        let parent = end
            .as_ref()
            .and_then(Node::parent)
            .or_else(|| self.start.borrow().as_ref().and_then(Node::parent));
        if let Some(parent) = parent {
            parent.insert_before(node, end.as_ref());
        }
    }

    // =========================================================================
    // Clearing
    // =========================================================================

    /// Remove everything between the markers.
    pub fn clear(&self) {
        if let Some(start) = self.start_node() {
            self.clear_from(&start);
        }
    }

    /// Remove every node after `from` up to the end marker.
    fn clear_from(&self, from: &Node) {
        let end = self.end_node();
        let mut next = from.next_sibling();
        while let Some(node) = next {
            if Some(&node) == end.as_ref() {
                break;
            }
            next = node.next_sibling();
            node.remove();
        }
    }

    // =========================================================================
    // Committing
    // =========================================================================

    fn commit_text(&self, value: Value) -> Result<()> {
        let text = value.to_text();
        let start = self.start_node().ok_or(Error::DetachedPart)?;
        let first = start.next_sibling();
        let last = self.end_node().map_or_else(|| start.parent().and_then(|p| p.last_child()), |end| end.previous_sibling());
        match first {
            Some(node) if Some(&node) == last.as_ref() && node.is_text() => node.set_data(&text),
            _ => self.commit_node(Node::text(&text))?,
        }
        *self.committed.borrow_mut() = Committed::Text(value);
        Ok(())
    }

    fn commit_node(&self, node: Node) -> Result<()> {
        if matches!(&*self.committed.borrow(), Committed::Node(current) if *current == node) {
            return Ok(());
        }
        if self.start.borrow().is_none() {
            return Err(Error::DetachedPart);
        }
        self.clear();
        self.insert(&node);
        *self.committed.borrow_mut() = Committed::Node(node);
        Ok(())
    }

    fn commit_template_result(&self, result: TemplateResult) -> Result<()> {
        result.check_arity()?;
        let template = (self.options.template_factory())(&result)?;
        let reusable = match &*self.committed.borrow() {
            Committed::Instance(instance) if Rc::ptr_eq(instance.template(), &template) => {
                Some(instance.clone())
            }
            _ => None,
        };
        if let Some(instance) = reusable {
            return instance.update(result.values());
        }

        let instance = Rc::new(TemplateInstance::new(
            template,
            result.processor().clone(),
            self.options.clone(),
        ));
        let fragment = instance.clone_fragment()?;
        instance.update(result.values())?;
        self.commit_node(fragment)?;
        *self.committed.borrow_mut() = Committed::Instance(instance);
        Ok(())
    }

    /// Positional diff: item N always lands in child part N.
    fn commit_iterable(&self, items: Vec<Value>) -> Result<()> {
        let previous = std::mem::replace(&mut *self.committed.borrow_mut(), Committed::Unset);
        let mut children = match previous {
            Committed::Items(children) => children,
            _ => {
                self.clear();
                Vec::new()
            }
        };

        let count = items.len();
        for (index, item) in items.into_iter().enumerate() {
            let child = match children.get(index) {
                Some(child) => child.clone(),
                None => {
                    let child = NodePart::new(self.options.clone());
                    match index.checked_sub(1).and_then(|i| children.get(i)) {
                        Some(previous) => child.insert_after_part(previous),
                        None => child.append_into_part(self),
                    }
                    children.push(child.clone());
                    child
                }
            };
            child.set_value(item);
            if let Err(err) = child.commit() {
                *self.committed.borrow_mut() = Committed::Items(children);
                return Err(err);
            }
        }

        if count < children.len() {
            children.truncate(count);
            let from = children.last().and_then(|last| last.end_node());
            match from.or_else(|| self.start_node()) {
                Some(from) => self.clear_from(&from),
                None => self.clear(),
            }
        }
        *self.committed.borrow_mut() = Committed::Items(children);
        Ok(())
    }
}

impl Part for NodePart {
    fn kind(&self) -> PartKind {
        PartKind::Node
    }

    fn set_value(&self, value: Value) {
        *self.pending.borrow_mut() = value;
    }

    fn commit(&self) -> Result<()> {
        if let Some(this) = self.this.upgrade() {
            resolve_directives(this, &self.pending);
        }
        let value = self.pending.replace(Value::NoChange);
        match value {
            Value::NoChange => Ok(()),
            value if value.is_primitive() => {
                let unchanged = matches!(
                    &*self.committed.borrow(),
                    Committed::Text(current) if current.same_primitive(&value)
                );
                if unchanged { Ok(()) } else { self.commit_text(value) }
            }
            Value::Template(result) => self.commit_template_result(result),
            Value::Node(node) => self.commit_node(node),
            Value::List(items) => self.commit_iterable(items),
            Value::Nothing => {
                *self.committed.borrow_mut() = Committed::Nothing;
                self.clear();
                Ok(())
            }
            other => self.commit_text(other),
        }
    }
}
