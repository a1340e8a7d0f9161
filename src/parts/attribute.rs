//! Attribute and property parts.
//!
//! One committer owns an attribute (or property) and its literal strings; it
//! hands out one part per expression. Parts mark the committer dirty when
//! their value changes, and the committer rebuilds and writes the full value
//! at most once per commit.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::{Part, PartKind};
use crate::dom::Node;
use crate::error::Result;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommitTarget {
    Attribute,
    Property,
}

/// Shared writer for a multi-expression attribute or property.
pub struct AttributeCommitter {
    element: Node,
    name: String,
    strings: Vec<String>,
    values: RefCell<Vec<Value>>,
    dirty: Cell<bool>,
    target: CommitTarget,
}

impl AttributeCommitter {
    /// Committer writing the `name` attribute.
    pub fn attribute(element: &Node, name: &str, strings: &[String]) -> Rc<Self> {
        Self::new(element, name, strings, CommitTarget::Attribute)
    }

    /// Committer writing the `name` property.
    pub fn property(element: &Node, name: &str, strings: &[String]) -> Rc<Self> {
        Self::new(element, name, strings, CommitTarget::Property)
    }

    fn new(element: &Node, name: &str, strings: &[String], target: CommitTarget) -> Rc<Self> {
        let slots = strings.len().saturating_sub(1);
        Rc::new(Self {
            element: element.clone(),
            name: name.to_string(),
            strings: strings.to_vec(),
            values: RefCell::new(vec![Value::Null; slots]),
            dirty: Cell::new(true),
            target,
        })
    }

    /// One part per expression slot.
    pub fn parts(self: &Rc<Self>) -> Vec<Rc<dyn Part>> {
        (0..self.strings.len().saturating_sub(1))
            .map(|slot| AttributePart::new(self.clone(), slot) as Rc<dyn Part>)
            .collect()
    }

    fn is_single(&self) -> bool {
        self.strings.len() == 2 && self.strings.iter().all(String::is_empty)
    }

    /// Literal strings interleaved with the slot values' text.
    fn joined(&self) -> String {
        let values = self.values.borrow();
        let mut text = String::new();
        for (literal, value) in self.strings.iter().zip(values.iter()) {
            text.push_str(literal);
            text.push_str(&value.to_text());
        }
        if let Some(last) = self.strings.last() {
            text.push_str(last);
        }
        text
    }

    /// Write the value if any slot changed since the last write.
    pub fn commit(&self) {
        if !self.dirty.replace(false) {
            return;
        }
        match self.target {
            CommitTarget::Attribute => {
                let text = self.joined();
                self.element.set_attribute(&self.name, &text);
            }
            CommitTarget::Property => {
                let value = if self.is_single() {
                    self.values.borrow()[0].clone()
                } else {
                    Value::Str(self.joined())
                };
                self.element.set_property(&self.name, value);
            }
        }
    }
}

/// One expression slot of an [`AttributeCommitter`].
pub struct AttributePart {
    committer: Rc<AttributeCommitter>,
    slot: usize,
    this: Weak<AttributePart>,
}

impl AttributePart {
    fn new(committer: Rc<AttributeCommitter>, slot: usize) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            committer,
            slot,
            this: this.clone(),
        })
    }

    pub fn committer(&self) -> &Rc<AttributeCommitter> {
        &self.committer
    }

    fn value(&self) -> Value {
        self.committer.values.borrow()[self.slot].clone()
    }
}

impl Part for AttributePart {
    fn kind(&self) -> PartKind {
        match self.committer.target {
            CommitTarget::Attribute => PartKind::Attribute,
            CommitTarget::Property => PartKind::Property,
        }
    }

    fn set_value(&self, value: Value) {
        if matches!(value, Value::NoChange) {
            return;
        }
        let mut values = self.committer.values.borrow_mut();
        let current = &mut values[self.slot];
        if value.is_primitive() && current.same_primitive(&value) {
            return;
        }
        let deferred = matches!(value, Value::Directive(_));
        *current = value;
        if !deferred {
            self.committer.dirty.set(true);
        }
    }

    fn commit(&self) -> Result<()> {
        while let Value::Directive(directive) = self.value() {
            self.committer.values.borrow_mut()[self.slot] = Value::NoChange;
            if let Some(this) = self.this.upgrade() {
                directive.invoke(&(this as Rc<dyn Part>));
            }
        }
        if !matches!(self.value(), Value::NoChange) {
            self.committer.commit();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Directive;

    fn strings(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_multi_expression_attribute_writes_once() {
        let el = Node::element("div");
        let committer = AttributeCommitter::attribute(&el, "class", &strings(&["a ", " b ", ""]));
        let parts = committer.parts();
        parts[0].set_value("x".into());
        parts[1].set_value(1.into());
        parts[0].commit().unwrap();
        assert_eq!(el.get_attribute("class").as_deref(), Some("a x b 1"));
        assert!(!committer.dirty.get());

        // Same primitive values leave the committer clean.
        parts[0].set_value("x".into());
        parts[1].set_value(1.into());
        assert!(!committer.dirty.get());

        parts[1].set_value(2.into());
        parts[0].commit().unwrap();
        assert_eq!(el.get_attribute("class").as_deref(), Some("a x b 2"));
    }

    #[test]
    fn test_single_property_writes_raw_value() {
        let el = Node::element("input");
        let committer = AttributeCommitter::property(&el, "value", &strings(&["", ""]));
        let parts = committer.parts();
        assert_eq!(parts[0].kind(), PartKind::Property);
        parts[0].set_value(42.into());
        parts[0].commit().unwrap();
        assert_eq!(el.property("value"), Some(Value::Number(42.0)));
        assert!(!el.has_attribute("value"));
    }

    #[test]
    fn test_multi_property_writes_string() {
        let el = Node::element("input");
        let committer = AttributeCommitter::property(&el, "title", &strings(&["a-", ""]));
        let parts = committer.parts();
        parts[0].set_value(1.into());
        parts[0].commit().unwrap();
        assert_eq!(el.property("title"), Some(Value::from("a-1")));
    }

    #[test]
    fn test_directive_sets_attribute_value() {
        let el = Node::element("div");
        let committer = AttributeCommitter::attribute(&el, "id", &strings(&["", ""]));
        let parts = committer.parts();
        parts[0].set_value(Value::Directive(Directive::new(|part| part.set_value("late".into()))));
        parts[0].commit().unwrap();
        assert_eq!(el.get_attribute("id").as_deref(), Some("late"));
    }
}
