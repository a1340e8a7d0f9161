//! Boolean attribute parts (`?name=${value}`).

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::{Part, PartKind, resolve_directives};
use crate::dom::Node;
use crate::error::{Error, Result};
use crate::value::Value;

/// Sets `name` to the empty string while the value is truthy, removes it
/// otherwise.
pub struct BooleanAttributePart {
    element: Node,
    name: String,
    committed: Cell<Option<bool>>,
    pending: RefCell<Value>,
    this: Weak<BooleanAttributePart>,
}

impl BooleanAttributePart {
    /// Fails unless the binding is exactly one expression spanning the value.
    pub fn new(element: &Node, name: &str, strings: &[String]) -> Result<Rc<Self>> {
        if strings.len() != 2 || strings.iter().any(|s| !s.is_empty()) {
            return Err(Error::BooleanAttributeArity {
                name: name.to_string(),
            });
        }
        Ok(Rc::new_cyclic(|this| Self {
            element: element.clone(),
            name: name.to_string(),
            committed: Cell::new(None),
            pending: RefCell::new(Value::NoChange),
            this: this.clone(),
        }))
    }
}

impl Part for BooleanAttributePart {
    fn kind(&self) -> PartKind {
        PartKind::BooleanAttribute
    }

    fn set_value(&self, value: Value) {
        *self.pending.borrow_mut() = value;
    }

    fn commit(&self) -> Result<()> {
        if let Some(this) = self.this.upgrade() {
            resolve_directives(this, &self.pending);
        }
        let value = self.pending.replace(Value::NoChange);
        if matches!(value, Value::NoChange) {
            return Ok(());
        }
        let present = value.is_truthy();
        if self.committed.get() != Some(present) {
            if present {
                self.element.set_attribute(&self.name, "");
            } else {
                self.element.remove_attribute(&self.name);
            }
            self.committed.set(Some(present));
        }
        Ok(())
    }
}
