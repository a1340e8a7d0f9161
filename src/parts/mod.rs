//! Parts - binding locations that own one slot of a template.
//!
//! A part is created once per descriptor when a template instance is cloned
//! and keeps its location for life; only its value changes. Every commit goes
//! through the same two steps:
//!
//! 1. `set_value` stores a pending value
//! 2. `commit` resolves directives, then reconciles the live tree
//!
//! | Binding          | Part                     |
//! |------------------|--------------------------|
//! | `<p>${v}</p>`    | [`NodePart`]             |
//! | `class="a ${v}"` | [`AttributePart`]        |
//! | `.value=${v}`    | [`AttributePart`] (property target) |
//! | `?hidden=${v}`   | [`BooleanAttributePart`] |
//! | `@click=${v}`    | [`EventPart`]            |

mod attribute;
mod boolean;
mod event;
mod node;
mod processor;

pub use attribute::{AttributeCommitter, AttributePart};
pub use boolean::BooleanAttributePart;
pub use event::EventPart;
pub use node::NodePart;
pub use processor::{DefaultTemplateProcessor, TemplateProcessor, default_processor};

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Result;
use crate::value::Value;

/// Which binding rule a part implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Node,
    Attribute,
    Property,
    BooleanAttribute,
    Event,
}

/// A binding location with a pending and a committed value.
pub trait Part {
    fn kind(&self) -> PartKind;

    /// Store the value the next commit applies.
    fn set_value(&self, value: Value);

    /// Apply the pending value to the live tree.
    fn commit(&self) -> Result<()>;
}

/// Invoke pending directives until the pending value is concrete. A directive
/// that never sets a value leaves `NoChange` behind.
pub(crate) fn resolve_directives(part: Rc<dyn Part>, pending: &RefCell<Value>) {
    loop {
        match pending.replace(Value::NoChange) {
            Value::Directive(directive) => directive.invoke(&part),
            concrete => {
                pending.replace(concrete);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Node;
    use crate::render::RenderOptions;
    use crate::value::Directive;
    use std::cell::Cell;

    #[test]
    fn test_directive_loop_runs_until_concrete() {
        let container = Node::element("div");
        let part = NodePart::new(RenderOptions::default());
        part.append_into(&container);

        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let inner = Directive::new(|part| part.set_value("done".into()));
        part.set_value(Value::Directive(Directive::new(move |part| {
            counter.set(counter.get() + 1);
            part.set_value(Value::Directive(inner.clone()));
        })));
        part.commit().unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(container.text_content(), "done");
    }

    #[test]
    fn test_directive_without_value_leaves_part_uncommitted() {
        let container = Node::element("div");
        let part = NodePart::new(RenderOptions::default());
        part.append_into(&container);
        part.set_value(Value::Directive(Directive::new(|_| {})));
        part.commit().unwrap();
        assert_eq!(container.child_count(), 2);
        assert_eq!(container.text_content(), "");
    }
}
