//! Event parts (`@event=${listener}`).

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::{Part, PartKind, resolve_directives};
use crate::dom::{Event, EventCallback, ListenerArg, ListenerOptions, Node, listener_options_supported};
use crate::error::{Error, Result};
use crate::value::{EventHandler, Listener, Value};

/// Keeps one registered callback on the element and forwards events to the
/// currently bound listener.
pub struct EventPart {
    element: Node,
    event_name: String,
    event_context: Option<Node>,
    value: RefCell<Option<Listener>>,
    pending: RefCell<Value>,
    /// What the callback was last registered with.
    registered: Cell<Option<ListenerArg>>,
    bound: EventCallback,
    this: Weak<EventPart>,
}

/// Registration argument for `options`: the full record when the host
/// supports it, otherwise only the capture flag.
fn registration_arg(options: ListenerOptions) -> ListenerArg {
    if listener_options_supported() {
        ListenerArg::Options(options)
    } else {
        ListenerArg::Capture(options.capture)
    }
}

impl EventPart {
    pub fn new(element: &Node, event_name: &str, event_context: Option<Node>) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<EventPart>| {
            let weak = this.clone();
            let bound: EventCallback = Rc::new(move |event: &Event| {
                if let Some(part) = weak.upgrade() {
                    part.handle_event(event);
                }
            });
            Self {
                element: element.clone(),
                event_name: event_name.to_string(),
                event_context,
                value: RefCell::new(None),
                pending: RefCell::new(Value::NoChange),
                registered: Cell::new(None),
                bound,
                this: this.clone(),
            }
        })
    }

    fn handle_event(&self, event: &Event) {
        let Some(listener) = self.value.borrow().clone() else {
            return;
        };
        match listener.handler() {
            EventHandler::Function(f) => {
                let context = self.event_context.as_ref().unwrap_or(&self.element);
                f(event, context);
            }
            EventHandler::Object(object) => object.handle_event(event),
        }
    }
}

impl Part for EventPart {
    fn kind(&self) -> PartKind {
        PartKind::Event
    }

    fn set_value(&self, value: Value) {
        *self.pending.borrow_mut() = value;
    }

    fn commit(&self) -> Result<()> {
        if let Some(this) = self.this.upgrade() {
            resolve_directives(this, &self.pending);
        }
        let next = match self.pending.replace(Value::NoChange) {
            Value::NoChange => return Ok(()),
            Value::Null | Value::Nothing => None,
            Value::Listener(listener) => Some(listener),
            other => {
                return Err(Error::InvalidListener {
                    event: self.event_name.clone(),
                    found: other.kind_name(),
                });
            }
        };

        let previous_options = self.value.borrow().as_ref().map(Listener::options);
        let next_options = next.as_ref().map(Listener::options);
        let should_remove = next_options.is_none()
            || previous_options.is_some_and(|previous| Some(previous) != next_options);
        let should_add = next_options.is_some() && (previous_options.is_none() || should_remove);

        if should_remove {
            if let Some(arg) = self.registered.take() {
                self.element
                    .remove_event_listener(&self.event_name, &self.bound, arg);
            }
        }
        if let (true, Some(options)) = (should_add, next_options) {
            let arg = registration_arg(options);
            self.registered.set(Some(arg));
            self.element
                .add_event_listener(&self.event_name, &self.bound, arg);
        }
        *self.value.borrow_mut() = next;
        Ok(())
    }
}
