//! Events - listener registration and dispatch on host nodes.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{Node, NodeKind, host_profile};
use crate::value::Value;

/// Callback registered with [`Node::add_event_listener`].
pub type EventCallback = Rc<dyn Fn(&Event)>;

/// Options a listener asks to be registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListenerOptions {
    pub capture: bool,
    pub passive: bool,
    pub once: bool,
}

/// Third argument of listener registration: an options record, or the legacy
/// capture flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerArg {
    Options(ListenerOptions),
    Capture(bool),
}

impl ListenerArg {
    pub fn capture(&self) -> bool {
        match self {
            ListenerArg::Options(options) => options.capture,
            ListenerArg::Capture(capture) => *capture,
        }
    }
}

impl Default for ListenerArg {
    fn default() -> Self {
        ListenerArg::Capture(false)
    }
}

pub(super) struct ListenerRecord {
    event_type: String,
    callback: EventCallback,
    options: ListenerOptions,
}

impl ListenerRecord {
    fn same(&self, event_type: &str, callback: &EventCallback, capture: bool) -> bool {
        self.event_type == event_type
            && std::ptr::addr_eq(Rc::as_ptr(&self.callback), Rc::as_ptr(callback))
            && self.options.capture == capture
    }
}

// =============================================================================
// Event
// =============================================================================

/// A dispatched event.
pub struct Event {
    event_type: String,
    bubbles: bool,
    detail: Value,
    target: RefCell<Option<Node>>,
    current_target: RefCell<Option<Node>>,
    propagation_stopped: Cell<bool>,
}

impl Event {
    pub fn new(event_type: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
            bubbles: false,
            detail: Value::Null,
            target: RefCell::new(None),
            current_target: RefCell::new(None),
            propagation_stopped: Cell::new(false),
        }
    }

    pub fn bubbling(mut self) -> Self {
        self.bubbles = true;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<Value>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    pub fn detail(&self) -> &Value {
        &self.detail
    }

    pub fn target(&self) -> Option<Node> {
        self.target.borrow().clone()
    }

    pub fn current_target(&self) -> Option<Node> {
        self.current_target.borrow().clone()
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }
}

// =============================================================================
// Registration and dispatch
// =============================================================================

impl Node {
    /// Register a listener. Hosts without listener-options support read an
    /// options record as a truthy capture flag.
    pub fn add_event_listener(&self, event_type: &str, callback: &EventCallback, arg: ListenerArg) {
        let NodeKind::Element(el) = &self.0.kind else {
            return;
        };
        let options = match arg {
            ListenerArg::Options(options) if host_profile().listener_options => options,
            ListenerArg::Options(_) => ListenerOptions {
                capture: true,
                ..ListenerOptions::default()
            },
            ListenerArg::Capture(capture) => ListenerOptions {
                capture,
                ..ListenerOptions::default()
            },
        };
        let mut listeners = el.listeners.borrow_mut();
        if listeners
            .iter()
            .any(|r| r.same(event_type, callback, options.capture))
        {
            return;
        }
        listeners.push(ListenerRecord {
            event_type: event_type.to_string(),
            callback: callback.clone(),
            options,
        });
    }

    /// Remove a listener registered with the same callback and capture flag.
    pub fn remove_event_listener(&self, event_type: &str, callback: &EventCallback, arg: ListenerArg) {
        let NodeKind::Element(el) = &self.0.kind else {
            return;
        };
        let capture = match arg {
            ListenerArg::Options(_) if !host_profile().listener_options => true,
            other => other.capture(),
        };
        el.listeners
            .borrow_mut()
            .retain(|r| !r.same(event_type, callback, capture));
    }

    /// Registered listeners as `(type, options)` pairs.
    pub fn event_listeners(&self) -> Vec<(String, ListenerOptions)> {
        match &self.0.kind {
            NodeKind::Element(el) => el
                .listeners
                .borrow()
                .iter()
                .map(|r| (r.event_type.clone(), r.options))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Dispatch `event` with this node as target: capture from the root down,
    /// the target itself, then bubbling back up if the event bubbles.
    pub fn dispatch_event(&self, event: &Event) {
        *event.target.borrow_mut() = Some(self.clone());

        let mut path = Vec::new();
        let mut current = self.parent().or_else(|| self.host());
        while let Some(node) = current {
            current = node.parent().or_else(|| node.host());
            path.push(node);
        }

        for node in path.iter().rev() {
            if event.propagation_stopped.get() {
                return;
            }
            node.invoke_listeners(event, Some(true));
        }
        if event.propagation_stopped.get() {
            return;
        }
        self.invoke_listeners(event, None);
        if !event.bubbles {
            return;
        }
        for node in &path {
            if event.propagation_stopped.get() {
                return;
            }
            node.invoke_listeners(event, Some(false));
        }
    }

    fn invoke_listeners(&self, event: &Event, capture: Option<bool>) {
        let NodeKind::Element(el) = &self.0.kind else {
            return;
        };
        let matching: Vec<(EventCallback, ListenerOptions)> = el
            .listeners
            .borrow()
            .iter()
            .filter(|r| r.event_type == event.event_type)
            .filter(|r| capture.is_none_or(|c| r.options.capture == c))
            .map(|r| (r.callback.clone(), r.options))
            .collect();

        *event.current_target.borrow_mut() = Some(self.clone());
        for (callback, options) in matching {
            if options.once {
                el.listeners
                    .borrow_mut()
                    .retain(|r| !r.same(&event.event_type, &callback, options.capture));
            }
            callback(event);
        }
        *event.current_target.borrow_mut() = None;
    }
}
