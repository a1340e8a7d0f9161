//! Reactive elements - declared properties driving batched, asynchronous renders.
//!
//! A [`ReactiveElement`] pairs a host element with a [`Component`]. Property
//! writes are recorded and folded into a single update cycle that runs on the
//! microtask queue:
//!
//! ```text
//! set ─► changed? ─► record old value ─► mark reflection ─► enqueue (once)
//!                                                              │
//!     await previous cycle ◄───────────────────────────────────┘
//!     await first connection
//!     should_update ─► reflect ─► render ─► first_updated ─► updated
//!     clear changes ─► resolve completion
//! ```
//!
//! Attribute changes on the host map back to properties through the
//! definition's reverse index. Reflection in either direction sets a guard
//! flag so the two paths never feed each other.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use futures::FutureExt;
use futures::channel::oneshot;
use indexmap::{IndexMap, IndexSet};

use super::declaration::{PropertyDeclaration, not_equal};
use super::definition::ElementDefinition;
use super::styles::{CssStyles, StyleAdoption, adopt_styles, append_style_elements};
use super::update::{UpdateComplete, UpdateResult, UpdateState, resolved};
use crate::dom::{ElementLifecycle, Node, NodeType};
use crate::error::{Error, Result};
use crate::render::{RenderOptions, render_scoped, scoping_shim};
use crate::scheduler::spawn_local;
use crate::template::TemplateResult;
use crate::value::Value;

/// Property name to the value it had before the first write of the cycle.
pub type ChangedProperties = IndexMap<String, Value>;

// =============================================================================
// Component
// =============================================================================

/// The user side of a reactive element.
///
/// Hooks receive the element handle to read properties; they must not hold
/// borrows of their own state across calls back into the element.
pub trait Component: 'static {
    /// Host tag name, also the style scope.
    fn tag_name() -> &'static str
    where
        Self: Sized;

    fn properties() -> Vec<PropertyDeclaration>
    where
        Self: Sized,
    {
        Vec::new()
    }

    fn styles() -> Vec<CssStyles>
    where
        Self: Sized,
    {
        Vec::new()
    }

    /// Node rendered into. An open shadow root by default.
    fn create_render_root(&self, host: &Node) -> Node {
        host.attach_shadow()
    }

    /// Gate for a cycle. Returning `false` skips rendering but still
    /// completes the cycle.
    fn should_update(&self, _element: &ReactiveElement, _changed: &ChangedProperties) -> anyhow::Result<bool> {
        Ok(true)
    }

    /// The element's content; `None` leaves the render root untouched.
    fn render(&self, element: &ReactiveElement) -> anyhow::Result<Option<TemplateResult>>;

    /// After the first rendered cycle only.
    fn first_updated(&self, _element: &ReactiveElement, _changed: &ChangedProperties) -> anyhow::Result<()> {
        Ok(())
    }

    /// After every rendered cycle.
    fn updated(&self, _element: &ReactiveElement, _changed: &ChangedProperties) -> anyhow::Result<()> {
        Ok(())
    }
}

// =============================================================================
// ReactiveElement
// =============================================================================

struct ElementState {
    definition: Rc<ElementDefinition>,
    component: Box<dyn Component>,
    host: Node,
    render_root: Node,
    values: RefCell<HashMap<String, Value>>,
    changed: RefCell<ChangedProperties>,
    reflecting: RefCell<IndexSet<String>>,
    flags: Cell<UpdateState>,
    update_complete: RefCell<UpdateComplete>,
    connection_waiters: RefCell<Vec<oneshot::Sender<()>>>,
    needs_style_elements: Cell<bool>,
    this: Weak<ElementState>,
}

/// Handle to a reactive element. Clones share the same element.
///
/// The host node does not keep the element alive; once every handle is
/// dropped, attribute and connection callbacks are ignored and pending cycles
/// resolve with [`Error::UpdateCancelled`].
#[derive(Clone)]
pub struct ReactiveElement(Rc<ElementState>);

/// Non-owning handle. Listeners rendered into an element's own tree should
/// hold this instead of a [`ReactiveElement`].
#[derive(Clone)]
pub struct WeakElement(Weak<ElementState>);

impl WeakElement {
    pub fn upgrade(&self) -> Option<ReactiveElement> {
        self.0.upgrade().map(ReactiveElement)
    }
}

impl fmt::Debug for ReactiveElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveElement")
            .field("tag", &self.0.definition.tag_name())
            .field("flags", &self.0.flags.get())
            .field("values", &self.0.values.borrow())
            .finish()
    }
}

impl ReactiveElement {
    /// Create a detached host for `C` and bind `component` to it.
    pub fn new<C: Component>(component: C) -> Self {
        let host = Node::element(C::tag_name());
        Self::upgrade(&host, component)
    }

    /// Bind `component` to an existing host. Observed attributes already on
    /// the host are applied, and a connected host counts as connected.
    pub fn upgrade<C: Component>(host: &Node, component: C) -> Self {
        let definition = ElementDefinition::of::<C>();
        let render_root = component.create_render_root(host);
        let state = Rc::new_cyclic(|this| ElementState {
            definition,
            component: Box::new(component),
            host: host.clone(),
            render_root,
            values: RefCell::new(HashMap::new()),
            changed: RefCell::new(IndexMap::new()),
            reflecting: RefCell::new(IndexSet::new()),
            flags: Cell::new(UpdateState::empty()),
            update_complete: RefCell::new(resolved(Ok(true))),
            connection_waiters: RefCell::new(Vec::new()),
            needs_style_elements: Cell::new(false),
            this: this.clone(),
        });
        let lifecycle: Weak<dyn ElementLifecycle> = Rc::downgrade(&state) as Weak<dyn ElementLifecycle>;
        host.set_lifecycle(lifecycle);

        let element = ReactiveElement(state);
        element.initialize();
        element
    }

    fn initialize(&self) {
        let state = &self.0;
        if state.render_root.node_type() == NodeType::ShadowRoot {
            let adoption = adopt_styles(&state.render_root, state.definition.styles(), state.definition.tag_name());
            state.needs_style_elements.set(adoption == StyleAdoption::Deferred);
        }
        self.enqueue_update();

        let initial: Vec<(String, Value)> = state
            .definition
            .properties()
            .filter(|decl| !decl.initial.is_null())
            .map(|decl| (decl.name.clone(), decl.initial.clone()))
            .collect();
        for (name, value) in initial {
            self.set(&name, value);
        }

        for attribute in state.host.attribute_names() {
            let value = state.host.get_attribute(&attribute);
            self.attribute_to_property(&attribute, value.as_deref());
        }
        if state.host.is_connected() {
            self.on_connected();
        }
    }

    pub fn host(&self) -> &Node {
        &self.0.host
    }

    pub fn render_root(&self) -> &Node {
        &self.0.render_root
    }

    pub fn definition(&self) -> &Rc<ElementDefinition> {
        &self.0.definition
    }

    pub fn downgrade(&self) -> WeakElement {
        WeakElement(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &ReactiveElement) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Current value of a property; null if never set.
    pub fn get(&self, name: &str) -> Value {
        self.0.values.borrow().get(name).cloned().unwrap_or_default()
    }

    /// Write a property. Visible to `get` immediately; rendering follows in
    /// the next cycle if the value changed.
    pub fn set(&self, name: &str, value: impl Into<Value>) {
        let old = self
            .0
            .values
            .borrow_mut()
            .insert(name.to_string(), value.into())
            .unwrap_or_default();
        self.property_changed(name, old);
    }

    /// Force a cycle. The returned future resolves when it completes.
    pub fn request_update(&self) -> UpdateComplete {
        if !self.flags().contains(UpdateState::UPDATE_REQUESTED) {
            self.enqueue_update();
        }
        self.update_complete()
    }

    /// Completion of the latest cycle: `true` if no further update was
    /// requested while it ran.
    pub fn update_complete(&self) -> UpdateComplete {
        self.0.update_complete.borrow().clone()
    }

    pub fn has_updated(&self) -> bool {
        self.flags().contains(UpdateState::HAS_UPDATED)
    }

    pub fn is_update_pending(&self) -> bool {
        self.flags().contains(UpdateState::UPDATE_REQUESTED)
    }

    /// Changes recorded for the next cycle.
    pub fn changed_properties(&self) -> ChangedProperties {
        self.0.changed.borrow().clone()
    }

    /// First descendant of the render root matching `selector`.
    pub fn query(&self, selector: &str) -> Option<Node> {
        self.0.render_root.query_selector(selector)
    }

    pub fn query_all(&self, selector: &str) -> Vec<Node> {
        self.0.render_root.query_selector_all(selector)
    }

    // =========================================================================
    // Flags
    // =========================================================================

    fn flags(&self) -> UpdateState {
        self.0.flags.get()
    }

    fn set_flag(&self, flag: UpdateState, on: bool) {
        let mut flags = self.0.flags.get();
        flags.set(flag, on);
        self.0.flags.set(flags);
    }

    // =========================================================================
    // Change tracking
    // =========================================================================

    fn property_changed(&self, name: &str, old: Value) {
        let declaration = self.0.definition.property(name);
        let value = self.get(name);
        let changed = match declaration {
            Some(decl) => (decl.has_changed)(&value, &old),
            None => not_equal(&value, &old),
        };
        if !changed {
            return;
        }

        self.0.changed.borrow_mut().entry(name.to_string()).or_insert(old);
        let reflect = declaration.is_some_and(|decl| decl.reflect);
        if reflect && !self.flags().contains(UpdateState::REFLECTING_TO_PROPERTY) {
            self.0.reflecting.borrow_mut().insert(name.to_string());
        }
        if !self.flags().contains(UpdateState::UPDATE_REQUESTED) {
            self.enqueue_update();
        }
    }

    fn attribute_to_property(&self, attribute: &str, value: Option<&str>) {
        if self.flags().contains(UpdateState::REFLECTING_TO_ATTRIBUTE) {
            return;
        }
        let Some(decl) = self.0.definition.property_for_attribute(attribute) else {
            return;
        };
        let converted = decl.converter.read(value, decl.type_hint);
        tracing::trace!(attribute, property = %decl.name, ?converted, "attribute to property");
        self.set_flag(UpdateState::REFLECTING_TO_PROPERTY, true);
        self.set(&decl.name, converted);
        self.set_flag(UpdateState::REFLECTING_TO_PROPERTY, false);
    }

    fn property_to_attribute(&self, decl: &PropertyDeclaration, value: &Value) {
        let Some(attribute) = decl.attribute_name() else {
            return;
        };
        let text = decl.converter.write(value, decl.type_hint);
        self.set_flag(UpdateState::REFLECTING_TO_ATTRIBUTE, true);
        match text {
            Some(text) => self.0.host.set_attribute(&attribute, &text),
            None => self.0.host.remove_attribute(&attribute),
        }
        self.set_flag(UpdateState::REFLECTING_TO_ATTRIBUTE, false);
    }

    fn reflect_pending(&self) {
        let names: Vec<String> = self.0.reflecting.borrow_mut().drain(..).collect();
        for name in names {
            let Some(decl) = self.0.definition.property(&name) else {
                continue;
            };
            let value = self.get(&name);
            self.property_to_attribute(decl, &value);
        }
    }

    // =========================================================================
    // Update cycle
    // =========================================================================

    fn enqueue_update(&self) {
        self.set_flag(UpdateState::UPDATE_REQUESTED, true);

        let (resolve, completion) = oneshot::channel::<UpdateResult>();
        let next = async move { completion.await.unwrap_or_else(|_| Err(Rc::new(Error::UpdateCancelled))) }
            .boxed_local()
            .shared();
        let previous = self.0.update_complete.replace(next);

        let this = self.0.this.clone();
        spawn_local(async move {
            // Errors of the previous cycle belong to its own awaiters.
            let _ = previous.await;

            let waiter = this.upgrade().and_then(|state| ReactiveElement(state).connection_waiter());
            if let Some(waiter) = waiter {
                if waiter.await.is_err() {
                    return;
                }
            }
            let Some(state) = this.upgrade() else {
                return;
            };
            let element = ReactiveElement(state);
            let result = match element.perform_update() {
                Ok(()) => Ok(!element.is_update_pending()),
                Err(err) => {
                    tracing::warn!(tag = %element.0.definition.tag_name(), %err, "update cycle failed");
                    Err(Rc::new(err))
                }
            };
            let _ = resolve.send(result);
        });
    }

    /// A receiver that fires on first connection, or `None` once connected.
    fn connection_waiter(&self) -> Option<oneshot::Receiver<()>> {
        if self.flags().contains(UpdateState::HAS_CONNECTED) {
            return None;
        }
        let (notify, waiter) = oneshot::channel();
        self.0.connection_waiters.borrow_mut().push(notify);
        Some(waiter)
    }

    fn perform_update(&self) -> Result<()> {
        let changed = self.changed_properties();
        tracing::debug!(
            tag = %self.0.definition.tag_name(),
            changed = ?changed.keys().collect::<Vec<_>>(),
            "update cycle started"
        );

        let rendered = self.update(&changed);
        self.0.changed.borrow_mut().clear();
        self.set_flag(UpdateState::UPDATE_REQUESTED, false);
        if !rendered? {
            return Ok(());
        }

        let component = &self.0.component;
        if !self.has_updated() {
            self.set_flag(UpdateState::HAS_UPDATED, true);
            component.first_updated(self, &changed)?;
        }
        component.updated(self, &changed)?;
        tracing::debug!(tag = %self.0.definition.tag_name(), "update cycle finished");
        Ok(())
    }

    /// Gate, reflect and render. `Ok(false)` when the gate skipped the cycle.
    fn update(&self, changed: &ChangedProperties) -> Result<bool> {
        let state = &self.0;
        if !state.component.should_update(self, changed)? {
            tracing::trace!(tag = %state.definition.tag_name(), "update skipped by gate");
            return Ok(false);
        }
        self.reflect_pending();

        if let Some(result) = state.component.render(self)? {
            let options = RenderOptions::new()
                .with_scope_name(state.definition.tag_name())
                .with_event_context(&state.host);
            render_scoped(result, &state.render_root, options)?;
        }
        if state.needs_style_elements.replace(false) {
            append_style_elements(&state.render_root, state.definition.styles());
        }
        Ok(true)
    }

    // =========================================================================
    // Host callbacks
    // =========================================================================

    fn on_connected(&self) {
        self.set_flag(UpdateState::HAS_CONNECTED, true);
        let waiters: Vec<oneshot::Sender<()>> = self.0.connection_waiters.borrow_mut().drain(..).collect();
        for waiter in waiters {
            let _ = waiter.send(());
        }
        if self.has_updated() {
            if let Some(shim) = scoping_shim() {
                shim.style_element(&self.0.host);
            }
        }
    }
}

impl ElementLifecycle for ElementState {
    fn connected(&self) {
        if let Some(state) = self.this.upgrade() {
            ReactiveElement(state).on_connected();
        }
    }

    fn attribute_changed(&self, name: &str, old: Option<&str>, new: Option<&str>) {
        if old == new {
            return;
        }
        if let Some(state) = self.this.upgrade() {
            ReactiveElement(state).attribute_to_property(name, new);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Node;
    use crate::html;
    use crate::scheduler::{block_on, run_microtasks};

    #[derive(Default)]
    struct Stats {
        renders: Cell<usize>,
        first_updates: Cell<usize>,
        seen: RefCell<Vec<ChangedProperties>>,
    }

    struct Counter {
        stats: Rc<Stats>,
    }

    impl Component for Counter {
        fn tag_name() -> &'static str {
            "x-counter"
        }

        fn properties() -> Vec<PropertyDeclaration> {
            vec![
                PropertyDeclaration::new("count").number().reflect(true).initial(0),
                PropertyDeclaration::new("label"),
            ]
        }

        fn render(&self, element: &ReactiveElement) -> anyhow::Result<Option<TemplateResult>> {
            self.stats.renders.set(self.stats.renders.get() + 1);
            Ok(Some(html!(
                ["<span>", ": ", "</span>"],
                element.get("label"),
                element.get("count")
            )))
        }

        fn first_updated(&self, _element: &ReactiveElement, _changed: &ChangedProperties) -> anyhow::Result<()> {
            self.stats.first_updates.set(self.stats.first_updates.get() + 1);
            Ok(())
        }

        fn updated(&self, _element: &ReactiveElement, changed: &ChangedProperties) -> anyhow::Result<()> {
            self.stats.seen.borrow_mut().push(changed.clone());
            Ok(())
        }
    }

    fn counter() -> (ReactiveElement, Rc<Stats>) {
        let stats = Rc::new(Stats::default());
        let element = ReactiveElement::new(Counter { stats: stats.clone() });
        (element, stats)
    }

    fn connected_counter() -> (Node, ReactiveElement, Rc<Stats>) {
        let document = Node::document();
        let (element, stats) = counter();
        document.append_child(element.host());
        run_microtasks();
        (document, element, stats)
    }

    #[test]
    fn test_first_cycle_waits_for_connection() {
        let (element, stats) = counter();
        run_microtasks();
        assert!(!element.has_updated());
        assert!(element.is_update_pending());

        let document = Node::document();
        document.append_child(element.host());
        run_microtasks();
        assert!(element.has_updated());
        assert_eq!(element.query("span").map(|s| s.text_content()), Some(": 0".to_string()));
        assert_eq!(stats.first_updates.get(), 1);
    }

    #[test]
    fn test_writes_fold_into_one_cycle() {
        let (_document, element, stats) = connected_counter();
        let before = stats.renders.get();

        element.set("count", 1);
        element.set("label", "n");
        element.set("count", 2);
        run_microtasks();

        assert_eq!(stats.renders.get(), before + 1);
        let seen = stats.seen.borrow();
        let last = seen.last().cloned().unwrap_or_default();
        assert_eq!(last.get("count"), Some(&Value::Number(0.0)));
        assert_eq!(last.get("label"), Some(&Value::Null));
        assert_eq!(last.len(), 2);
    }

    #[test]
    fn test_unchanged_write_requests_nothing() {
        let (_document, element, _stats) = connected_counter();
        element.set("count", 0);
        assert!(!element.is_update_pending());
    }

    #[test]
    fn test_reflection_waits_for_cycle() {
        let (_document, element, _stats) = connected_counter();
        element.set("count", 5);
        assert_eq!(element.get("count"), Value::Number(5.0));
        assert_eq!(element.host().get_attribute("count").as_deref(), Some("0"));
        run_microtasks();
        assert_eq!(element.host().get_attribute("count").as_deref(), Some("5"));
        assert!(!element.is_update_pending());
    }

    #[test]
    fn test_attribute_sets_property_without_reflecting_back() {
        let (_document, element, _stats) = connected_counter();
        element.host().set_attribute("count", "7");
        assert_eq!(element.get("count"), Value::Number(7.0));
        run_microtasks();
        assert_eq!(element.host().get_attribute("count").as_deref(), Some("7"));
        assert!(element.0.reflecting.borrow().is_empty());
    }

    #[test]
    fn test_upgrade_replays_attributes() {
        let host = Node::element("x-counter");
        host.set_attribute("label", "preset");
        let element = ReactiveElement::upgrade(&host, Counter { stats: Rc::default() });
        assert_eq!(element.get("label"), Value::from("preset"));
    }

    #[test]
    fn test_update_complete_reports_no_pending_work() {
        let (_document, element, _stats) = connected_counter();
        element.set("label", "x");
        let done = block_on(element.update_complete());
        assert_eq!(done.ok(), Some(true));
    }
}
