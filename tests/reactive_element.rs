//! Reactive element scenarios: batching, reflection, gating, failures,
//! connection and styles.
//!
//! Cycles only run when the microtask queue is drained, so every test
//! controls exactly when an update happens.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::anyhow;
use spark_html::dom::{HostProfile, set_host_profile};
use spark_html::element::ElementDefinition;
use spark_html::{
    ChangedProperties, Component, CssStyles, Error, Event, Node, PropertyDeclaration, ReactiveElement,
    ScopingShim, TemplateResult, Value, block_on, html, install_scoping_shim, listener, remove_scoping_shim,
    run_microtasks, unsafe_css,
};

// =============================================================================
// Fixtures
// =============================================================================

#[derive(Default)]
struct Stats {
    renders: Cell<usize>,
    cycles: RefCell<Vec<ChangedProperties>>,
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
            PropertyDeclaration::new("count").number().reflect(true),
            PropertyDeclaration::new("label"),
            PropertyDeclaration::new("config").structured(),
        ]
    }

    fn render(&self, element: &ReactiveElement) -> anyhow::Result<Option<TemplateResult>> {
        self.stats.renders.set(self.stats.renders.get() + 1);
        let weak = element.downgrade();
        let bump = listener(move |_event: &Event, _context: &Node| {
            if let Some(element) = weak.upgrade() {
                let next = element.get("count").as_number().unwrap_or(0.0) + 1.0;
                element.set("count", next);
            }
        });
        Ok(Some(html!(
            ["<button @click=", ">", " ", "</button>"],
            bump,
            element.get("label"),
            element.get("count")
        )))
    }

    fn updated(&self, _element: &ReactiveElement, changed: &ChangedProperties) -> anyhow::Result<()> {
        self.stats.cycles.borrow_mut().push(changed.clone());
        Ok(())
    }
}

fn counter() -> (ReactiveElement, Rc<Stats>) {
    let stats = Rc::new(Stats::default());
    (ReactiveElement::new(Counter { stats: stats.clone() }), stats)
}

fn mounted_counter() -> (Node, ReactiveElement, Rc<Stats>) {
    let document = Node::document();
    let (element, stats) = counter();
    document.append_child(element.host());
    run_microtasks();
    (document, element, stats)
}

// =============================================================================
// Batching and reflection
// =============================================================================

#[test]
fn reflected_attribute_follows_on_next_microtask() {
    let (_document, element, _stats) = mounted_counter();

    element.set("count", 5);
    assert_eq!(element.get("count"), Value::Number(5.0));
    assert!(!element.host().has_attribute("count"));

    run_microtasks();
    assert_eq!(element.host().get_attribute("count").as_deref(), Some("5"));
}

#[test]
fn two_writes_make_one_cycle_with_previous_values() {
    let (_document, element, stats) = mounted_counter();
    element.set("count", 1);
    element.set("label", "a");
    run_microtasks();
    let renders = stats.renders.get();

    element.set("count", 2);
    element.set("label", "b");
    element.set("count", 3);
    run_microtasks();

    assert_eq!(stats.renders.get(), renders + 1);
    let cycles = stats.cycles.borrow();
    let last = cycles.last().cloned().unwrap_or_default();
    assert_eq!(last.len(), 2);
    assert_eq!(last.get("count"), Some(&Value::Number(1.0)));
    assert_eq!(last.get("label"), Some(&Value::from("a")));
}

#[test]
fn reflection_does_not_write_the_property_again() {
    let (_document, element, stats) = mounted_counter();
    element.set("count", 4);
    run_microtasks();
    let cycles = stats.cycles.borrow().len();

    assert_eq!(element.host().get_attribute("count").as_deref(), Some("4"));
    assert!(!element.is_update_pending());
    run_microtasks();
    assert_eq!(stats.cycles.borrow().len(), cycles);
}

#[test]
fn attribute_write_converts_into_property() {
    let (_document, element, _stats) = mounted_counter();
    element.host().set_attribute("count", "12");
    element.host().set_attribute("config", r#"{"dense":true}"#);
    assert_eq!(element.get("count"), Value::Number(12.0));
    assert_eq!(element.get("config"), Value::Json(serde_json::json!({"dense": true})));

    run_microtasks();
    assert_eq!(element.query("button").map(|b| b.text_content()), Some(" 12".to_string()));
}

#[test]
fn listener_in_template_updates_property() {
    let (_document, element, _stats) = mounted_counter();
    let button = element.query("button").unwrap();
    button.dispatch_event(&Event::new("click"));
    button.dispatch_event(&Event::new("click"));
    assert_eq!(element.get("count"), Value::Number(2.0));

    run_microtasks();
    assert_eq!(element.query("button"), Some(button));
    assert_eq!(element.host().get_attribute("count").as_deref(), Some("2"));
}

// =============================================================================
// Connection and completion
// =============================================================================

#[test]
fn disconnected_element_defers_first_render() {
    let (element, stats) = counter();
    element.set("label", "early");
    run_microtasks();
    assert_eq!(stats.renders.get(), 0);
    assert!(element.query("button").is_none());

    let document = Node::document();
    document.append_child(element.host());
    let done = block_on(element.update_complete());
    assert_eq!(done.ok(), Some(true));
    assert_eq!(stats.renders.get(), 1);
    assert!(element.has_updated());
}

#[test]
fn dropped_element_cancels_pending_cycle() {
    let (element, _stats) = counter();
    let pending = element.update_complete();
    drop(element);
    let result = block_on(pending);
    assert!(matches!(result.as_ref().map_err(|err| &**err), Err(Error::UpdateCancelled)));
}

#[test]
fn request_update_forces_a_cycle() {
    let (_document, element, stats) = mounted_counter();
    let renders = stats.renders.get();
    let done = block_on(element.request_update());
    assert_eq!(done.ok(), Some(true));
    assert_eq!(stats.renders.get(), renders + 1);
    assert_eq!(stats.cycles.borrow().last().map(|c| c.len()), Some(0));
}

// =============================================================================
// Gate and failures
// =============================================================================

struct Gated {
    open: Rc<Cell<bool>>,
    renders: Rc<Cell<usize>>,
}

impl Component for Gated {
    fn tag_name() -> &'static str {
        "x-gated"
    }

    fn properties() -> Vec<PropertyDeclaration> {
        vec![PropertyDeclaration::new("value")]
    }

    fn should_update(&self, _element: &ReactiveElement, _changed: &ChangedProperties) -> anyhow::Result<bool> {
        Ok(self.open.get())
    }

    fn render(&self, element: &ReactiveElement) -> anyhow::Result<Option<TemplateResult>> {
        self.renders.set(self.renders.get() + 1);
        Ok(Some(html!(["<i>", "</i>"], element.get("value"))))
    }
}

#[test]
fn closed_gate_skips_render_but_completes() {
    let open = Rc::new(Cell::new(false));
    let renders = Rc::new(Cell::new(0));
    let document = Node::document();
    let element = ReactiveElement::new(Gated {
        open: open.clone(),
        renders: renders.clone(),
    });
    document.append_child(element.host());

    element.set("value", "hidden");
    let done = block_on(element.update_complete());
    assert_eq!(done.ok(), Some(true));
    assert_eq!(renders.get(), 0);
    assert!(!element.has_updated());
    assert!(element.changed_properties().is_empty());

    open.set(true);
    element.set("value", "shown");
    block_on(element.update_complete()).unwrap();
    assert_eq!(renders.get(), 1);
    assert_eq!(element.query("i").map(|i| i.text_content()), Some("shown".to_string()));
}

struct Failing {
    fail: Rc<Cell<bool>>,
}

impl Component for Failing {
    fn tag_name() -> &'static str {
        "x-failing"
    }

    fn properties() -> Vec<PropertyDeclaration> {
        vec![PropertyDeclaration::new("n").number()]
    }

    fn render(&self, element: &ReactiveElement) -> anyhow::Result<Option<TemplateResult>> {
        if self.fail.get() {
            return Err(anyhow!("render exploded"));
        }
        Ok(Some(html!(["<b>", "</b>"], element.get("n"))))
    }
}

#[test]
fn hook_error_reaches_awaiter_and_next_cycle_runs() {
    let fail = Rc::new(Cell::new(true));
    let document = Node::document();
    let element = ReactiveElement::new(Failing { fail: fail.clone() });
    document.append_child(element.host());

    let first = block_on(element.update_complete());
    match first.as_ref().map_err(|err| &**err) {
        Err(Error::Hook(err)) => assert_eq!(err.to_string(), "render exploded"),
        other => panic!("expected hook error, got {other:?}"),
    }
    assert!(!element.is_update_pending());

    fail.set(false);
    element.set("n", 3);
    let second = block_on(element.update_complete());
    assert_eq!(second.ok(), Some(true));
    assert_eq!(element.query("b").map(|b| b.text_content()), Some("3".to_string()));
}

// =============================================================================
// Styles
// =============================================================================

struct Styled;

impl Component for Styled {
    fn tag_name() -> &'static str {
        "x-styled"
    }

    fn styles() -> Vec<CssStyles> {
        let base = unsafe_css(":host { display: block }");
        vec![base.clone().into(), vec![unsafe_css("p { margin: 0 }"), base].into()]
    }

    fn render(&self, _element: &ReactiveElement) -> anyhow::Result<Option<TemplateResult>> {
        Ok(Some(html!(["<p>styled</p>"])))
    }
}

#[test]
fn styles_are_deduplicated_keeping_last() {
    let definition = ElementDefinition::of::<Styled>();
    let texts: Vec<&str> = definition.styles().iter().map(|s| s.css_text()).collect();
    assert_eq!(texts, vec!["p { margin: 0 }", ":host { display: block }"]);
}

#[test]
fn constructable_stylesheets_are_adopted() {
    set_host_profile(HostProfile::default());
    let element = ReactiveElement::new(Styled);
    assert_eq!(element.render_root().adopted_styles().len(), 2);
}

#[test]
fn without_constructable_stylesheets_styles_follow_first_render() {
    set_host_profile(HostProfile {
        constructable_stylesheets: false,
        ..HostProfile::default()
    });
    let document = Node::document();
    let element = ReactiveElement::new(Styled);
    document.append_child(element.host());
    assert!(element.render_root().adopted_styles().is_empty());

    run_microtasks();
    let styles = element.query_all("style");
    assert_eq!(styles.len(), 2);
    assert!(element.query("p").is_some());
    set_host_profile(HostProfile::default());
}

#[derive(Default)]
struct RecordingShim {
    log: RefCell<Vec<String>>,
}

impl ScopingShim for RecordingShim {
    fn style_element(&self, host: &Node) {
        let tag = host.tag_name().unwrap_or_default().to_string();
        self.log.borrow_mut().push(format!("style:{tag}"));
    }

    fn prepare_adopted_css_text(&self, css_texts: &[String], scope_name: &str) {
        self.log.borrow_mut().push(format!("adopt:{scope_name}:{}", css_texts.len()));
    }
}

#[test]
fn scoping_shim_receives_styles_and_host() {
    let shim = Rc::new(RecordingShim::default());
    install_scoping_shim(shim.clone());

    let document = Node::document();
    let element = ReactiveElement::new(Styled);
    document.append_child(element.host());
    run_microtasks();

    let log = shim.log.borrow().clone();
    assert_eq!(log.first().map(String::as_str), Some("adopt:x-styled:2"));
    assert!(log.iter().any(|entry| entry == "style:x-styled"));
    assert_eq!(element.query("p").map(|p| p.text_content()), Some("styled".to_string()));
    remove_scoping_shim();
}
