//! Style scoping - rendering through an external scoping shim.
//!
//! Hosts without native style encapsulation rely on a shim that rewrites
//! template markup and stylesheet text per scope. When no shim is installed,
//! [`render_scoped`] is a plain render through a scope-keyed template cache.
//!
//! With a shim, the first render of a scope into a shadow root goes through a
//! detached fragment so the shim can see the template before it is live:
//! ```text
//! render into fragment → collect <style> nodes → strip them from every
//! template of the scope → shim.prepare_template_styles → move fragment in
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use super::{RenderOptions, TemplateFactory, render, root_part};
use crate::dom::{Node, NodeType};
use crate::error::{Error, Result};
use crate::template::{
    Template, TemplateNamespace, TemplateResult, insert_node_into_template, remove_nodes_from_template,
    with_default_registry,
};
use crate::value::Value;

/// External collaborator emulating style encapsulation.
pub trait ScopingShim {
    /// Rewrite a freshly realized template for `scope_name`.
    fn prepare_template_dom(&self, _template: &Node, _scope_name: &str) {}

    /// Process the condensed styles of a scope's template.
    fn prepare_template_styles(&self, _template: &Node, _scope_name: &str) {}

    /// Apply scoped styles to a host element.
    fn style_element(&self, _host: &Node) {}

    /// Whether the host encapsulates styles natively.
    fn native_shadow(&self) -> bool {
        false
    }

    /// Register stylesheet text for a scope.
    fn prepare_adopted_css_text(&self, _css_texts: &[String], _scope_name: &str) {}
}

thread_local! {
    static SCOPING_SHIM: RefCell<Option<Rc<dyn ScopingShim>>> = RefCell::new(None);

    /// Scopes whose styles have been prepared.
    static PREPARED_SCOPES: RefCell<HashSet<String>> = RefCell::new(HashSet::new());
}

pub fn install_scoping_shim(shim: Rc<dyn ScopingShim>) {
    tracing::debug!(native_shadow = shim.native_shadow(), "installed scoping shim");
    SCOPING_SHIM.with(|slot| *slot.borrow_mut() = Some(shim));
}

/// Remove the shim and forget which scopes were prepared.
pub fn remove_scoping_shim() {
    SCOPING_SHIM.with(|slot| *slot.borrow_mut() = None);
    PREPARED_SCOPES.with(|scopes| scopes.borrow_mut().clear());
}

pub fn scoping_shim() -> Option<Rc<dyn ScopingShim>> {
    SCOPING_SHIM.with(|slot| slot.borrow().clone())
}

fn cache_key(namespace: TemplateNamespace, scope: &str) -> String {
    format!("{}--{}", namespace.as_str(), scope)
}

/// Template factory using the scope's own caches; new templates are shown to
/// the shim before parsing.
fn scoped_template_factory(scope: &str) -> TemplateFactory {
    let scope = scope.to_string();
    Rc::new(move |result: &TemplateResult| {
        let key = cache_key(result.namespace(), &scope);
        with_default_registry(|registry| {
            registry.template_for_key(result, &key, |element| {
                if let Some(shim) = scoping_shim() {
                    shim.prepare_template_dom(element, &scope);
                }
            })
        })
    })
}

/// Render with `options.scope_name` as the style scope.
pub fn render_scoped(value: impl Into<Value>, container: &Node, options: RenderOptions) -> Result<()> {
    let scope = options.scope_name.clone().ok_or(Error::MissingScopeName)?;
    let shim = scoping_shim();
    let has_rendered = root_part(container).is_some();
    let shadow_root = container.node_type() == NodeType::ShadowRoot && container.host().is_some();
    let shimmed_root = shim.is_some() && shadow_root;
    let first_scope_render =
        shimmed_root && !PREPARED_SCOPES.with(|scopes| scopes.borrow().contains(&scope));

    let mut options = options;
    if options.template_factory.is_none() {
        options.template_factory = Some(scoped_template_factory(&scope));
    }

    let target = if first_scope_render {
        Node::fragment()
    } else {
        container.clone()
    };
    render(value, &target, options)?;

    if let (true, Some(shim)) = (first_scope_render, shim.as_ref()) {
        let part = root_part(&target);
        target.set_render_state(None);
        let template = part.as_ref().and_then(|part| part.instance_template());
        prepare_scope_styles(&scope, &target, template.as_ref(), shim.as_ref());
        container.clear_children();
        container.append_child(&target);
        container.set_render_state(part.map(|part| part as Rc<dyn std::any::Any>));
    }

    if !has_rendered && shimmed_root {
        if let (Some(shim), Some(host)) = (shim, container.host()) {
            shim.style_element(&host);
        }
    }
    Ok(())
}

/// Strip `<style>` nodes from every cached template of `scope`.
fn remove_styles_from_templates(scope: &str) {
    for namespace in [TemplateNamespace::Html, TemplateNamespace::Svg] {
        let templates = with_default_registry(|registry| registry.templates_in(&cache_key(namespace, scope)));
        for template in templates {
            let styles = template.content().query_selector_all("style");
            remove_nodes_from_template(&template, &styles);
        }
    }
}

/// Condense the rendered `<style>` nodes into one and hand it to the shim.
fn prepare_scope_styles(scope: &str, rendered: &Node, template: Option<&Rc<Template>>, shim: &dyn ScopingShim) {
    PREPARED_SCOPES.with(|scopes| scopes.borrow_mut().insert(scope.to_string()));

    let template_element = template.map_or_else(|| Node::element("template"), |t| t.element().clone());
    let styles = rendered.query_selector_all("style");
    if styles.is_empty() {
        shim.prepare_template_styles(&template_element, scope);
        return;
    }

    let mut css = String::new();
    for style in &styles {
        style.remove();
        css.push_str(&style.text_content());
    }
    let condensed = Node::element("style");
    condensed.append_child(&Node::text(&css));

    remove_styles_from_templates(scope);

    let content = template_element
        .template_content()
        .unwrap_or_else(|| template_element.clone());
    match template {
        Some(template) => insert_node_into_template(template, &condensed, content.first_child().as_ref()),
        None => content.insert_before(&condensed, content.first_child().as_ref()),
    }
    shim.prepare_template_styles(&template_element, scope);
    tracing::debug!(scope, styles = styles.len(), "prepared scope styles");

    let prepared = content.query_selector("style");
    match (shim.native_shadow(), prepared, template) {
        (true, Some(style), _) => rendered.insert_before(&style.clone_node(true), rendered.first_child().as_ref()),
        (_, _, Some(template)) => {
            content.insert_before(&condensed, content.first_child().as_ref());
            remove_nodes_from_template(template, &[condensed]);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html;

    #[derive(Default)]
    struct RecordingShim {
        log: RefCell<Vec<String>>,
    }

    impl ScopingShim for RecordingShim {
        fn prepare_template_dom(&self, _template: &Node, scope: &str) {
            self.log.borrow_mut().push(format!("dom:{scope}"));
        }
        fn prepare_template_styles(&self, template: &Node, scope: &str) {
            let css = template
                .template_content()
                .and_then(|c| c.query_selector("style"))
                .map(|s| s.text_content())
                .unwrap_or_default();
            self.log.borrow_mut().push(format!("styles:{scope}:{css}"));
        }
        fn style_element(&self, host: &Node) {
            self.log.borrow_mut().push(format!("host:{}", host.tag_name().unwrap_or_default()));
        }
    }

    fn view(label: &str) -> TemplateResult {
        html!(["<style>p { color: red }</style><p>", "</p>"], label)
    }

    #[test]
    fn test_scope_name_is_required() {
        let container = Node::element("div");
        let err = render_scoped(view("a"), &container, RenderOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MissingScopeName));
    }

    #[test]
    fn test_without_shim_renders_plainly() {
        remove_scoping_shim();
        let host = Node::element("x-plain");
        let root = host.attach_shadow();
        render_scoped(view("a"), &root, RenderOptions::new().with_scope_name("x-plain")).unwrap();
        assert!(root.query_selector("style").is_some());
        assert_eq!(root.query_selector("p").map(|p| p.text_content()), Some("a".to_string()));
        let cached = with_default_registry(|r| r.templates_in("html--x-plain").len());
        assert_eq!(cached, 1);
    }

    #[test]
    fn test_shim_prepares_scope_once() {
        let shim = Rc::new(RecordingShim::default());
        install_scoping_shim(shim.clone());
        let host = Node::element("x-shimmed");
        let root = host.attach_shadow();
        let options = RenderOptions::new().with_scope_name("x-shimmed");

        render_scoped(view("a"), &root, options.clone()).unwrap();
        assert!(root.query_selector("style").is_none(), "styles move to the shim");
        assert_eq!(root.query_selector("p").map(|p| p.text_content()), Some("a".to_string()));
        assert_eq!(
            *shim.log.borrow(),
            vec![
                "dom:x-shimmed".to_string(),
                "styles:x-shimmed:p { color: red }".to_string(),
                "host:x-shimmed".to_string(),
            ]
        );

        let p = root.query_selector("p");
        render_scoped(view("b"), &root, options).unwrap();
        assert_eq!(root.query_selector("p"), p);
        assert_eq!(root.query_selector("p").map(|p| p.text_content()), Some("b".to_string()));
        assert_eq!(shim.log.borrow().len(), 3);

        remove_scoping_shim();
    }
}
