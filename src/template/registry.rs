//! Template Registry - parsed templates keyed by call site.
//!
//! One cache per key (`"html"`, `"svg"`, or `"<namespace>--<scope>"` for
//! scoped rendering). Each cache has two maps:
//! - call-site token → template (the fast path)
//! - fragments joined with the marker → template (dynamic fragments, and
//!   distinct call sites with identical text)
//!
//! Caches are unbounded: call sites are static and finite.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use super::{Template, TemplateResult};
use crate::dom::Node;
use crate::error::Result;
use crate::render::TemplateFactory;

#[derive(Default)]
struct TemplateCache {
    by_call_site: HashMap<usize, Rc<Template>>,
    by_text: HashMap<String, Rc<Template>>,
}

/// Explicit owner of parsed templates.
#[derive(Default)]
pub struct TemplateRegistry {
    caches: RefCell<HashMap<String, TemplateCache>>,
    parse_count: Cell<usize>,
}

thread_local! {
    static DEFAULT_REGISTRY: Rc<TemplateRegistry> = Rc::new(TemplateRegistry::new());
}

/// Run `f` with the thread's default registry.
pub fn with_default_registry<R>(f: impl FnOnce(&Rc<TemplateRegistry>) -> R) -> R {
    DEFAULT_REGISTRY.with(f)
}

/// Factory resolving templates through the thread's default registry.
pub fn default_template_factory() -> TemplateFactory {
    with_default_registry(TemplateRegistry::factory)
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Template for `result` in the namespace's own cache.
    pub fn template_for(&self, result: &TemplateResult) -> Result<Rc<Template>> {
        self.template_for_key(result, result.namespace().as_str(), |_| {})
    }

    /// Template for `result` in the cache named `key`. `prepare` sees the
    /// freshly realized `<template>` element before it is parsed.
    pub(crate) fn template_for_key(
        &self,
        result: &TemplateResult,
        key: &str,
        prepare: impl FnOnce(&Node),
    ) -> Result<Rc<Template>> {
        result.check_arity()?;
        let call_site = result.call_site().map(|site| site.id());
        if let Some(id) = call_site {
            let cached = self
                .caches
                .borrow()
                .get(key)
                .and_then(|cache| cache.by_call_site.get(&id).cloned());
            if let Some(template) = cached {
                return Ok(template);
            }
        }

        let text = result.cache_text();
        let cached = self
            .caches
            .borrow()
            .get(key)
            .and_then(|cache| cache.by_text.get(&text).cloned());
        let template = match cached {
            Some(template) => {
                tracing::trace!(key, "template text cache hit");
                template
            }
            None => {
                let element = result.template_element();
                prepare(&element);
                let template = Rc::new(Template::parse(result, element)?);
                self.parse_count.set(self.parse_count.get() + 1);
                tracing::debug!(key, parts = template.parts().len(), "parsed new template");
                self.caches
                    .borrow_mut()
                    .entry(key.to_string())
                    .or_default()
                    .by_text
                    .insert(text, template.clone());
                template
            }
        };

        if let Some(id) = call_site {
            self.caches
                .borrow_mut()
                .entry(key.to_string())
                .or_default()
                .by_call_site
                .insert(id, template.clone());
        }
        Ok(template)
    }

    /// Every template parsed into the cache named `key`.
    pub fn templates_in(&self, key: &str) -> Vec<Rc<Template>> {
        self.caches
            .borrow()
            .get(key)
            .map(|cache| cache.by_text.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of templates parsed so far.
    pub fn parse_count(&self) -> usize {
        self.parse_count.get()
    }

    /// A render-option factory resolving through this registry.
    pub fn factory(self: &Rc<Self>) -> TemplateFactory {
        let registry = self.clone();
        Rc::new(move |result: &TemplateResult| registry.template_for(result))
    }
}
