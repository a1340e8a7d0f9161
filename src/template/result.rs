//! Render results and the tag factories that build them.

use std::fmt;
use std::rc::Rc;

use super::{BOUND_ATTRIBUTE_SUFFIX, LAST_ATTRIBUTE_NAME, marker, node_marker};
use crate::dom::{Namespace, Node};
use crate::error::{Error, Result};
use crate::parts::{TemplateProcessor, default_processor};
use crate::value::Value;

// =============================================================================
// Call sites
// =============================================================================

/// Identity of one template literal location.
///
/// Declare one `static` per call site (the `html!` / `svg!` macros do this);
/// the static's address is the cache key, so two call sites with identical
/// text are still distinct.
pub struct CallSite {
    strings: &'static [&'static str],
}

impl CallSite {
    pub const fn new(strings: &'static [&'static str]) -> Self {
        Self { strings }
    }

    pub fn strings(&self) -> &'static [&'static str] {
        self.strings
    }

    pub(crate) fn id(&'static self) -> usize {
        self as *const CallSite as usize
    }
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSite").field("strings", &self.strings).finish()
    }
}

/// Fragments assembled at runtime. They have no call-site identity and are
/// always resolved through the joined-text cache.
#[derive(Debug, Clone)]
pub struct DynamicFragments {
    strings: Rc<[String]>,
}

impl DynamicFragments {
    pub fn new<I, S>(strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            strings: strings.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Clone)]
enum Fragments {
    Static(&'static CallSite),
    Dynamic(Rc<[String]>),
}

/// Rule set a result is parsed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateNamespace {
    Html,
    Svg,
}

impl TemplateNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateNamespace::Html => "html",
            TemplateNamespace::Svg => "svg",
        }
    }
}

// =============================================================================
// TemplateResult
// =============================================================================

struct ResultInner {
    fragments: Fragments,
    values: Vec<Value>,
    namespace: TemplateNamespace,
    processor: Rc<dyn TemplateProcessor>,
}

/// Immutable fragments + values produced by a tag factory.
#[derive(Clone)]
pub struct TemplateResult(Rc<ResultInner>);

impl TemplateResult {
    fn new(fragments: Fragments, values: Vec<Value>, namespace: TemplateNamespace) -> Self {
        Self(Rc::new(ResultInner {
            fragments,
            values,
            namespace,
            processor: default_processor(),
        }))
    }

    /// Fails unless there is exactly one more fragment than values.
    pub fn check_arity(&self) -> Result<()> {
        let fragments = self.strings().len();
        let values = self.values().len();
        if fragments == values + 1 {
            Ok(())
        } else {
            Err(Error::ValueArity { fragments, values })
        }
    }

    /// Same fragments and values, parsed with another processor.
    pub fn with_processor(&self, processor: Rc<dyn TemplateProcessor>) -> Self {
        Self(Rc::new(ResultInner {
            fragments: self.0.fragments.clone(),
            values: self.0.values.clone(),
            namespace: self.0.namespace,
            processor,
        }))
    }

    pub fn ptr_eq(&self, other: &TemplateResult) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn values(&self) -> &[Value] {
        &self.0.values
    }

    pub fn strings(&self) -> Vec<&str> {
        match &self.0.fragments {
            Fragments::Static(site) => site.strings.to_vec(),
            Fragments::Dynamic(strings) => strings.iter().map(String::as_str).collect(),
        }
    }

    pub fn namespace(&self) -> TemplateNamespace {
        self.0.namespace
    }

    pub fn processor(&self) -> &Rc<dyn TemplateProcessor> {
        &self.0.processor
    }

    pub(crate) fn call_site(&self) -> Option<&'static CallSite> {
        match &self.0.fragments {
            Fragments::Static(site) => Some(site),
            Fragments::Dynamic(_) => None,
        }
    }

    /// Fragments joined with the bare marker; the text cache key.
    pub(crate) fn cache_text(&self) -> String {
        self.strings().join(marker())
    }

    /// Template text with a marker in every expression slot.
    ///
    /// Slots in attribute-value position rename the attribute with the bound
    /// suffix and get the bare marker; slots inside an open comment get the
    /// bare marker padded with spaces; all others get the comment marker.
    pub fn html_text(&self) -> String {
        let strings = self.strings();
        let Some((last, slots)) = strings.split_last() else {
            return String::new();
        };
        let mut html = String::new();
        let mut in_comment = false;
        for fragment in slots {
            let comment_open = fragment.rfind("<!--");
            let search_from = comment_open.map_or(0, |i| i + 1);
            in_comment = (comment_open.is_some() || in_comment)
                && !fragment[search_from..].contains("-->");

            match LAST_ATTRIBUTE_NAME.captures(fragment) {
                Some(caps) => {
                    let start = caps.get(0).map_or(0, |m| m.start());
                    html.push_str(&fragment[..start]);
                    html.push_str(&caps[1]);
                    html.push_str(&caps[2]);
                    html.push_str(BOUND_ATTRIBUTE_SUFFIX);
                    html.push_str(&caps[3]);
                    html.push_str(marker());
                }
                None => {
                    html.push_str(fragment);
                    if in_comment {
                        html.push(' ');
                        html.push_str(marker());
                        html.push(' ');
                    } else {
                        html.push_str(node_marker());
                    }
                }
            }
        }
        html.push_str(last);
        html
    }

    /// Realize the marked-up text as a `<template>` element.
    pub fn template_element(&self) -> Node {
        let template = Node::element("template");
        match self.0.namespace {
            TemplateNamespace::Html => template.set_inner_html(&self.html_text()),
            TemplateNamespace::Svg => {
                template.set_inner_html(&format!("<svg>{}</svg>", self.html_text()));
                if let Some(content) = template.template_content() {
                    if let Some(wrapper) = content.first_child() {
                        wrapper.remove();
                        for child in wrapper.children() {
                            content.append_child(&child);
                        }
                    }
                }
            }
        }
        template
    }

    /// Namespace new elements should be created in for this result.
    pub fn element_namespace(&self) -> Namespace {
        match self.0.namespace {
            TemplateNamespace::Html => Namespace::Html,
            TemplateNamespace::Svg => Namespace::Svg,
        }
    }
}

impl fmt::Debug for TemplateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateResult")
            .field("namespace", &self.0.namespace)
            .field("strings", &self.strings())
            .field("values", &self.0.values)
            .finish()
    }
}

// =============================================================================
// Tag factories
// =============================================================================

/// Markup result for a static call site.
pub fn html(call_site: &'static CallSite, values: Vec<Value>) -> TemplateResult {
    TemplateResult::new(Fragments::Static(call_site), values, TemplateNamespace::Html)
}

/// Vector-markup result for a static call site.
pub fn svg(call_site: &'static CallSite, values: Vec<Value>) -> TemplateResult {
    TemplateResult::new(Fragments::Static(call_site), values, TemplateNamespace::Svg)
}

/// Markup result for runtime-built fragments.
pub fn html_dynamic(fragments: &DynamicFragments, values: Vec<Value>) -> TemplateResult {
    TemplateResult::new(
        Fragments::Dynamic(fragments.strings.clone()),
        values,
        TemplateNamespace::Html,
    )
}

/// Vector-markup result for runtime-built fragments.
pub fn svg_dynamic(fragments: &DynamicFragments, values: Vec<Value>) -> TemplateResult {
    TemplateResult::new(
        Fragments::Dynamic(fragments.strings.clone()),
        values,
        TemplateNamespace::Svg,
    )
}

/// Build a markup [`TemplateResult`] with a call site unique to this
/// invocation: `html!(["<p>", "</p>"], value)`.
#[macro_export]
macro_rules! html {
    ([$($fragment:literal),+ $(,)?] $(, $value:expr)* $(,)?) => {{
        static CALL_SITE: $crate::CallSite = $crate::CallSite::new(&[$($fragment),+]);
        $crate::html(&CALL_SITE, vec![$($crate::Value::from($value)),*])
    }};
}

/// Vector-markup counterpart of [`html!`].
#[macro_export]
macro_rules! svg {
    ([$($fragment:literal),+ $(,)?] $(, $value:expr)* $(,)?) => {{
        static CALL_SITE: $crate::CallSite = $crate::CallSite::new(&[$($fragment),+]);
        $crate::svg(&CALL_SITE, vec![$($crate::Value::from($value)),*])
    }};
}
