//! Render - the commit root.
//!
//! `render` owns everything below a container: the first call clears the
//! container and attaches a persistent node part spanning its content; every
//! call sets that part's value and commits. Re-rendering the same template
//! updates the existing instance in place.
//!
//! ```ignore
//! let container = Node::element("div");
//! render(html!(["<p>", "</p>"], "hi"), &container, RenderOptions::default())?;
//! assert_eq!(container.text_content(), "hi");
//! ```

mod scoping;

pub use scoping::{ScopingShim, install_scoping_shim, remove_scoping_shim, render_scoped, scoping_shim};

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::dom::Node;
use crate::error::Result;
use crate::parts::{NodePart, Part};
use crate::template::{Template, TemplateResult, default_template_factory};
use crate::value::Value;

/// Resolves a render result to its parsed template.
pub type TemplateFactory = Rc<dyn Fn(&TemplateResult) -> Result<Rc<Template>>>;

/// Options fixed when a container is first rendered into.
#[derive(Clone, Default)]
pub struct RenderOptions {
    /// Template lookup; the thread's default registry when `None`.
    pub template_factory: Option<TemplateFactory>,
    /// Node passed to event listeners instead of the bound element.
    pub event_context: Option<Node>,
    /// Style scope, required by [`render_scoped`].
    pub scope_name: Option<String>,
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("template_factory", &self.template_factory.is_some())
            .field("event_context", &self.event_context)
            .field("scope_name", &self.scope_name)
            .finish()
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn template_factory(&self) -> TemplateFactory {
        self.template_factory
            .clone()
            .unwrap_or_else(default_template_factory)
    }

    pub fn with_template_factory(mut self, factory: TemplateFactory) -> Self {
        self.template_factory = Some(factory);
        self
    }

    pub fn with_event_context(mut self, context: &Node) -> Self {
        self.event_context = Some(context.clone());
        self
    }

    pub fn with_scope_name(mut self, scope: &str) -> Self {
        self.scope_name = Some(scope.to_string());
        self
    }
}

/// Render `value` into `container`.
pub fn render(value: impl Into<Value>, container: &Node, options: RenderOptions) -> Result<()> {
    let part = match root_part(container) {
        Some(part) => part,
        None => {
            container.clear_children();
            let part = NodePart::new(options);
            part.append_into(container);
            container.set_render_state(Some(part.clone() as Rc<dyn Any>));
            part
        }
    };
    part.set_value(value.into());
    part.commit()
}

/// The persistent part of a container that has been rendered into.
pub(crate) fn root_part(container: &Node) -> Option<Rc<NodePart>> {
    container.render_state()?.downcast::<NodePart>().ok()
}
