//! Template processors - pick the part type for each binding.

use std::rc::Rc;

use super::{AttributeCommitter, BooleanAttributePart, EventPart, NodePart, Part};
use crate::dom::Node;
use crate::error::{Error, Result};
use crate::render::RenderOptions;

/// Creates parts for the bindings of a template instance.
pub trait TemplateProcessor {
    /// Parts for one attribute binding, one per expression.
    fn handle_attribute_expressions(
        &self,
        element: &Node,
        name: &str,
        strings: &[String],
        options: &RenderOptions,
    ) -> Result<Vec<Rc<dyn Part>>>;

    /// Part for one child-node binding.
    fn handle_text_expression(&self, options: &RenderOptions) -> Rc<NodePart>;
}

/// Prefix rules: `.name` property, `@name` event, `?name` boolean attribute,
/// anything else a string attribute.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTemplateProcessor;

impl TemplateProcessor for DefaultTemplateProcessor {
    fn handle_attribute_expressions(
        &self,
        element: &Node,
        name: &str,
        strings: &[String],
        options: &RenderOptions,
    ) -> Result<Vec<Rc<dyn Part>>> {
        let Some(prefix) = name.chars().next() else {
            return Ok(AttributeCommitter::attribute(element, name, strings).parts());
        };
        let bare = &name[prefix.len_utf8()..];
        match prefix {
            '.' => Ok(AttributeCommitter::property(element, bare, strings).parts()),
            '@' => {
                if strings.len() != 2 || strings.iter().any(|s| !s.is_empty()) {
                    return Err(Error::EventBindingArity {
                        name: bare.to_string(),
                    });
                }
                let part = EventPart::new(element, bare, options.event_context.clone());
                Ok(vec![part as Rc<dyn Part>])
            }
            '?' => {
                let part = BooleanAttributePart::new(element, bare, strings)?;
                Ok(vec![part as Rc<dyn Part>])
            }
            _ => Ok(AttributeCommitter::attribute(element, name, strings).parts()),
        }
    }

    fn handle_text_expression(&self, options: &RenderOptions) -> Rc<NodePart> {
        NodePart::new(options.clone())
    }
}

thread_local! {
    static DEFAULT_PROCESSOR: Rc<dyn TemplateProcessor> = Rc::new(DefaultTemplateProcessor);
}

/// The processor tag factories attach to new results.
pub fn default_processor() -> Rc<dyn TemplateProcessor> {
    DEFAULT_PROCESSOR.with(Rc::clone)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parts::PartKind;

    fn kinds(name: &str, strings: &[&str]) -> Result<Vec<PartKind>> {
        let el = Node::element("div");
        let strings: Vec<String> = strings.iter().map(|s| s.to_string()).collect();
        let parts = DefaultTemplateProcessor.handle_attribute_expressions(&el, name, &strings, &RenderOptions::default())?;
        Ok(parts.iter().map(|p| p.kind()).collect())
    }

    #[test]
    fn test_prefix_selects_part_kind() {
        assert_eq!(kinds("title", &["a", "b", ""]).unwrap(), vec![PartKind::Attribute, PartKind::Attribute]);
        assert_eq!(kinds(".value", &["", ""]).unwrap(), vec![PartKind::Property]);
        assert_eq!(kinds("@click", &["", ""]).unwrap(), vec![PartKind::Event]);
        assert_eq!(kinds("?hidden", &["", ""]).unwrap(), vec![PartKind::BooleanAttribute]);
    }

    #[test]
    fn test_event_binding_needs_single_expression() {
        assert!(matches!(kinds("@click", &["x", ""]), Err(Error::EventBindingArity { .. })));
        assert!(matches!(kinds("?hidden", &["", "", ""]), Err(Error::BooleanAttributeArity { .. })));
    }
}
