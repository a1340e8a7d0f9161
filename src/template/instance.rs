//! Template instances - a live clone of a template plus its bound parts.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::{PartDescriptor, Template, TreeWalker};
use crate::dom::Node;
use crate::error::{Error, Result};
use crate::parts::{Part, TemplateProcessor};
use crate::render::RenderOptions;
use crate::value::Value;

/// One clone of a [`Template`] with a part per active descriptor.
pub struct TemplateInstance {
    template: Rc<Template>,
    processor: Rc<dyn TemplateProcessor>,
    options: RenderOptions,
    /// `None` for inactive descriptors, so parts stay aligned with values.
    parts: RefCell<Vec<Option<Rc<dyn Part>>>>,
}

impl fmt::Debug for TemplateInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateInstance")
            .field("parts", &self.parts.borrow().len())
            .finish()
    }
}

impl TemplateInstance {
    pub fn new(template: Rc<Template>, processor: Rc<dyn TemplateProcessor>, options: RenderOptions) -> Self {
        Self {
            template,
            processor,
            options,
            parts: RefCell::new(Vec::new()),
        }
    }

    pub fn template(&self) -> &Rc<Template> {
        &self.template
    }

    /// Parts in value order.
    pub fn parts(&self) -> Vec<Option<Rc<dyn Part>>> {
        self.parts.borrow().clone()
    }

    /// Deep-clone the template content and create the parts, walking the clone
    /// in the same order the template was parsed in.
    pub fn clone_fragment(&self) -> Result<Node> {
        let fragment = self.template.content().clone_node(true);
        let descriptors = self.template.parts().clone();

        let mut parts = Vec::with_capacity(descriptors.len());
        let mut template_stack = Vec::new();
        let mut walker = TreeWalker::new(&fragment);
        let mut node = walker.next_node();
        let mut node_index = 0;

        for descriptor in descriptors {
            let Some(index) = descriptor.index() else {
                parts.extend((0..descriptor.value_count()).map(|_| None));
                continue;
            };
            while node_index < index {
                node_index += 1;
                let current = node.as_ref().ok_or(Error::PartIndexOutOfRange { index })?;
                if let Some(content) = current.template_content() {
                    template_stack.push(current.clone());
                    walker.set_current(content);
                }
                node = walker.next_node();
                if node.is_none() {
                    if let Some(template) = template_stack.pop() {
                        walker.set_current(template);
                        node = walker.next_node();
                    }
                }
            }
            let current = node.as_ref().ok_or(Error::PartIndexOutOfRange { index })?;

            match descriptor {
                PartDescriptor::Node { .. } => {
                    let start = current
                        .previous_sibling()
                        .ok_or(Error::PartIndexOutOfRange { index })?;
                    let part = self.processor.handle_text_expression(&self.options);
                    part.insert_after_node(&start);
                    parts.push(Some(part as Rc<dyn Part>));
                }
                PartDescriptor::Attribute { name, strings, .. } => {
                    let created = self
                        .processor
                        .handle_attribute_expressions(current, &name, &strings, &self.options)?;
                    parts.extend(created.into_iter().map(Some));
                }
            }
        }

        *self.parts.borrow_mut() = parts;
        Ok(fragment)
    }

    /// Set every part's value, then commit them all.
    pub fn update(&self, values: &[Value]) -> Result<()> {
        let parts = self.parts();
        for (part, value) in parts.iter().zip(values) {
            if let Some(part) = part {
                part.set_value(value.clone());
            }
        }
        for part in parts.iter().flatten() {
            part.commit()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html;
    use crate::template::parse::remove_nodes_from_template;
    use crate::template::{Template, TemplateRegistry};

    fn instance_for(result: &crate::TemplateResult) -> (TemplateInstance, Node) {
        let registry = TemplateRegistry::new();
        let template = registry.template_for(result).unwrap();
        let instance = TemplateInstance::new(template, result.processor().clone(), RenderOptions::default());
        let fragment = instance.clone_fragment().unwrap();
        (instance, fragment)
    }

    #[test]
    fn test_clone_and_update() {
        let result = html!(["<a href=\"", "\">", "</a>"], "/x", "link");
        let (instance, fragment) = instance_for(&result);
        assert_eq!(instance.parts().len(), 2);
        instance.update(result.values()).unwrap();
        assert_eq!(fragment.inner_html(), "<a href=\"/x\"><!---->link<!----></a>");
    }

    #[test]
    fn test_inactive_descriptor_keeps_alignment() {
        let result = html!(["<!-- ", " --><i>", "</i>"], "ignored", "shown");
        let (instance, fragment) = instance_for(&result);
        let parts = instance.parts();
        assert!(parts[0].is_none());
        assert!(parts[1].is_some());
        instance.update(result.values()).unwrap();
        assert_eq!(fragment.text_content(), "shown");
    }

    #[test]
    fn test_parts_inside_nested_template() {
        let result = html!(["<template><i>", "</i></template><b>", "</b>"], 1, 2);
        let (instance, fragment) = instance_for(&result);
        instance.update(result.values()).unwrap();
        let template = fragment.first_child().unwrap();
        assert_eq!(template.template_content().unwrap().text_content(), "1");
        assert_eq!(fragment.last_child().unwrap().text_content(), "2");
    }

    #[test]
    fn test_removed_multi_expression_attribute_keeps_alignment() {
        let result = html!(["<div class=\"", " ", "\"></div><i>", "</i>"], "a", "b", "shown");
        let template = Rc::new(Template::parse(&result, result.template_element()).unwrap());
        let div = template.content().first_child().unwrap();
        remove_nodes_from_template(&template, &[div]);

        let instance = TemplateInstance::new(template, result.processor().clone(), RenderOptions::default());
        let fragment = instance.clone_fragment().unwrap();
        let parts = instance.parts();
        assert_eq!(parts.len(), 3);
        assert!(parts[0].is_none() && parts[1].is_none());
        instance.update(result.values()).unwrap();
        assert_eq!(fragment.text_content(), "shown");
    }
}
