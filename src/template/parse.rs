//! Template parsing - locate every marker in the realized tree and record
//! an ordered part descriptor for it.
//!
//! Descriptors carry a walk index: the position of a node in a pre-order walk
//! over the template content that also descends into nested `<template>`
//! contents. Every clone is walked the same way, so an index identifies the
//! same node in every instance.

use std::cell::{Ref, RefCell};
use std::fmt;

use super::{BOUND_ATTRIBUTE_SUFFIX, LAST_ATTRIBUTE_NAME, TemplateResult, marker, split_on_markers};
use crate::dom::{Node, NodeType};
use crate::error::{Error, Result};

// =============================================================================
// Descriptors
// =============================================================================

/// Where one expression slot lives in the template skeleton.
///
/// `index: None` marks an inactive descriptor: the slot consumes a value
/// but has no structural position (a marker inside a comment, or a node the
/// scoping pass removed).
#[derive(Debug, Clone, PartialEq)]
pub enum PartDescriptor {
    /// Child-node slot. The indexed node is the part's end marker; its
    /// previous sibling is the start marker.
    Node { index: Option<usize> },
    /// Attribute slot on the indexed element. `strings` are the literal
    /// pieces around the expressions.
    Attribute {
        index: Option<usize>,
        name: String,
        strings: Vec<String>,
    },
}

impl PartDescriptor {
    pub fn index(&self) -> Option<usize> {
        match self {
            PartDescriptor::Node { index } | PartDescriptor::Attribute { index, .. } => *index,
        }
    }

    fn set_index(&mut self, value: Option<usize>) {
        match self {
            PartDescriptor::Node { index } | PartDescriptor::Attribute { index, .. } => *index = value,
        }
    }

    /// Number of values the slot consumes.
    pub fn value_count(&self) -> usize {
        match self {
            PartDescriptor::Node { .. } => 1,
            PartDescriptor::Attribute { strings, .. } => strings.len().saturating_sub(1),
        }
    }

    pub fn is_active(&self) -> bool {
        self.index().is_some()
    }
}

// =============================================================================
// Tree walking
// =============================================================================

/// Pre-order walk over elements, text and comments below `root`.
pub(crate) struct TreeWalker {
    root: Node,
    current: Node,
}

impl TreeWalker {
    pub(crate) fn new(root: &Node) -> Self {
        Self {
            root: root.clone(),
            current: root.clone(),
        }
    }

    /// Move the walker. Used to step into and back out of template contents.
    pub(crate) fn set_current(&mut self, node: Node) {
        self.current = node;
    }

    pub(crate) fn next_node(&mut self) -> Option<Node> {
        if let Some(child) = self.current.first_child() {
            self.current = child.clone();
            return Some(child);
        }
        let mut node = self.current.clone();
        loop {
            if node == self.root {
                return None;
            }
            if let Some(sibling) = node.next_sibling() {
                self.current = sibling.clone();
                return Some(sibling);
            }
            node = node.parent()?;
        }
    }
}

// =============================================================================
// Template
// =============================================================================

/// Parsed, cached skeleton of one template literal.
pub struct Template {
    element: Node,
    parts: RefCell<Vec<PartDescriptor>>,
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("html", &self.element.inner_html())
            .field("parts", &self.parts.borrow())
            .finish()
    }
}

impl Template {
    /// Parse `element` (a `<template>` realized from `result`'s marked text),
    /// replacing markers with placeholders.
    pub fn parse(result: &TemplateResult, element: Node) -> Result<Self> {
        let content = element
            .template_content()
            .unwrap_or_else(|| element.clone());
        let strings = result.strings();
        let value_count = result.values().len();

        let mut parts = Vec::new();
        let mut nodes_to_remove = Vec::new();
        let mut template_stack: Vec<Node> = Vec::new();
        let mut walker = TreeWalker::new(&content);

        // Walk index of the current node; -1 before the first node.
        let mut index: isize = -1;
        let mut last_part_index: isize = 0;
        let mut part_index = 0;

        while part_index < value_count {
            let Some(node) = walker.next_node() else {
                match template_stack.pop() {
                    Some(template) => {
                        walker.set_current(template);
                        continue;
                    }
                    None => {
                        return Err(Error::MarkerMismatch {
                            expected: value_count,
                            found: part_index,
                        });
                    }
                }
            };
            index += 1;

            match node.node_type() {
                NodeType::Element => {
                    let bound = node
                        .attribute_names()
                        .iter()
                        .filter(|name| name.ends_with(BOUND_ATTRIBUTE_SUFFIX))
                        .count();
                    for _ in 0..bound {
                        let fragment = strings.get(part_index).copied().unwrap_or_default();
                        let name = bound_attribute_name(&node, fragment);
                        let lowered = format!("{}{}", name.to_ascii_lowercase(), BOUND_ATTRIBUTE_SUFFIX);
                        let attribute = if node.has_attribute(&lowered) {
                            lowered
                        } else {
                            format!("{name}{BOUND_ATTRIBUTE_SUFFIX}")
                        };
                        let value = node.get_attribute(&attribute).unwrap_or_default();
                        node.remove_attribute(&attribute);

                        let attribute_strings = split_on_markers(&value);
                        part_index += attribute_strings.len() - 1;
                        parts.push(PartDescriptor::Attribute {
                            index: Some(index as usize),
                            name,
                            strings: attribute_strings,
                        });
                    }
                    if node.is_template() {
                        template_stack.push(node.clone());
                        if let Some(content) = node.template_content() {
                            walker.set_current(content);
                        }
                    }
                }
                NodeType::Text => {
                    let data = node.data().unwrap_or_default();
                    if !data.contains(marker()) {
                        continue;
                    }
                    let Some(parent) = node.parent() else {
                        continue;
                    };
                    let segments = split_on_markers(&data);
                    let Some((last, leading)) = segments.split_last() else {
                        continue;
                    };
                    for segment in leading {
                        let placeholder = if segment.is_empty() {
                            Node::comment("")
                        } else {
                            Node::text(&strip_bound_suffix(segment))
                        };
                        parent.insert_before(&placeholder, Some(&node));
                        index += 1;
                        parts.push(PartDescriptor::Node {
                            index: Some(index as usize),
                        });
                    }
                    if last.is_empty() {
                        parent.insert_before(&Node::comment(""), Some(&node));
                        nodes_to_remove.push(node.clone());
                    } else {
                        node.set_data(last);
                    }
                    part_index += leading.len();
                }
                NodeType::Comment => {
                    let data = node.data().unwrap_or_default();
                    if data == marker() {
                        let Some(parent) = node.parent() else {
                            continue;
                        };
                        // A start marker is needed when nothing precedes the slot
                        // or the preceding node already ends another part.
                        if node.previous_sibling().is_none() || index == last_part_index {
                            index += 1;
                            parent.insert_before(&Node::comment(""), Some(&node));
                        }
                        last_part_index = index;
                        parts.push(PartDescriptor::Node {
                            index: Some(index as usize),
                        });
                        if node.next_sibling().is_none() {
                            node.set_data("");
                        } else {
                            nodes_to_remove.push(node.clone());
                            index -= 1;
                        }
                        part_index += 1;
                    } else {
                        for _ in data.matches(marker()) {
                            parts.push(PartDescriptor::Node { index: None });
                            part_index += 1;
                        }
                    }
                }
                _ => {}
            }
        }

        for node in nodes_to_remove {
            node.remove();
        }

        tracing::trace!(parts = parts.len(), "parsed template");
        Ok(Self {
            element,
            parts: RefCell::new(parts),
        })
    }

    /// The `<template>` element holding the skeleton.
    pub fn element(&self) -> &Node {
        &self.element
    }

    /// The skeleton's content fragment.
    pub fn content(&self) -> Node {
        self.element
            .template_content()
            .unwrap_or_else(|| self.element.clone())
    }

    pub fn parts(&self) -> Ref<'_, Vec<PartDescriptor>> {
        self.parts.borrow()
    }
}

/// Case-preserved attribute name taken from the literal fragment.
fn bound_attribute_name(element: &Node, fragment: &str) -> String {
    if let Some(caps) = LAST_ATTRIBUTE_NAME.captures(fragment) {
        return caps[2].to_string();
    }
    element
        .attribute_names()
        .into_iter()
        .find_map(|name| name.strip_suffix(BOUND_ATTRIBUTE_SUFFIX).map(str::to_string))
        .unwrap_or_default()
}

/// Undo the attribute rename inside raw text (`<style>` bodies and similar).
fn strip_bound_suffix(segment: &str) -> String {
    match LAST_ATTRIBUTE_NAME.captures(segment) {
        Some(caps) if caps[2].ends_with(BOUND_ATTRIBUTE_SUFFIX) => {
            let start = caps.get(0).map_or(0, |m| m.start());
            let name = &caps[2][..caps[2].len() - BOUND_ATTRIBUTE_SUFFIX.len()];
            format!("{}{}{}{}", &segment[..start], &caps[1], name, &caps[3])
        }
        _ => segment.to_string(),
    }
}

// =============================================================================
// Skeleton editing (style scoping)
// =============================================================================

fn next_active(parts: &[PartDescriptor], after: Option<usize>) -> Option<usize> {
    let start = after.map_or(0, |i| i + 1);
    (start..parts.len()).find(|&i| parts[i].is_active())
}

/// Remove `nodes` from the skeleton, shifting the indices of later
/// descriptors and deactivating descriptors inside removed subtrees.
pub(crate) fn remove_nodes_from_template(template: &Template, nodes: &[Node]) {
    let mut parts = template.parts.borrow_mut();
    let mut walker = TreeWalker::new(&template.content());
    let mut part_index = next_active(&parts, None);
    let mut node_index = 0usize;
    let mut remove_count = 0usize;
    let mut removing: Option<Node> = None;
    let mut found = Vec::new();

    while let Some(node) = walker.next_node() {
        if removing.is_some() && node.previous_sibling() == removing {
            removing = None;
        }
        if nodes.contains(&node) {
            found.push(node.clone());
            if removing.is_none() {
                removing = Some(node.clone());
            }
        }
        if removing.is_some() {
            remove_count += 1;
        }
        while let Some(i) = part_index {
            if parts[i].index() != Some(node_index) {
                break;
            }
            let shifted = match removing {
                Some(_) => None,
                None => Some(node_index - remove_count),
            };
            parts[i].set_index(shifted);
            part_index = next_active(&parts, Some(i));
        }
        node_index += 1;
    }

    for node in found {
        node.remove();
    }
}

/// Insert `node` before `reference` in the skeleton (append when `None`),
/// shifting the indices of descriptors at or after the insertion point.
pub(crate) fn insert_node_into_template(template: &Template, node: &Node, reference: Option<&Node>) {
    let content = template.content();
    let Some(reference) = reference else {
        content.append_child(node);
        return;
    };
    let mut parts = template.parts.borrow_mut();
    let mut walker = TreeWalker::new(&content);
    let mut part_index = next_active(&parts, None);
    let mut insert_count = 0;
    let mut walker_index = 0usize;

    while let Some(current) = walker.next_node() {
        if &current == reference {
            insert_count = count_nodes(node);
            if let Some(parent) = reference.parent() {
                parent.insert_before(node, Some(reference));
            }
        }
        while let Some(i) = part_index {
            if parts[i].index() != Some(walker_index) {
                break;
            }
            if insert_count > 0 {
                let mut shifting = Some(i);
                while let Some(j) = shifting {
                    let index = parts[j].index().map(|index| index + insert_count);
                    parts[j].set_index(index);
                    shifting = next_active(&parts, Some(j));
                }
                return;
            }
            part_index = next_active(&parts, Some(i));
        }
        walker_index += 1;
    }
}

fn count_nodes(node: &Node) -> usize {
    let mut count = usize::from(node.node_type() != NodeType::Fragment);
    let mut walker = TreeWalker::new(node);
    while walker.next_node().is_some() {
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html;

    fn parse(result: &TemplateResult) -> Template {
        Template::parse(result, result.template_element()).unwrap()
    }

    #[test]
    fn test_child_slot_gets_start_and_end_markers() {
        let template = parse(&html!(["<div>", "</div>"], "x"));
        assert_eq!(*template.parts(), vec![PartDescriptor::Node { index: Some(2) }]);
        let div = template.content().first_child().unwrap();
        assert_eq!(div.child_count(), 2);
        assert!(div.children().iter().all(|n| n.is_comment() && n.data().as_deref() == Some("")));
    }

    #[test]
    fn test_adjacent_slots_share_markers() {
        let template = parse(&html!(["<p>", "", "</p>"], 1, 2));
        let p = template.content().first_child().unwrap();
        assert_eq!(p.child_count(), 3);
        assert_eq!(
            *template.parts(),
            vec![
                PartDescriptor::Node { index: Some(2) },
                PartDescriptor::Node { index: Some(3) },
            ]
        );
    }

    #[test]
    fn test_attribute_slots_keep_case_and_strings() {
        let template = parse(&html!(["<input .valueAsNumber=", " class=\"a ", " b ", "\">"], 1, "x", "y"));
        let input = template.content().first_child().unwrap();
        assert!(!input.has_attributes());
        assert_eq!(
            *template.parts(),
            vec![
                PartDescriptor::Attribute {
                    index: Some(0),
                    name: ".valueAsNumber".to_string(),
                    strings: vec![String::new(), String::new()],
                },
                PartDescriptor::Attribute {
                    index: Some(0),
                    name: "class".to_string(),
                    strings: vec!["a ".to_string(), " b ".to_string(), String::new()],
                },
            ]
        );
    }

    #[test]
    fn test_marker_inside_comment_is_inactive() {
        let template = parse(&html!(["<!-- ", " --><b>", "</b>"], "hidden", "shown"));
        let parts = template.parts();
        assert_eq!(parts[0], PartDescriptor::Node { index: None });
        assert!(parts[1].is_active());
    }

    #[test]
    fn test_style_text_slot_splits_text() {
        let template = parse(&html!(["<style>a { color: ", "; }</style>"], "red"));
        let style = template.content().first_child().unwrap();
        let children = style.children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].data().as_deref(), Some("a { color: "));
        assert_eq!(children[1].data().as_deref(), Some("; }"));
        assert_eq!(*template.parts(), vec![PartDescriptor::Node { index: Some(2) }]);
    }

    #[test]
    fn test_nested_template_content_is_walked() {
        let template = parse(&html!(["<template><i>", "</i></template><b>", "</b>"], 1, 2));
        let parts = template.parts();
        // template(0) i(1) start(2) end(3) b(4) start(5) end(6)
        assert_eq!(parts[0], PartDescriptor::Node { index: Some(3) });
        assert_eq!(parts[1], PartDescriptor::Node { index: Some(6) });
    }

    #[test]
    fn test_missing_markers_fail() {
        let result = html!(["<p>", "</p>"], 1);
        let element = Node::element("template");
        element.set_inner_html("<p></p>");
        let err = Template::parse(&result, element).unwrap_err();
        assert!(matches!(err, Error::MarkerMismatch { expected: 1, found: 0 }));
    }

    #[test]
    fn test_remove_nodes_shifts_and_deactivates() {
        let template = parse(&html!(["<style>", "</style><b>", "</b>"], "s", "b"));
        let style = template.content().first_child().unwrap();
        remove_nodes_from_template(&template, &[style]);
        let parts = template.parts();
        assert_eq!(parts[0], PartDescriptor::Node { index: None });
        // b(0) start(1) end(2)
        assert_eq!(parts[1], PartDescriptor::Node { index: Some(2) });
    }

    #[test]
    fn test_insert_node_shifts_following_parts() {
        let template = parse(&html!(["<b>", "</b>"], 1));
        let first = template.content().first_child().unwrap();
        insert_node_into_template(&template, &Node::element("style"), Some(&first));
        assert_eq!(*template.parts(), vec![PartDescriptor::Node { index: Some(3) }]);
        assert_eq!(template.content().first_child().and_then(|n| n.tag_name().map(str::to_string)), Some("style".to_string()));
    }
}
