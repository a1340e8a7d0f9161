//! Markup - markup-to-tree realization and tree-to-markup serialization.
//!
//! Parsing runs html5ever's fragment algorithm with the target node as the
//! context element, so character references, implied end tags, foreign
//! (SVG) content and `<template>` contents behave as in a host document. The
//! resulting RcDom is copied into [`Node`]s.

use html5ever::tendril::TendrilSink;
use html5ever::{Attribute, LocalName, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use super::{Namespace, Node, NodeKind, NodeType};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";
const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements whose text children serialize without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext"];

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

// =============================================================================
// Parsing
// =============================================================================

/// Realize markup as children of a new fragment.
pub fn parse_fragment(markup: &str) -> Node {
    let fragment = Node::fragment();
    parse_into(&fragment, markup);
    fragment
}

/// Realize markup and append the nodes to `parent` (or to its template
/// content when `parent` is a `<template>`).
pub fn parse_into(parent: &Node, markup: &str) {
    let target = parent.template_content().unwrap_or_else(|| parent.clone());
    let dom = html5ever::parse_fragment(RcDom::default(), ParseOpts::default(), context_name(parent), Vec::new())
        .one(markup);

    // Fragment parsing wraps the result in a synthetic root element.
    for root in dom.document.children.borrow().iter() {
        for child in root.children.borrow().iter() {
            append_converted(&target, child);
        }
    }
}

/// Context element for the fragment algorithm. Nodes without a tag parse as
/// template content, which accepts any top-level markup.
fn context_name(parent: &Node) -> QualName {
    let (namespace, tag) = match (parent.namespace(), parent.tag_name()) {
        (Some(Namespace::Svg), Some(tag)) => (SVG_NAMESPACE, tag),
        (_, Some(tag)) => (HTML_NAMESPACE, tag),
        _ => (HTML_NAMESPACE, "template"),
    };
    QualName::new(None, namespace.into(), LocalName::from(tag))
}

fn append_converted(parent: &Node, handle: &Handle) {
    match &handle.data {
        NodeData::Text { contents } => parent.append_child(&Node::text(&contents.borrow())),
        NodeData::Comment { contents } => parent.append_child(&Node::comment(contents)),
        NodeData::Element {
            name,
            attrs,
            template_contents,
            ..
        } => {
            let element = if &*name.ns == SVG_NAMESPACE {
                Node::element_ns(&name.local, Namespace::Svg)
            } else {
                Node::element(&name.local)
            };
            for attribute in attrs.borrow().iter() {
                element.set_attribute(&attribute_name(attribute), &attribute.value);
            }
            parent.append_child(&element);

            let contents = template_contents.borrow();
            let (source, target) = match (contents.as_ref(), element.template_content()) {
                (Some(source), Some(target)) => (source.clone(), target),
                _ => (handle.clone(), element.clone()),
            };
            for child in source.children.borrow().iter() {
                append_converted(&target, child);
            }
        }
        NodeData::Document | NodeData::Doctype { .. } | NodeData::ProcessingInstruction { .. } => {}
    }
}

fn attribute_name(attribute: &Attribute) -> String {
    match &attribute.name.prefix {
        Some(prefix) => format!("{prefix}:{}", attribute.name.local),
        None => attribute.name.local.to_string(),
    }
}

// =============================================================================
// Serialization
// =============================================================================

fn serialize_into(node: &Node, out: &mut String) {
    match &node.0.kind {
        NodeKind::Text(data) => {
            let raw = node
                .parent()
                .and_then(|p| p.tag_name().map(|t| RAW_TEXT_ELEMENTS.contains(&t)))
                .unwrap_or(false);
            if raw {
                out.push_str(&data.borrow());
            } else {
                out.push_str(&html_escape::encode_text(&*data.borrow()));
            }
        }
        NodeKind::Comment(data) => {
            out.push_str("<!--");
            out.push_str(&data.borrow());
            out.push_str("-->");
        }
        NodeKind::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            for (name, value) in el.attributes.borrow().iter() {
                out.push(' ');
                out.push_str(name);
                if !value.is_empty() {
                    out.push_str("=\"");
                    out.push_str(&html_escape::encode_double_quoted_attribute(value));
                    out.push('"');
                }
            }
            out.push('>');
            if el.namespace == Namespace::Html && is_void(&el.tag) {
                return;
            }
            let children_of = el.content.as_ref().unwrap_or(node);
            for child in children_of.children() {
                serialize_into(&child, out);
            }
            out.push_str("</");
            out.push_str(&el.tag);
            out.push('>');
        }
        NodeKind::Document | NodeKind::Fragment | NodeKind::ShadowRoot(_) => {
            for child in node.children() {
                serialize_into(&child, out);
            }
        }
    }
}

impl Node {
    /// Markup of the node's children (template content for `<template>`).
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        let source = self.template_content().unwrap_or_else(|| self.clone());
        for child in source.children() {
            serialize_into(&child, &mut out);
        }
        out
    }

    /// Markup of the node itself.
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        serialize_into(self, &mut out);
        out
    }

    /// Replace the children with parsed markup.
    pub fn set_inner_html(&self, markup: &str) {
        let target = self.template_content().unwrap_or_else(|| self.clone());
        target.clear_children();
        if self.node_type() != NodeType::Text && self.node_type() != NodeType::Comment {
            parse_into(self, markup);
        }
    }
}
