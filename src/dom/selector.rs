//! Compound selectors: `tag`, `#id`, `.class`, `[attr]`, `[attr=value]`.

use super::Node;

#[derive(Debug, Default, PartialEq)]
pub(super) struct Selector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
}

impl Selector {
    /// Parse a single compound selector. Combinators are not supported.
    pub(super) fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() || (input.contains(char::is_whitespace) && !input.contains('[')) {
            return None;
        }
        let mut selector = Selector::default();
        let mut rest = input;

        let tag_end = rest.find(['#', '.', '[']).unwrap_or(rest.len());
        if tag_end > 0 {
            let tag = &rest[..tag_end];
            if tag != "*" {
                selector.tag = Some(tag.to_string());
            }
            rest = &rest[tag_end..];
        }

        while let Some(first) = rest.chars().next() {
            match first {
                '#' | '.' => {
                    let body = &rest[1..];
                    let end = body.find(['#', '.', '[']).unwrap_or(body.len());
                    if end == 0 {
                        return None;
                    }
                    let name = body[..end].to_string();
                    if first == '#' {
                        selector.id = Some(name);
                    } else {
                        selector.classes.push(name);
                    }
                    rest = &body[end..];
                }
                '[' => {
                    let close = rest.find(']')?;
                    let inner = &rest[1..close];
                    let attribute = match inner.split_once('=') {
                        Some((name, value)) => (
                            name.trim().to_string(),
                            Some(value.trim().trim_matches(['"', '\'']).to_string()),
                        ),
                        None => (inner.trim().to_string(), None),
                    };
                    selector.attributes.push(attribute);
                    rest = &rest[close + 1..];
                }
                _ => return None,
            }
        }
        Some(selector)
    }

    pub(super) fn matches(&self, node: &Node) -> bool {
        let Some(tag) = node.tag_name() else {
            return false;
        };
        if self.tag.as_deref().is_some_and(|t| !t.eq_ignore_ascii_case(tag)) {
            return false;
        }
        if let Some(id) = &self.id {
            if node.get_attribute("id").as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class = node.get_attribute("class").unwrap_or_default();
            let present: Vec<&str> = class.split_whitespace().collect();
            if !self.classes.iter().all(|c| present.contains(&c.as_str())) {
                return false;
            }
        }
        self.attributes.iter().all(|(name, value)| match value {
            Some(expected) => node.get_attribute(name).as_deref() == Some(expected.as_str()),
            None => node.has_attribute(name),
        })
    }
}
