//! Component styles.
//!
//! `css` only accepts other style results and numbers as interpolations, so a
//! stylesheet can never pick up arbitrary text. `unsafe_css` is the explicit
//! escape hatch.

use std::fmt;
use std::rc::Rc;

use crate::dom::{Node, host_profile};
use crate::render::scoping_shim;
use crate::value::format_number;

/// A block of stylesheet text.
#[derive(Clone, PartialEq, Eq)]
pub struct CssResult {
    text: Rc<str>,
}

impl CssResult {
    pub fn css_text(&self) -> &str {
        &self.text
    }
}

impl fmt::Debug for CssResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CssResult").field(&&*self.text).finish()
    }
}

impl fmt::Display for CssResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// An interpolation allowed inside `css`.
#[derive(Debug, Clone)]
pub enum CssPart {
    Css(CssResult),
    Number(f64),
}

impl From<CssResult> for CssPart {
    fn from(value: CssResult) -> Self {
        CssPart::Css(value)
    }
}

impl From<&CssResult> for CssPart {
    fn from(value: &CssResult) -> Self {
        CssPart::Css(value.clone())
    }
}

impl From<f64> for CssPart {
    fn from(value: f64) -> Self {
        CssPart::Number(value)
    }
}

impl From<i32> for CssPart {
    fn from(value: i32) -> Self {
        CssPart::Number(f64::from(value))
    }
}

impl From<u32> for CssPart {
    fn from(value: u32) -> Self {
        CssPart::Number(f64::from(value))
    }
}

/// Join `strings` around `values`.
pub fn css(strings: &[&str], values: &[CssPart]) -> CssResult {
    debug_assert_eq!(strings.len(), values.len() + 1, "css needs one more string than values");
    let mut text = String::new();
    for (index, string) in strings.iter().enumerate() {
        text.push_str(string);
        match values.get(index) {
            Some(CssPart::Css(css)) => text.push_str(css.css_text()),
            Some(CssPart::Number(n)) => text.push_str(&format_number(*n)),
            None => {}
        }
    }
    CssResult { text: text.into() }
}

/// Wrap arbitrary text as a stylesheet. Never pass untrusted input.
pub fn unsafe_css(text: impl Into<String>) -> CssResult {
    CssResult { text: text.into().into() }
}

// =============================================================================
// Style lists
// =============================================================================

/// A style or an arbitrarily nested group of styles.
#[derive(Debug, Clone)]
pub enum CssStyles {
    One(CssResult),
    Many(Vec<CssStyles>),
}

impl From<CssResult> for CssStyles {
    fn from(value: CssResult) -> Self {
        CssStyles::One(value)
    }
}

impl<T: Into<CssStyles>> From<Vec<T>> for CssStyles {
    fn from(value: Vec<T>) -> Self {
        CssStyles::Many(value.into_iter().map(Into::into).collect())
    }
}

/// Flatten nested styles, keeping only the last occurrence of each sheet.
pub fn flatten_styles(styles: &[CssStyles]) -> Vec<CssResult> {
    fn collect(styles: &[CssStyles], out: &mut Vec<CssResult>) {
        for style in styles.iter().rev() {
            match style {
                CssStyles::One(css) => {
                    if !out.contains(css) {
                        out.push(css.clone());
                    }
                }
                CssStyles::Many(group) => collect(group, out),
            }
        }
    }
    let mut reversed = Vec::new();
    collect(styles, &mut reversed);
    reversed.reverse();
    reversed
}

// =============================================================================
// Adoption
// =============================================================================

/// How a render root received its styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleAdoption {
    /// Nothing to adopt.
    Empty,
    /// Handed to the scoping shim under the element's scope.
    Shim,
    /// Installed as constructable stylesheets on the root.
    Adopted,
    /// Must be appended as `<style>` elements after the first render.
    Deferred,
}

pub(crate) fn adopt_styles(root: &Node, styles: &[CssResult], scope: &str) -> StyleAdoption {
    if styles.is_empty() {
        return StyleAdoption::Empty;
    }
    let texts: Vec<String> = styles.iter().map(|s| s.css_text().to_string()).collect();
    match scoping_shim() {
        Some(shim) if !shim.native_shadow() => {
            shim.prepare_adopted_css_text(&texts, scope);
            StyleAdoption::Shim
        }
        _ if host_profile().constructable_stylesheets => {
            root.set_adopted_styles(texts);
            StyleAdoption::Adopted
        }
        _ => StyleAdoption::Deferred,
    }
}

/// Append one `<style>` per sheet to `root`.
pub(crate) fn append_style_elements(root: &Node, styles: &[CssResult]) {
    for css in styles {
        let style = Node::element("style");
        style.append_child(&Node::text(css.css_text()));
        root.append_child(&style);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_interpolates_results_and_numbers() {
        let color = unsafe_css("red");
        let sheet = css(&[":host { color: ", "; width: ", "px }"], &[color.into(), 10.into()]);
        assert_eq!(sheet.css_text(), ":host { color: red; width: 10px }");
    }

    #[test]
    fn test_flatten_keeps_last_occurrence() {
        let a = unsafe_css("a{}");
        let b = unsafe_css("b{}");
        let c = unsafe_css("c{}");
        let styles = vec![
            CssStyles::from(a.clone()),
            CssStyles::from(vec![b.clone(), a.clone()]),
            CssStyles::from(c.clone()),
        ];
        assert_eq!(flatten_styles(&styles), vec![b, a, c]);
    }
}
