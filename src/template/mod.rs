//! Templates - render results, parsing, caching and instances.
//!
//! ```text
//! html!(["<p>", "</p>"], name)  →  TemplateResult { fragments, values }
//!          │
//!          ▼  TemplateRegistry::template_for (call site, then joined text)
//!      Template { <template> skeleton, [PartDescriptor] }
//!          │
//!          ▼  TemplateInstance::clone_fragment + update(values)
//!      live nodes + parts
//! ```

mod instance;
mod parse;
mod registry;
mod result;

pub use instance::TemplateInstance;
pub use parse::{PartDescriptor, Template};
pub use registry::{TemplateRegistry, default_template_factory, with_default_registry};
pub use result::{CallSite, DynamicFragments, TemplateNamespace, TemplateResult, html, html_dynamic, svg, svg_dynamic};

pub(crate) use parse::{TreeWalker, insert_node_into_template, remove_nodes_from_template};

use std::hash::{BuildHasher, Hasher};
use std::sync::{LazyLock, OnceLock};

use regex::Regex;

// =============================================================================
// Markers
// =============================================================================

/// Suffix appended to attribute names that carry a binding.
pub(crate) const BOUND_ATTRIBUTE_SUFFIX: &str = "$spark$";

static MARKER: OnceLock<String> = OnceLock::new();
static NODE_MARKER: OnceLock<String> = OnceLock::new();

/// Unique per-process token delimiting expression slots in template text.
pub(crate) fn marker() -> &'static str {
    MARKER.get_or_init(|| {
        let mut hasher = std::collections::hash_map::RandomState::new().build_hasher();
        hasher.write_u64(0x5eed);
        format!("{{{{spark-{}}}}}", hasher.finish() % 10_000_000_000)
    })
}

/// The marker as a comment, used for slots in child-node position.
pub(crate) fn node_marker() -> &'static str {
    NODE_MARKER.get_or_init(|| format!("<!--{}-->", marker()))
}

/// Matches a fragment that ends inside an attribute value, capturing the
/// preceding whitespace, the attribute name and the `=...` tail.
pub(crate) static LAST_ATTRIBUTE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"([ \x09\x0a\x0c\x0d])([^\x00-\x1F\x7F-\x9F "'>=/]+)([ \x09\x0a\x0c\x0d]*=[ \x09\x0a\x0c\x0d]*(?:[^ \x09\x0a\x0c\x0d"'`<>=]*|"[^"]*|'[^']*))$"#,
    )
    .expect("attribute pattern is valid")
});

/// Split text on every marker occurrence (plain or comment form).
pub(crate) fn split_on_markers(text: &str) -> Vec<String> {
    text.replace(node_marker(), marker())
        .split(marker())
        .map(str::to_string)
        .collect()
}
