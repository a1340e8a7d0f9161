//! Reactive Element Engine - declared properties, attribute reflection and
//! scheduled renders.
//!
//! # Example
//!
//! ```ignore
//! struct Greeter;
//!
//! impl Component for Greeter {
//!     fn tag_name() -> &'static str { "x-greeter" }
//!
//!     fn properties() -> Vec<PropertyDeclaration> {
//!         vec![PropertyDeclaration::new("name").reflect(true)]
//!     }
//!
//!     fn render(&self, el: &ReactiveElement) -> anyhow::Result<Option<TemplateResult>> {
//!         Ok(Some(html!(["<p>Hello ", "</p>"], el.get("name"))))
//!     }
//! }
//!
//! let greeter = ReactiveElement::new(Greeter);
//! document.append_child(greeter.host());
//! greeter.set("name", "world");
//! block_on(greeter.update_complete())?;
//! ```

mod declaration;
mod definition;
mod reactive;
mod styles;
mod update;

pub use declaration::{
    AttributeBinding, Converter, FromAttribute, HasChanged, PropertyDeclaration, ToAttribute, TypeHint,
    default_from_attribute, default_to_attribute, not_equal,
};
pub use definition::ElementDefinition;
pub use reactive::{ChangedProperties, Component, ReactiveElement, WeakElement};
pub use styles::{CssPart, CssResult, CssStyles, StyleAdoption, css, flatten_styles, unsafe_css};
pub use update::{UpdateComplete, UpdateResult, UpdateState};
