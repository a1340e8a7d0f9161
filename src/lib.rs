//! # spark-html
//!
//! Declarative template rendering and reactive elements for Rust.
//!
//! Templates are written as literal fragments with bound values in between.
//! Each call site is parsed once into a `<template>` skeleton with marked
//! binding positions; rendering clones the skeleton and afterwards only
//! touches the positions whose values changed.
//!
//! ```text
//! html!([..], values) → TemplateResult ─► Template (cached) ─► TemplateInstance
//!                                                                   │
//!                                   parts: node / attribute / property / event
//!                                                                   │
//!                                           commit only what changed ┘
//! ```
//!
//! Reactive elements sit on top: declared properties record their changes
//! and fold them into one update cycle on the microtask queue, mirror
//! themselves to attributes, and re-render through the same engine.
//!
//! ## Modules
//!
//! - [`dom`] - In-memory host document the engine renders into
//! - [`template`] - Render results, parsing, the template cache, instances
//! - [`parts`] - Bindings and their commit rules
//! - [`render`] - Render entry points and style scoping
//! - [`directives`] - Deferred values and signal bindings
//! - [`element`] - Reactive elements and update cycles
//! - [`scheduler`] - The microtask queue

pub mod directives;
pub mod dom;
pub mod element;
pub mod error;
pub mod parts;
pub mod render;
pub mod scheduler;
pub mod template;
pub mod value;

pub use error::{Error, Result};
pub use value::{EventHandler, HandleEvent, Listener, Value, listener};

pub use dom::{Event, HostProfile, Node, NodeType, set_host_profile};

pub use template::{
    CallSite, DynamicFragments, Template, TemplateNamespace, TemplateRegistry, TemplateResult, html,
    html_dynamic, svg, svg_dynamic,
};

pub use parts::{Part, PartKind, TemplateProcessor};

pub use render::{RenderOptions, ScopingShim, install_scoping_shim, remove_scoping_shim, render, render_scoped};

pub use directives::{directive, watch};

pub use element::{
    AttributeBinding, ChangedProperties, Component, Converter, CssResult, CssStyles, PropertyDeclaration,
    ReactiveElement, TypeHint, UpdateComplete, css, unsafe_css,
};

pub use scheduler::{block_on, run_microtasks};
