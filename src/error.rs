//! Error type shared by the template, part, render and element layers.

use thiserror::Error;

/// Everything that can go wrong while parsing, committing or updating.
#[derive(Debug, Error)]
pub enum Error {
    /// `?name=${...}` with anything other than one expression spanning the value.
    #[error("boolean attribute `?{name}` can only contain a single expression")]
    BooleanAttributeArity { name: String },

    /// `@name=${...}` with anything other than one expression spanning the value.
    #[error("event binding `@{name}` can only contain a single expression")]
    EventBindingArity { name: String },

    /// A result whose fragment count is not its value count plus one.
    #[error("template has {fragments} fragments but {values} values; expected one more fragment than values")]
    ValueArity { fragments: usize, values: usize },

    /// The parsed tree holds fewer binding markers than the result has values.
    #[error("template has {expected} expressions but only {found} binding markers were found")]
    MarkerMismatch { expected: usize, found: usize },

    /// A part descriptor points past the end of the cloned tree.
    #[error("part descriptor index {index} is outside the cloned template")]
    PartIndexOutOfRange { index: usize },

    /// An event binding received something that cannot listen.
    #[error("event binding `@{event}` expects a listener, got {found}")]
    InvalidListener { event: String, found: &'static str },

    /// A node part was committed before being attached to the tree.
    #[error("node part committed before it was attached to a container")]
    DetachedPart,

    /// Scoped rendering without a scope name.
    #[error("the `scope_name` render option is required")]
    MissingScopeName,

    /// The element owning an update cycle was dropped before the cycle ran.
    #[error("update cycle was dropped before it completed")]
    UpdateCancelled,

    /// A component hook failed.
    #[error(transparent)]
    Hook(#[from] anyhow::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
