//! Host document contract.
//!
//! The loader never talks to a concrete DOM. It asks a [`Document`] to create,
//! attach and remove elements, to report `load`/`error` events, and to load
//! font faces. [`MemoryDocument`] implements the contract in process.

mod attributes;
mod memory;

use core::fmt::{Display, Formatter, Result as FmtResult};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use url::Url;

pub use attributes::recognizes_attribute;
pub use memory::MemoryDocument;

/// Stable key of a node in the host document.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct NodeKey(pub u64);

impl NodeKey {
    /// The document root.
    pub const ROOT: Self = Self(0);
    /// The `<head>` element.
    pub const HEAD: Self = Self(1);
    /// The `<body>` element.
    pub const BODY: Self = Self(2);
}

/// A batchable change to the document, mirrored to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DOMUpdate {
    InsertElement {
        parent: NodeKey,
        node: NodeKey,
        tag: String,
        pos: usize,
    },
    SetAttr {
        node: NodeKey,
        name: String,
        value: String,
    },
    RemoveNode {
        node: NodeKey,
    },
}

/// Where an injected element is attached.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertionPoint {
    #[default]
    Head,
    Body,
}

impl InsertionPoint {
    /// Key of the parent element.
    #[inline]
    #[must_use]
    pub const fn node(self) -> NodeKey {
        match self {
            Self::Head => NodeKey::HEAD,
            Self::Body => NodeKey::BODY,
        }
    }
}

/// Valid values of the `crossorigin` attribute.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrossOrigin {
    Anonymous,
    UseCredentials,
}

impl CrossOrigin {
    /// Attribute value.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::UseCredentials => "use-credentials",
        }
    }

    /// Parse an attribute value; `None` for anything HTML does not
    /// define.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "anonymous" => Some(Self::Anonymous),
            "use-credentials" => Some(Self::UseCredentials),
            _ => None,
        }
    }
}

impl Display for CrossOrigin {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        formatter.write_str(self.as_str())
    }
}

/// Operations the loader needs from the host document.
///
/// Implementations must make every method cheap and non-blocking; the futures
/// returned by [`Document::element_loaded`], [`Document::ready`] and
/// [`Document::load_font`] are the only suspension points. Removing an element
/// that is already gone is a no-op.
pub trait Document: Send + Sync {
    /// Base URL used to resolve relative resource URLs and to decide whether a
    /// resource is same-origin.
    fn base_url(&self) -> &Url;

    /// Whether the document has become interactively ready.
    fn is_ready(&self) -> bool;

    /// Resolves once the document is interactively ready.
    fn ready(&self) -> BoxFuture<'static, ()>;

    /// Attached elements whose `src` or `href` equals `url`, head first.
    fn find_by_url(&self, url: &str) -> Vec<NodeKey>;

    /// Create a detached element.
    fn create_element(&self, tag: &str) -> NodeKey;

    /// Whether an element with `tag` understands the attribute `name`.
    fn recognizes_attribute(&self, tag: &str, name: &str) -> bool {
        recognizes_attribute(tag, name)
    }

    /// Set an attribute unconditionally.
    fn set_attribute(&self, element: NodeKey, name: &str, value: &str);

    /// Attach an element under head or body.
    fn append(&self, element: NodeKey, parent: InsertionPoint);

    /// Detach and drop an element. Returns `false` if it no longer existed.
    fn remove(&self, element: NodeKey) -> bool;

    /// Resolves with the element's `load` event, or fails with its `error`
    /// event.
    fn element_loaded(&self, element: NodeKey) -> BoxFuture<'static, Result<(), String>>;

    /// Load a font face from `url`.
    fn load_font(
        &self,
        url: &Url,
        cross_origin: Option<CrossOrigin>,
    ) -> BoxFuture<'static, Result<(), String>>;

    /// Add a loaded font face to the document's font registry.
    fn register_font(&self, url: &Url);
}
