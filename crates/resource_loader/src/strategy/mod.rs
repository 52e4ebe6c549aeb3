//! One load strategy per resource kind.
//!
//! A strategy performs a single attempt: it creates and attaches an element,
//! fetches a document, or loads a font face, and resolves once that attempt
//! settles. Timeouts, retries and state bookkeeping are layered on top by the
//! executor, which drops the attempt future to abort it.

mod element;
mod fetch;
mod font;
mod unsupported;

use crate::cancel::CancelHandle;
use crate::dom::Document;
use crate::error::LoadError;
use crate::kind::ResourceKind;
use crate::net::Fetcher;
use crate::options::LoadOptions;
use crate::plan::LoadPlan;
use bytes::Bytes;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

pub use element::ElementStrategy;
pub use fetch::{BlobStrategy, JsonStrategy};
pub use font::FontStrategy;
pub use unsupported::UnsupportedStrategy;

/// Result of one resource operation.
pub type Outcome = Result<Payload, LoadError>;

/// Value a successful load resolves with.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Payload {
    /// DOM-backed kinds and fonts carry no value.
    #[default]
    None,
    /// Parsed JSON document.
    Json(Value),
    /// Raw bytes of a binary resource.
    Blob(Bytes),
}

impl Payload {
    #[inline]
    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::None | Self::Blob(_) => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Blob(bytes) => Some(bytes),
            Self::None | Self::Json(_) => None,
        }
    }
}

/// Collaborators available to an attempt.
#[derive(Clone)]
pub struct LoadContext {
    pub document: Arc<dyn Document>,
    pub fetcher: Arc<dyn Fetcher>,
    pub options: Arc<LoadOptions>,
    /// Handle of the running operation; element strategies register the
    /// element they inject so cancellation can remove it.
    pub cancel: CancelHandle,
}

/// Single-attempt loader for one resource kind.
pub trait LoadStrategy: Send + Sync {
    /// Start one attempt.
    ///
    /// Synchronous side effects (creating and attaching an element) happen
    /// before this returns. Dropping the returned future abandons the
    /// attempt and undoes those side effects.
    fn load(&self, plan: &LoadPlan, context: &LoadContext) -> BoxFuture<'static, Outcome>;
}

static SCRIPT: ElementStrategy = ElementStrategy::new(ResourceKind::Script);
static STYLESHEET: ElementStrategy = ElementStrategy::new(ResourceKind::Stylesheet);
static IMAGE: ElementStrategy = ElementStrategy::new(ResourceKind::Image);
static FONT: FontStrategy = FontStrategy;
static JSON: JsonStrategy = JsonStrategy;
static BLOB: BlobStrategy = BlobStrategy;
static UNSUPPORTED: UnsupportedStrategy = UnsupportedStrategy;

/// Strategy table lookup.
#[must_use]
pub fn strategy_for(kind: ResourceKind) -> &'static dyn LoadStrategy {
    match kind {
        ResourceKind::Script => &SCRIPT,
        ResourceKind::Stylesheet => &STYLESHEET,
        ResourceKind::Image => &IMAGE,
        ResourceKind::Font => &FONT,
        ResourceKind::JsonDocument => &JSON,
        ResourceKind::BinaryBlob => &BLOB,
        ResourceKind::Unsupported => &UNSUPPORTED,
    }
}
