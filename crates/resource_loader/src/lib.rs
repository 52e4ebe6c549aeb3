//! Resource loading engine.
//!
//! Callers hand the [`ResourceLoader`] one or more resource URLs together with
//! [`LoadOptions`]. Each URL is normalized into a [`LoadPlan`], plans are
//! admitted in priority order under a concurrency cap, and every admitted plan
//! runs through a kind-specific [`LoadStrategy`] with a timeout, a bounded
//! retry loop and a per-resource cancellation handle. The aggregate call
//! settles once every resource has settled.
//!
//! The host document and the network are consumed through the [`Document`]
//! and [`Fetcher`] traits. [`MemoryDocument`] and [`HttpFetcher`] are the
//! in-process implementations used by the command line front end and tests.

pub mod cancel;
pub mod config;
pub mod dom;
pub mod error;
mod executor;
pub mod kind;
pub mod loader;
pub mod logging;
pub mod net;
pub mod options;
pub mod plan;
pub mod scheduler;
pub mod state;
pub mod strategy;

pub use cancel::CancelHandle;
pub use config::LoaderConfig;
pub use dom::{CrossOrigin, DOMUpdate, Document, InsertionPoint, MemoryDocument, NodeKey};
pub use error::{ErrorKind, LoadError};
pub use kind::ResourceKind;
pub use loader::ResourceLoader;
pub use logging::{LogLevel, logging_level, set_logging_level};
pub use net::{FetchResponse, Fetcher, HttpFetcher};
pub use options::{LoadOptions, ResourceRequest, Scheduling};
pub use plan::LoadPlan;
pub use scheduler::LoadResult;
pub use state::{ResourceState, StateChange};
pub use strategy::{LoadStrategy, Payload};
