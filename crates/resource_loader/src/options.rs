//! Per-call load configuration and resource descriptors.

use crate::error::LoadError;
use crate::kind::ResourceKind;
use crate::logging::LogLevel;
use crate::strategy::Payload;
use core::fmt::{Debug, Formatter, Result as FmtResult};
use core::time::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub use crate::dom::{CrossOrigin, InsertionPoint};

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default pause before a retry.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
/// Default number of simultaneously admitted resources.
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;
/// Default chunk size for [`Scheduling::Batched`].
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Called once per resource that loads successfully, with its key.
pub type SuccessCallback = Arc<dyn Fn(&str, &Payload) + Send + Sync>;
/// Called for every failed attempt, with the key.
pub type ErrorCallback = Arc<dyn Fn(&LoadError, &str) + Send + Sync>;

/// Admission strategy for one `include` call.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "mode")]
pub enum Scheduling {
    /// Keep up to `max_concurrency` loads running, starting the next plan as
    /// soon as any one settles.
    #[default]
    Windowed,
    /// Run fixed-size chunks, waiting for a whole chunk before the next.
    Batched {
        /// Chunk size; capped at `max_concurrency`.
        batch_size: usize,
    },
}

/// Options shared by every resource of one `include` call.
#[derive(Clone)]
pub struct LoadOptions {
    /// Extra attributes applied to injected elements.
    pub attributes: BTreeMap<String, String>,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Append a cache-busting query to eligible URLs.
    pub cache_busting: bool,
    /// Query appended when cache busting; `None` uses `?_=<unix millis>`.
    pub cache_busting_query: Option<String>,
    /// Kinds eligible for cache busting.
    pub cache_busting_kinds: Vec<ResourceKind>,
    /// Only cache-bust resources on the document's origin.
    pub restrict_cache_busting_to_local: bool,
    /// Where scripts are attached. Other elements always go to head.
    pub insertion_point: InsertionPoint,
    /// `crossorigin` value for injected elements and font loads.
    pub cross_origin: Option<CrossOrigin>,
    /// Additional attempts after the first failure.
    pub retries: u32,
    /// Pause between a failure and the next attempt.
    pub retry_delay: Duration,
    /// Park scripts until the document is interactively ready.
    pub defer_scripts_until_ready: bool,
    /// Cap on simultaneously admitted resources.
    pub max_concurrency: usize,
    pub scheduling: Scheduling,
    /// Remove an element whose `error` event fired.
    pub remove_failed_elements: bool,
    /// Overrides the process-wide verbosity for this and later calls.
    pub log_level: Option<LogLevel>,
    pub on_success: Option<SuccessCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            attributes: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
            cache_busting: false,
            cache_busting_query: None,
            cache_busting_kinds: ResourceKind::DEFAULT_CACHE_BUSTING.to_vec(),
            restrict_cache_busting_to_local: true,
            insertion_point: InsertionPoint::Head,
            cross_origin: None,
            retries: 0,
            retry_delay: DEFAULT_RETRY_DELAY,
            defer_scripts_until_ready: true,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            scheduling: Scheduling::Windowed,
            remove_failed_elements: true,
            log_level: None,
            on_success: None,
            on_error: None,
        }
    }
}

impl LoadOptions {
    /// Add an element attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Install a success callback.
    #[must_use]
    pub fn on_success(mut self, callback: impl Fn(&str, &Payload) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    /// Install a per-attempt failure callback.
    #[must_use]
    pub fn on_error(mut self, callback: impl Fn(&LoadError, &str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

impl Debug for LoadOptions {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        formatter
            .debug_struct("LoadOptions")
            .field("attributes", &self.attributes)
            .field("timeout", &self.timeout)
            .field("cache_busting", &self.cache_busting)
            .field("cache_busting_query", &self.cache_busting_query)
            .field("cache_busting_kinds", &self.cache_busting_kinds)
            .field(
                "restrict_cache_busting_to_local",
                &self.restrict_cache_busting_to_local,
            )
            .field("insertion_point", &self.insertion_point)
            .field("cross_origin", &self.cross_origin)
            .field("retries", &self.retries)
            .field("retry_delay", &self.retry_delay)
            .field("defer_scripts_until_ready", &self.defer_scripts_until_ready)
            .field("max_concurrency", &self.max_concurrency)
            .field("scheduling", &self.scheduling)
            .field("remove_failed_elements", &self.remove_failed_elements)
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}

/// One submitted resource: a URL and its admission priority (higher first).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub url: String,
    #[serde(default)]
    pub priority: i32,
}

impl ResourceRequest {
    /// Request with the default priority of 0.
    #[inline]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            priority: 0,
        }
    }

    /// Set the priority.
    #[inline]
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl From<&str> for ResourceRequest {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for ResourceRequest {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}
