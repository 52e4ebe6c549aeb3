//! Request normalization.
//!
//! Turns a submitted [`ResourceRequest`] plus the call's [`LoadOptions`] into a
//! [`LoadPlan`]: the de-duplication key, the resource kind, the final
//! (possibly cache-busted) URL and the attributes to apply. Normalization is
//! pure apart from the clock used for the default cache-busting token.

use crate::error::LoadError;
use crate::kind::{ResourceKind, extension_of};
use crate::options::{LoadOptions, ResourceRequest};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use url::Url;

/// Ready-to-execute description of one resource load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadPlan {
    /// URL as submitted; identity for de-duplication and state queries.
    pub key: String,
    pub kind: ResourceKind,
    /// Lowercased extension the kind was derived from.
    pub extension: String,
    /// URL actually requested, with the cache-busting query when applied.
    pub final_url: String,
    pub attributes: BTreeMap<String, String>,
    pub priority: i32,
}

impl LoadPlan {
    /// Resolve the final URL against the document base.
    ///
    /// # Errors
    ///
    /// Returns a network error when the URL cannot be parsed.
    pub fn resolve(&self, base: &Url) -> Result<Url, LoadError> {
        base.join(&self.final_url)
            .map_err(|err| LoadError::network(&self.final_url, &format!("invalid URL: {err}")))
    }
}

/// Build the load plan for one request.
///
/// `base` is the document URL; `now_millis` seeds the default cache-busting
/// query.
pub fn normalize(
    request: &ResourceRequest,
    options: &LoadOptions,
    base: &Url,
    now_millis: u128,
) -> LoadPlan {
    let extension = extension_of(&request.url);
    let kind = ResourceKind::from_extension(&extension);
    let bust = options.cache_busting
        && options.cache_busting_kinds.contains(&kind)
        && (!options.restrict_cache_busting_to_local || is_same_origin(&request.url, base));
    let final_url = if bust {
        let query = options
            .cache_busting_query
            .clone()
            .unwrap_or_else(|| default_cache_busting_query(now_millis));
        append_query(&request.url, &query)
    } else {
        request.url.clone()
    };
    LoadPlan {
        key: request.url.clone(),
        kind,
        extension,
        final_url,
        attributes: options.attributes.clone(),
        priority: request.priority,
    }
}

/// Stable sort, highest priority first. Ties keep submission order.
pub fn sort_by_priority(plans: &mut [LoadPlan]) {
    plans.sort_by(|left, right| right.priority.cmp(&left.priority));
}

/// `?_=<millis>`.
#[inline]
#[must_use]
pub fn default_cache_busting_query(now_millis: u128) -> String {
    format!("?_={now_millis}")
}

/// Milliseconds since the Unix epoch, zero if the clock is before it.
#[must_use]
pub fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}

/// Whether `url` (absolute or relative to `base`) shares scheme, host and
/// port with `base`.
fn is_same_origin(url: &str, base: &Url) -> bool {
    base.join(url).is_ok_and(|resolved| {
        resolved.scheme() == base.scheme()
            && resolved.host_str() == base.host_str()
            && resolved.port_or_known_default() == base.port_or_known_default()
    })
}

/// Append a query fragment, switching a leading `?` to `&` when the URL
/// already has a query.
fn append_query(url: &str, query: &str) -> String {
    match query.strip_prefix('?') {
        Some(rest) if url.contains('?') => format!("{url}&{rest}"),
        _ => format!("{url}{query}"),
    }
}
