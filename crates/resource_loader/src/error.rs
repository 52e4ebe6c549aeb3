//! Categorized load failures.
//!
//! Every rejected resource carries a [`LoadError`] whose [`ErrorKind`] says
//! where the failure came from. The kind also decides whether the executor
//! may retry the resource.

use core::fmt::{Display, Formatter, Result as FmtResult};
use serde::Serialize;
use std::error::Error;

/// Failure category attached to every rejection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// The operation was cancelled explicitly.
    Abort,
    /// The configured timeout elapsed before the load finished.
    Timeout,
    /// No load strategy exists for the resource kind.
    Unsupported,
    /// Any other failure: HTTP error status, element `error` event, fetch failure.
    Network,
}

impl ErrorKind {
    /// Lowercase name used in messages and serialized results.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::Timeout => "timeout",
            Self::Unsupported => "unsupported",
            Self::Network => "network",
        }
    }

    /// Whether a failure of this kind may be followed by another attempt.
    #[inline]
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Timeout | Self::Network)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        formatter.write_str(self.as_str())
    }
}

/// A categorized rejection: `{ type, message }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoadError {
    #[serde(rename = "type")]
    kind: ErrorKind,
    message: String,
}

impl LoadError {
    /// Create an error of the given kind.
    #[inline]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The load for `url` was cancelled.
    #[inline]
    pub fn abort(url: &str) -> Self {
        Self::new(ErrorKind::Abort, format!("Load aborted for: {url}"))
    }

    /// The load for `url` did not finish in time.
    #[inline]
    pub fn timeout(url: &str) -> Self {
        Self::new(ErrorKind::Timeout, format!("Timeout while loading: {url}"))
    }

    /// No strategy handles `extension`.
    #[inline]
    pub fn unsupported(extension: &str, url: &str) -> Self {
        Self::new(
            ErrorKind::Unsupported,
            format!("Unsupported file type: {extension} for {url}"),
        )
    }

    /// Network or load-event failure, with a short description of the cause.
    #[inline]
    pub fn network(url: &str, detail: &str) -> Self {
        Self::new(
            ErrorKind::Network,
            format!("Network error or resource not found: {url} ({detail})"),
        )
    }

    /// Failure category.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human readable description.
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for LoadError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        write!(formatter, "{}: {}", self.kind, self.message)
    }
}

impl Error for LoadError {}
