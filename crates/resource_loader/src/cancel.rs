//! Per-resource cancellation.

use crate::dom::{Document, NodeKey};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// Idempotent abort switch for one resource operation.
///
/// Cancelling fires the token observed by the executor (stopping the timeout
/// race and any pending retry) and synchronously removes the element the
/// current attempt has injected, if any.
#[derive(Clone)]
pub struct CancelHandle {
    token: CancellationToken,
    element: Arc<Mutex<Option<NodeKey>>>,
    document: Arc<dyn Document>,
}

impl CancelHandle {
    /// Create a handle whose element removals go to `document`.
    #[must_use]
    pub fn new(document: Arc<dyn Document>) -> Self {
        Self {
            token: CancellationToken::new(),
            element: Arc::new(Mutex::new(None)),
            document,
        }
    }

    /// Abort the operation. Calling it again, or after the operation settled,
    /// does nothing.
    pub fn cancel(&self) {
        self.token.cancel();
        if let Some(element) = self.take_element() {
            self.document.remove(element);
        }
    }

    /// Whether [`CancelHandle::cancel`] has been called.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token awaited by the executor.
    #[inline]
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Remember the element injected by the running attempt.
    pub(crate) fn track(&self, element: NodeKey) {
        *self.element.lock().unwrap_or_else(PoisonError::into_inner) = Some(element);
    }

    /// Forget the tracked element; it is no longer ours to remove.
    pub(crate) fn release(&self) {
        drop(self.take_element());
    }

    /// Stop tracking the element of the last attempt and return it.
    pub(crate) fn take_element(&self) -> Option<NodeKey> {
        self.element
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
