//! Per-resource lifecycle bookkeeping.
//!
//! The [`StateTracker`] owns one [`ResourceRecord`] per key. A record holds the
//! shared operation future so concurrent requests for the same key observe one
//! load, the cancel handle for that load, and the public [`ResourceState`].
//! Every mutation happens under the loader's lock and is checked against the
//! [`OperationId`] that created the record, so updates from an operation that
//! was cancelled, unloaded or replaced are dropped.

use crate::cancel::CancelHandle;
use crate::dom::NodeKey;
use crate::strategy::Outcome;
use core::fmt::{Display, Formatter, Result as FmtResult};
use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::broadcast;

const CHANGE_CAPACITY: usize = 1024;

/// Operation future shared by every caller of the same key.
pub type SharedOperation = Shared<BoxFuture<'static, Outcome>>;

/// Public lifecycle state of a resource key.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
}

impl ResourceState {
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
        }
    }
}

impl Display for ResourceState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        formatter.write_str(self.as_str())
    }
}

/// A state transition, broadcast to [`StateTracker::subscribe`] receivers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateChange {
    pub key: String,
    pub state: ResourceState,
}

/// Identity of one operation started by [`StateTracker::begin`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct OperationId(u64);

/// Everything tracked for one key.
pub struct ResourceRecord {
    state: ResourceState,
    operation: SharedOperation,
    cancel: CancelHandle,
    attempts: u32,
    settled: bool,
    id: OperationId,
    final_url: String,
    /// Element left behind by the last failed attempt.
    failed_element: Option<NodeKey>,
}

impl ResourceRecord {
    #[inline]
    #[must_use]
    pub const fn state(&self) -> ResourceState {
        self.state
    }

    /// Attempts started so far, including the first.
    #[inline]
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether the operation has produced its final outcome.
    #[inline]
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        self.settled
    }

    /// URL the operation requested.
    #[inline]
    #[must_use]
    pub fn final_url(&self) -> &str {
        &self.final_url
    }

    #[inline]
    #[must_use]
    pub const fn cancel_handle(&self) -> &CancelHandle {
        &self.cancel
    }
}

/// Instance-owned registry of resource records.
pub struct StateTracker {
    records: HashMap<String, ResourceRecord>,
    next_id: u64,
    changes: broadcast::Sender<StateChange>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            records: HashMap::new(),
            next_id: 0,
            changes,
        }
    }

    /// State of `key`; [`ResourceState::Unloaded`] when untracked.
    #[must_use]
    pub fn state(&self, key: &str) -> ResourceState {
        self.records
            .get(key)
            .map_or(ResourceState::Unloaded, ResourceRecord::state)
    }

    #[must_use]
    pub fn record(&self, key: &str) -> Option<&ResourceRecord> {
        self.records.get(key)
    }

    /// Attempts made by the current operation for `key`, zero when untracked.
    #[must_use]
    pub fn attempts(&self, key: &str) -> u32 {
        self.records.get(key).map_or(0, ResourceRecord::attempts)
    }

    /// Receive every transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    /// Keys currently in [`ResourceState::Loading`].
    #[must_use]
    pub fn loading_count(&self) -> usize {
        self.records
            .values()
            .filter(|record| record.state == ResourceState::Loading)
            .count()
    }

    /// Return the operation for `key`, starting one if needed.
    ///
    /// An unsettled or loaded record is reused. Otherwise `start` is called
    /// with a fresh id to spawn the operation, and the new record enters
    /// [`ResourceState::Loading`] with its first attempt counted.
    pub fn begin<F>(&mut self, key: &str, final_url: &str, start: F) -> SharedOperation
    where
        F: FnOnce(OperationId) -> (SharedOperation, CancelHandle),
    {
        if let Some(record) = self.records.get(key) {
            if !record.settled || record.state == ResourceState::Loaded {
                return record.operation.clone();
            }
        }
        let failed_element = self
            .records
            .get(key)
            .and_then(|record| record.failed_element);
        let id = OperationId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        let (operation, cancel) = start(id);
        self.records.insert(
            key.to_owned(),
            ResourceRecord {
                state: ResourceState::Loading,
                operation: operation.clone(),
                cancel,
                attempts: 1,
                settled: false,
                id,
                final_url: final_url.to_owned(),
                failed_element,
            },
        );
        self.emit(key, ResourceState::Loading);
        operation
    }

    /// Enter `Loading` for another attempt. Returns `false` when the operation
    /// is stale or was cancelled, in which case no attempt must be made.
    pub fn retry(&mut self, key: &str, id: OperationId) -> bool {
        let Some(record) = self.live_record(key, id) else {
            return false;
        };
        if record.cancel.is_cancelled() {
            return false;
        }
        record.attempts = record.attempts.saturating_add(1);
        record.state = ResourceState::Loading;
        self.emit(key, ResourceState::Loading);
        true
    }

    /// Final success: `Loaded`, settled, element ownership handed to the page.
    ///
    /// Returns `false` when the operation was cancelled or replaced first; its
    /// result must then be discarded.
    pub fn complete(&mut self, key: &str, id: OperationId) -> bool {
        let Some(record) = self.live_record(key, id) else {
            return false;
        };
        record.state = ResourceState::Loaded;
        record.settled = true;
        record.cancel.release();
        self.emit(key, ResourceState::Loaded);
        true
    }

    /// A failed attempt: back to `Unloaded`, record kept.
    pub fn fail(&mut self, key: &str, id: OperationId) {
        if let Some(record) = self.live_record(key, id) {
            if record.state != ResourceState::Unloaded {
                record.state = ResourceState::Unloaded;
                self.emit(key, ResourceState::Unloaded);
            }
        }
    }

    /// Mark the operation finished after its last failed attempt, remembering
    /// the element that attempt left in the document, if any.
    pub fn settle(&mut self, key: &str, id: OperationId, failed_element: Option<NodeKey>) {
        if let Some(record) = self.live_record(key, id) {
            record.settled = true;
            record.failed_element = failed_element;
        }
    }

    /// Hand the element left behind by the previous failed operation for
    /// `key` to the operation that replaced it.
    pub fn take_failed_element(&mut self, key: &str, id: OperationId) -> Option<NodeKey> {
        self.live_record(key, id)?.failed_element.take()
    }

    /// Drop the record for `key`, returning it so the caller can cancel the
    /// operation outside the lock.
    pub fn forget(&mut self, key: &str) -> Option<ResourceRecord> {
        let record = self.records.remove(key)?;
        if record.state != ResourceState::Unloaded {
            self.emit(key, ResourceState::Unloaded);
        }
        Some(record)
    }

    /// Remove every unsettled record. Settled ones stay queryable.
    pub fn drain_live(&mut self) -> Vec<(String, ResourceRecord)> {
        let live: Vec<String> = self
            .records
            .iter()
            .filter(|(_, record)| !record.settled)
            .map(|(key, _)| key.clone())
            .collect();
        live.into_iter()
            .filter_map(|key| self.forget(&key).map(|record| (key, record)))
            .collect()
    }

    fn live_record(&mut self, key: &str, id: OperationId) -> Option<&mut ResourceRecord> {
        self.records
            .get_mut(key)
            .filter(|record| record.id == id && !record.settled)
    }

    fn emit(&self, key: &str, state: ResourceState) {
        // No subscribers is fine.
        drop(self.changes.send(StateChange {
            key: key.to_owned(),
            state,
        }));
    }
}
