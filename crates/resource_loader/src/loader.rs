//! Public entry point.

use crate::cancel::CancelHandle;
use crate::dom::Document;
use crate::error::LoadError;
use crate::executor::{Execution, execute, lock_tracker};
use crate::logging::{set_logging_level, verbose};
use crate::net::Fetcher;
use crate::options::{LoadOptions, ResourceRequest};
use crate::plan::{LoadPlan, normalize, now_millis, sort_by_priority};
use crate::scheduler::{LoadResult, schedule};
use crate::state::{ResourceState, SharedOperation, StateChange, StateTracker};
use crate::strategy::{LoadContext, Outcome};
use futures::FutureExt as _;
use std::sync::{Arc, Mutex};
use tokio::spawn;
use tokio::sync::broadcast;
use tokio::task::JoinError;

/// Loads resources into a host document.
///
/// Cloning is cheap; clones share the same state registry.
#[derive(Clone)]
pub struct ResourceLoader {
    document: Arc<dyn Document>,
    fetcher: Arc<dyn Fetcher>,
    tracker: Arc<Mutex<StateTracker>>,
}

impl ResourceLoader {
    /// Create a loader for `document`, fetching documents, blobs and fonts
    /// through `fetcher`.
    #[must_use]
    pub fn new(document: Arc<dyn Document>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            document,
            fetcher,
            tracker: Arc::new(Mutex::new(StateTracker::new())),
        }
    }

    /// Load every request and wait until each one has settled.
    ///
    /// Requests are admitted highest priority first under
    /// `options.max_concurrency`. A key that is already loading or loaded
    /// joins the existing operation instead of starting another. Individual
    /// failures are reported in the returned results, one per request, in
    /// admission order; the call itself never fails.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn include<I, R>(&self, requests: I, options: LoadOptions) -> Vec<LoadResult>
    where
        I: IntoIterator<Item = R>,
        R: Into<ResourceRequest>,
    {
        if let Some(level) = options.log_level {
            set_logging_level(level);
        }
        let base = self.document.base_url().clone();
        let now = now_millis();
        let mut plans: Vec<LoadPlan> = requests
            .into_iter()
            .map(|request| normalize(&request.into(), &options, &base, now))
            .collect();
        sort_by_priority(&mut plans);
        verbose!("Including {} resource(s)", plans.len());

        let options = Arc::new(options);
        schedule(
            plans,
            options.max_concurrency,
            options.scheduling,
            |plan| self.admit(plan, &options),
        )
        .await
    }

    /// Load a single resource.
    ///
    /// # Errors
    ///
    /// Returns the categorized failure of the resource.
    pub async fn include_one(
        &self,
        request: impl Into<ResourceRequest>,
        options: LoadOptions,
    ) -> Outcome {
        let request = request.into();
        let url = request.url.clone();
        self.include([request], options)
            .await
            .into_iter()
            .next()
            .map_or_else(|| Err(LoadError::abort(&url)), |result| result.outcome)
    }

    /// Start the operation for `plan`, or join the existing one.
    fn admit(&self, plan: LoadPlan, options: &Arc<LoadOptions>) -> SharedOperation {
        let key = plan.key.clone();
        let final_url = plan.final_url.clone();
        lock_tracker(&self.tracker).begin(&key, &final_url, |id| {
            let cancel = CancelHandle::new(Arc::clone(&self.document));
            let execution = Execution {
                plan,
                id,
                context: LoadContext {
                    document: Arc::clone(&self.document),
                    fetcher: Arc::clone(&self.fetcher),
                    options: Arc::clone(options),
                    cancel: cancel.clone(),
                },
                tracker: Arc::clone(&self.tracker),
            };
            verbose!("Loading resource: {final_url}");
            let task = spawn(execute(execution));
            let url = final_url.clone();
            let operation = async move {
                task.await
                    .unwrap_or_else(|err| Err(join_failure(&url, &err)))
            }
            .boxed()
            .shared();
            (operation, cancel)
        })
    }

    /// Lifecycle state of `key`.
    #[must_use]
    pub fn resource_state(&self, key: &str) -> ResourceState {
        lock_tracker(&self.tracker).state(key)
    }

    /// Attempts made by the current operation for `key`.
    #[must_use]
    pub fn attempts(&self, key: &str) -> u32 {
        lock_tracker(&self.tracker).attempts(key)
    }

    /// Abort the operation for `key` and mark it unloaded.
    ///
    /// The pending result rejects with an `abort` error. Cancelling an
    /// unknown or settled key only forgets it.
    pub fn cancel_resource(&self, key: &str) {
        let record = lock_tracker(&self.tracker).forget(key);
        if let Some(record) = record {
            if !record.is_settled() {
                verbose!("Cancelling resource: {key}");
                record.cancel_handle().cancel();
            }
        }
    }

    /// Abort every operation that has not settled yet.
    pub fn cancel_all(&self) {
        let drained = lock_tracker(&self.tracker).drain_live();
        for (key, record) in drained {
            verbose!("Cancelling resource: {key}");
            record.cancel_handle().cancel();
        }
    }

    /// Remove the elements injected for `key`, abort any running operation
    /// and forget the key so that a later `include` loads it again.
    pub fn unload_resource(&self, key: &str) {
        let record = lock_tracker(&self.tracker).forget(key);
        let mut urls = vec![key.to_owned()];
        if let Some(record) = &record {
            if !record.is_settled() {
                record.cancel_handle().cancel();
            }
            if record.final_url() != key {
                urls.push(record.final_url().to_owned());
            }
        }
        let mut removed = 0_usize;
        for url in &urls {
            for element in self.document.find_by_url(url) {
                if self.document.remove(element) {
                    removed = removed.saturating_add(1);
                }
            }
        }
        verbose!("Unloaded resource: {key} ({removed} element(s) removed)");
    }

    /// Receive every state transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        lock_tracker(&self.tracker).subscribe()
    }

    /// The host document.
    #[must_use]
    pub fn document(&self) -> &Arc<dyn Document> {
        &self.document
    }
}

/// The spawned operation was aborted by runtime shutdown or panicked.
fn join_failure(url: &str, err: &JoinError) -> LoadError {
    if err.is_cancelled() {
        LoadError::abort(url)
    } else {
        LoadError::network(url, "load task panicked")
    }
}
