//! Admission of normalized plans under a concurrency cap.
//!
//! Plans arrive already sorted by priority. The scheduler decides *when* each
//! one is handed to the admit function (which starts or joins the resource
//! operation) and collects one [`LoadResult`] per plan. It never stops early:
//! a failed plan only frees its slot.

use crate::error::LoadError;
use crate::options::Scheduling;
use crate::plan::LoadPlan;
use crate::state::SharedOperation;
use crate::strategy::{Outcome, Payload};
use futures::future::join_all;
use futures::{StreamExt as _, stream};

/// Settled outcome of one submitted resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadResult {
    /// Resource key (the URL as submitted).
    pub url: String,
    pub outcome: Outcome,
}

impl LoadResult {
    /// Whether the resource loaded.
    #[inline]
    #[must_use]
    pub const fn is_fulfilled(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Rejection reason, if any.
    #[inline]
    #[must_use]
    pub const fn error(&self) -> Option<&LoadError> {
        match &self.outcome {
            Ok(_) => None,
            Err(error) => Some(error),
        }
    }

    /// Resolved value, if any.
    #[inline]
    #[must_use]
    pub const fn payload(&self) -> Option<&Payload> {
        match &self.outcome {
            Ok(payload) => Some(payload),
            Err(_) => None,
        }
    }
}

/// Admit every plan according to `scheduling` and wait for all of them.
///
/// Results are returned in admission order.
pub async fn schedule<A>(
    plans: Vec<LoadPlan>,
    max_concurrency: usize,
    scheduling: Scheduling,
    admit: A,
) -> Vec<LoadResult>
where
    A: FnMut(LoadPlan) -> SharedOperation,
{
    let window = max_concurrency.max(1);
    match scheduling {
        Scheduling::Windowed => windowed(plans, window, admit).await,
        Scheduling::Batched { batch_size } => {
            batched(plans, batch_size.clamp(1, window), admit).await
        }
    }
}

/// Keep `window` operations in flight; admit the next plan whenever one
/// settles.
async fn windowed<A>(plans: Vec<LoadPlan>, window: usize, mut admit: A) -> Vec<LoadResult>
where
    A: FnMut(LoadPlan) -> SharedOperation,
{
    let mut slots: Vec<Option<LoadResult>> = vec![None; plans.len()];
    let mut settled = stream::iter(plans.into_iter().enumerate())
        .map(|(index, plan)| {
            let url = plan.key.clone();
            let operation = admit(plan);
            async move {
                let outcome = operation.await;
                (index, LoadResult { url, outcome })
            }
        })
        .buffer_unordered(window);
    while let Some((index, result)) = settled.next().await {
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(result);
        }
    }
    slots.into_iter().flatten().collect()
}

/// Admit fixed-size chunks, waiting for a whole chunk before the next.
async fn batched<A>(plans: Vec<LoadPlan>, batch_size: usize, mut admit: A) -> Vec<LoadResult>
where
    A: FnMut(LoadPlan) -> SharedOperation,
{
    let mut results = Vec::with_capacity(plans.len());
    let mut remaining = plans.into_iter().peekable();
    while remaining.peek().is_some() {
        let chunk = remaining.by_ref().take(batch_size).map(|plan| {
            let url = plan.key.clone();
            let operation = admit(plan);
            async move {
                let outcome = operation.await;
                LoadResult { url, outcome }
            }
        });
        results.extend(join_all(chunk).await);
    }
    results
}
