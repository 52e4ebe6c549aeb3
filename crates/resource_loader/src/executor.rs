//! Attempt loop for one resource operation.
//!
//! Each attempt races the kind's strategy against the timeout and the cancel
//! token. Failed attempts are retried after a delay while the error kind
//! allows it, and every state change is checked against the operation id.

use crate::error::LoadError;
use crate::kind::ResourceKind;
use crate::logging::{verbose, warning};
use crate::plan::LoadPlan;
use crate::state::{OperationId, StateTracker};
use crate::strategy::{LoadContext, LoadStrategy, Outcome, Payload, strategy_for};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::select;
use tokio::time::{sleep, timeout};

/// Everything one spawned resource operation owns.
pub struct Execution {
    pub plan: LoadPlan,
    pub id: OperationId,
    pub context: LoadContext,
    pub tracker: Arc<Mutex<StateTracker>>,
}

/// Lock the tracker, recovering from poisoning.
pub fn lock_tracker(tracker: &Mutex<StateTracker>) -> MutexGuard<'_, StateTracker> {
    tracker.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drive one operation to its final outcome and record it.
///
/// Updates are keyed by the operation id, so an operation that was cancelled
/// or unloaded while running leaves the tracker untouched.
pub async fn execute(execution: Execution) -> Outcome {
    let Execution {
        plan,
        id,
        context,
        tracker,
    } = execution;
    match run(&plan, id, &context, &tracker).await {
        Ok(payload) => {
            if !lock_tracker(&tracker).complete(&plan.key, id) {
                verbose!("Discarding result of cancelled load: {}", plan.final_url);
                return Err(LoadError::abort(&plan.final_url));
            }
            if let Some(on_success) = &context.options.on_success {
                on_success(&plan.key, &payload);
            }
            Ok(payload)
        }
        Err(error) => {
            let failed_element = context.cancel.take_element();
            lock_tracker(&tracker).settle(&plan.key, id, failed_element);
            verbose!("Giving up on {} after {error}", plan.final_url);
            Err(error)
        }
    }
}

async fn run(
    plan: &LoadPlan,
    id: OperationId,
    context: &LoadContext,
    tracker: &Mutex<StateTracker>,
) -> Outcome {
    let token = context.cancel.token().clone();
    let options = &context.options;
    let previous_failure = lock_tracker(tracker).take_failed_element(&plan.key, id);

    if plan.kind == ResourceKind::Script
        && options.defer_scripts_until_ready
        && !context.document.is_ready()
    {
        verbose!("Deferring script until the document is ready: {}", plan.final_url);
        select! {
            () = token.cancelled() => return Err(LoadError::abort(&plan.final_url)),
            () = context.document.ready() => {}
        }
    }

    // Elements of failed attempts never count as loaded.
    if plan.kind != ResourceKind::Unsupported
        && context
            .document
            .find_by_url(&plan.final_url)
            .into_iter()
            .any(|element| Some(element) != previous_failure)
    {
        verbose!("Resource already loaded: {}", plan.final_url);
        return Ok(Payload::None);
    }
    if let Some(element) = previous_failure {
        context.document.remove(element);
    }

    let strategy = strategy_for(plan.kind);
    let mut retries_used = 0_u32;
    loop {
        let error = match attempt_once(strategy, plan, context).await {
            Ok(payload) => return Ok(payload),
            Err(error) => error,
        };
        lock_tracker(tracker).fail(&plan.key, id);
        if let Some(on_error) = &options.on_error {
            on_error(&error, &plan.key);
        }
        if !error.kind().is_retryable() || retries_used >= options.retries {
            return Err(error);
        }
        retries_used = retries_used.saturating_add(1);
        warning!("Retrying to load resource: {}", plan.final_url);
        select! {
            () = token.cancelled() => return Err(LoadError::abort(&plan.final_url)),
            () = sleep(options.retry_delay) => {}
        }
        if !lock_tracker(tracker).retry(&plan.key, id) {
            return Err(LoadError::abort(&plan.final_url));
        }
        // The next attempt replaces whatever element this one left behind.
        if let Some(element) = context.cancel.take_element() {
            context.document.remove(element);
        }
    }
}

/// One attempt raced against the timeout and the cancel token. Losing the
/// race drops the attempt, which removes any element it injected.
async fn attempt_once(
    strategy: &dyn LoadStrategy,
    plan: &LoadPlan,
    context: &LoadContext,
) -> Outcome {
    let token = context.cancel.token();
    if token.is_cancelled() {
        return Err(LoadError::abort(&plan.final_url));
    }
    let attempt = strategy.load(plan, context);
    select! {
        biased;
        () = token.cancelled() => Err(LoadError::abort(&plan.final_url)),
        finished = timeout(context.options.timeout, attempt) => {
            if let Ok(outcome) = finished {
                outcome
            } else {
                warning!("Resource load aborted due to timeout: {}", plan.final_url);
                Err(LoadError::timeout(&plan.final_url))
            }
        }
    }
}
