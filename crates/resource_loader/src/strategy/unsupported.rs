//! Fallback for extensions without a strategy.

use super::{LoadContext, LoadStrategy, Outcome};
use crate::error::LoadError;
use crate::logging::warning;
use crate::plan::LoadPlan;
use futures::FutureExt as _;
use futures::future::BoxFuture;

/// Rejects without touching the document or the network.
pub struct UnsupportedStrategy;

impl LoadStrategy for UnsupportedStrategy {
    fn load(&self, plan: &LoadPlan, _context: &LoadContext) -> BoxFuture<'static, Outcome> {
        warning!("Failed to load unsupported file type: {}", plan.final_url);
        let error = LoadError::unsupported(&plan.extension, &plan.final_url);
        async move { Err(error) }.boxed()
    }
}
