//! Workflows: named handlers plus their run counters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::context::SchedulerCtx;
use crate::error::HandlerError;
use crate::stats::WorkflowStats;

/// The work behind a workflow: turns a task payload into a result.
#[async_trait]
pub trait WorkflowHandler: Send + Sync {
    /// Execute one task. Returning `Err` hands the task to the retry policy.
    async fn execute(&self, payload: Value, ctx: &SchedulerCtx) -> Result<Value, HandlerError>;
}

/// Adapter that lets an async closure act as a [`WorkflowHandler`].
///
/// The closure receives its own clone of the context so the returned future
/// can be `'static`.
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure as a handler.
///
/// ```rust
/// use taskloop_core::{handler_fn, HandlerError};
///
/// let echo = handler_fn(|payload, _ctx| async move { Ok::<_, HandlerError>(payload) });
/// # let _ = echo;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Value, SchedulerCtx) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> WorkflowHandler for FnHandler<F>
where
    F: Fn(Value, SchedulerCtx) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    async fn execute(&self, payload: Value, ctx: &SchedulerCtx) -> Result<Value, HandlerError> {
        (self.f)(payload, ctx.clone()).await
    }
}

/// A registered workflow.
///
/// `executions`, `successes` and `failures` only move when a task terminates,
/// so `successes + failures == executions` always holds. `retries` counts
/// intermediate failures that were re-queued.
pub struct Workflow {
    name: String,
    handler: Arc<dyn WorkflowHandler>,
    options: Value,
    registered_at: DateTime<Utc>,
    pub(crate) executions: u64,
    pub(crate) successes: u64,
    pub(crate) failures: u64,
    pub(crate) retries: u64,
}

impl Workflow {
    pub fn new(name: impl Into<String>, handler: Arc<dyn WorkflowHandler>, options: Value) -> Self {
        Self {
            name: name.into(),
            handler,
            options,
            registered_at: Utc::now(),
            executions: 0,
            successes: 0,
            failures: 0,
            retries: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &Value {
        &self.options
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    pub(crate) fn handler(&self) -> Arc<dyn WorkflowHandler> {
        Arc::clone(&self.handler)
    }

    pub(crate) fn record_success(&mut self) {
        self.executions += 1;
        self.successes += 1;
    }

    pub(crate) fn record_failure(&mut self) {
        self.executions += 1;
        self.failures += 1;
    }

    pub(crate) fn record_retry(&mut self) {
        self.retries += 1;
    }

    pub fn stats(&self) -> WorkflowStats {
        WorkflowStats::new(self.executions, self.successes, self.failures, self.retries)
    }
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("executions", &self.executions)
            .field("successes", &self.successes)
            .field("failures", &self.failures)
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}
