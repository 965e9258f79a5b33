use std::any::Any;

use serde_json::Value;

use crate::error::SchedulerError;
use crate::scheduler::Scheduler;
use crate::task::TaskId;

/// Context handed to a workflow handler for the task it is executing.
///
/// Gives access to the scheduler (to enqueue follow-up work) and to the
/// shared services the scheduler was built with.
#[derive(Clone, Debug)]
pub struct SchedulerCtx {
    scheduler: Scheduler,
    task_id: TaskId,
    workflow: String,
    attempt: u32,
}

impl SchedulerCtx {
    pub(crate) fn new(scheduler: Scheduler, task_id: TaskId, workflow: String, attempt: u32) -> Self {
        Self {
            scheduler,
            task_id,
            workflow,
            attempt,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn workflow(&self) -> &str {
        &self.workflow
    }

    /// Retries performed before this execution (0 on the first run).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn enqueue(&self, workflow: &str, payload: Value) -> Result<TaskId, SchedulerError> {
        self.scheduler.enqueue(workflow, payload)
    }

    /// Shared services registered with [`Scheduler::with_services`], if they are a `T`.
    pub fn services<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.scheduler.services()
    }
}
