//! Notifications emitted by the scheduler loop.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::task::{Task, TaskId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// The handler returned a result; the task is now in history.
    Completed(Task),
    /// The handler failed and the task went back to the queue tail.
    Retrying {
        task_id: TaskId,
        workflow: String,
        attempt: u32,
        error: String,
        backoff: Duration,
    },
    /// Retries were exhausted; the task is now in history.
    Failed(Task),
    Cancelled { task_id: TaskId },
}

impl TaskEvent {
    pub fn task_id(&self) -> TaskId {
        match self {
            TaskEvent::Completed(task) | TaskEvent::Failed(task) => task.id,
            TaskEvent::Retrying { task_id, .. } | TaskEvent::Cancelled { task_id } => *task_id,
        }
    }
}
