use std::time::Duration;
use thiserror::Error;

/// Errors reported synchronously to callers of the scheduler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The workflow name has never been registered.
    #[error("Unknown workflow: {0}")]
    UnknownWorkflow(String),
    /// The queue already holds `capacity` tasks.
    #[error("Queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },
    /// The scheduler has been shut down and accepts no more work.
    #[error("Scheduler has been shut down")]
    ShutDown,
    /// Neither the scheduler's construction nor the enqueuing caller had a
    /// tokio runtime to host the loop.
    #[error("No tokio runtime available to start the scheduler loop")]
    NoRuntime,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A failure raised while a workflow handler runs.
///
/// These never reach the enqueuing caller; the loop turns them into a retry
/// or a terminal `failed` status and keeps the message on the task.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),
    /// The handler panicked; the payload message is kept when it is a string.
    #[error("Handler panicked: {0}")]
    Panicked(String),
    #[error("Handler timed out after {0:?}")]
    TimedOut(Duration),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        HandlerError::Failed(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        HandlerError::Failed(message.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        HandlerError::Failed(format!("serialization error: {e}"))
    }
}
