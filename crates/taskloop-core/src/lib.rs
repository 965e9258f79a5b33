pub mod batch;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod history;
pub mod queue;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod stats;
pub mod task;
pub mod workflow;

pub use batch::{BatchItemFailure, BatchItemResult, BatchOptions, BatchReport};
pub use config::SchedulerConfig;
pub use context::SchedulerCtx;
pub use error::{HandlerError, SchedulerError};
pub use event::TaskEvent;
pub use retry::{BackoffStrategy, RetryPolicy};
pub use scheduler::Scheduler;
pub use stats::{QueueStats, WorkflowStats};
pub use task::{Task, TaskId, TaskStatus};
pub use workflow::{handler_fn, FnHandler, Workflow, WorkflowHandler};
