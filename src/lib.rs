//! # Taskloop - a workflow task scheduler in Rust
//!
//! Register named workflows once, enqueue tasks against them, and let a single
//! ordered loop execute them with bounded retry and backoff.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! taskloop = "0.3"
//! ```
//!
//! ```rust
//! use taskloop::{HandlerError, Scheduler, SchedulerConfig};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), taskloop::SchedulerError> {
//! taskloop::init();
//! let scheduler = Scheduler::new(SchedulerConfig::default().with_max_retry_attempts(2))?;
//! scheduler.register_fn("echo", |payload, _ctx| async move { Ok::<_, HandlerError>(payload) });
//! scheduler.enqueue("echo", json!({"x": 1}))?;
//! scheduler.wait_idle().await;
//! # Ok(())
//! # }
//! ```

use tracing_subscriber::EnvFilter;

/// Initialize logging with default settings.
///
/// Installs a `tracing` fmt subscriber filtered by `RUST_LOG`, falling back to `info`.
/// Calling it more than once is harmless.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

// Re-export the core crate
pub use taskloop_core as core;

pub use taskloop_core::{
    handler_fn, BackoffStrategy, BatchOptions, BatchReport, HandlerError, QueueStats, Scheduler,
    SchedulerConfig, SchedulerCtx, SchedulerError, Task, TaskEvent, TaskId, TaskStatus,
    WorkflowHandler, WorkflowStats,
};
