//! The scheduler handle and its single processing loop.
//!
//! All shared state (registry, queue, in-flight snapshot, history and the
//! running flag) sits behind one mutex. The loop only holds it between
//! suspension points, never across a handler call or a sleep. "Start the
//! loop if idle" is checked and flipped under that same lock, so at most one
//! loop runs at a time.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::context::SchedulerCtx;
use crate::error::{HandlerError, SchedulerError};
use crate::event::TaskEvent;
use crate::history::History;
use crate::queue::TaskQueue;
use crate::registry::WorkflowRegistry;
use crate::retry::RetryPolicy;
use crate::stats::{QueueStats, WorkflowStats};
use crate::task::{Task, TaskId, TaskStatus};
use crate::workflow::{handler_fn, WorkflowHandler};

type Services = Arc<dyn Any + Send + Sync>;

/// Cloneable handle to a workflow task scheduler.
///
/// # Example
///
/// ```rust
/// use taskloop_core::{HandlerError, Scheduler, SchedulerConfig, TaskStatus};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let scheduler = Scheduler::new(SchedulerConfig::default())?;
/// scheduler.register_fn("echo", |payload, _ctx| async move { Ok::<_, HandlerError>(payload) });
///
/// let id = scheduler.enqueue("echo", json!({"x": 1}))?;
/// scheduler.wait_idle().await;
///
/// let task = scheduler.status(id).expect("task is in history");
/// assert_eq!(task.status, TaskStatus::Completed);
/// assert_eq!(task.result, Some(json!({"x": 1})));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    config: SchedulerConfig,
    retry: RetryPolicy,
    state: Mutex<State>,
    events: broadcast::Sender<TaskEvent>,
    idle: watch::Sender<bool>,
    shutdown: CancellationToken,
    services: Option<Services>,
    /// Runtime the scheduler was created on; the loop is spawned onto it.
    runtime: Option<Handle>,
}

struct State {
    registry: WorkflowRegistry,
    queue: TaskQueue,
    /// Snapshot of the task whose handler is running, if any.
    current: Option<Task>,
    history: History,
    running: bool,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: TaskEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl Scheduler {
    /// Create a scheduler after validating `config`.
    ///
    /// When called inside a tokio runtime, that runtime hosts the loop and
    /// `enqueue` works from any thread, including ones outside tokio.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate()?;
        Ok(Self::build(config, None))
    }

    /// Create a scheduler whose handlers can reach `services` through
    /// [`SchedulerCtx::services`].
    pub fn with_services<T>(config: SchedulerConfig, services: T) -> Result<Self, SchedulerError>
    where
        T: Any + Send + Sync,
    {
        config.validate()?;
        Ok(Self::build(config, Some(Arc::new(services))))
    }

    fn build(config: SchedulerConfig, services: Option<Services>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        let (idle, _) = watch::channel(true);
        let state = State {
            registry: WorkflowRegistry::new(),
            queue: TaskQueue::new(config.max_queue_size),
            current: None,
            history: History::new(config.history_capacity),
            running: false,
        };
        Self {
            inner: Arc::new(Inner {
                retry: config.retry_policy(),
                config,
                state: Mutex::new(state),
                events,
                idle,
                shutdown: CancellationToken::new(),
                services,
                runtime: Handle::try_current().ok(),
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    pub(crate) fn services<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.inner.services.as_deref()?.downcast_ref::<T>()
    }

    /// Register a workflow handler under `name`.
    ///
    /// Replacing an existing name resets its statistics. Returns `true` when a
    /// previous registration was replaced.
    pub fn register_workflow<H>(&self, name: &str, handler: H, options: Value) -> bool
    where
        H: WorkflowHandler + 'static,
    {
        let replaced = self
            .inner
            .lock()
            .registry
            .register(name, Arc::new(handler), options);
        if replaced {
            info!(workflow = %name, "Workflow re-registered, statistics reset");
        } else {
            info!(workflow = %name, "Workflow registered");
        }
        replaced
    }

    /// Register an async closure as a workflow with no options.
    pub fn register_fn<F, Fut>(&self, name: &str, f: F) -> bool
    where
        F: Fn(Value, SchedulerCtx) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        self.register_workflow(name, handler_fn(f), Value::Null)
    }

    /// Queue a task for `workflow` and start the loop if it is idle.
    ///
    /// Never blocks. Fails without touching the queue when the workflow is
    /// unknown or the queue is at capacity.
    pub fn enqueue(&self, workflow: &str, payload: Value) -> Result<TaskId, SchedulerError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(SchedulerError::ShutDown);
        }
        let mut state = self.inner.lock();
        if !state.registry.contains(workflow) {
            return Err(SchedulerError::UnknownWorkflow(workflow.to_string()));
        }
        let capacity = state.queue.capacity();
        if state.queue.is_full() {
            return Err(SchedulerError::QueueFull { capacity });
        }
        // Resolved whether or not the loop is running, so the outcome does not
        // depend on timing.
        let runtime = self.runtime()?;

        let task = Task::new(workflow, payload);
        let id = task.id;
        state
            .queue
            .try_push(task)
            .map_err(|_| SchedulerError::QueueFull { capacity })?;
        debug!(task_id = %id, workflow = %workflow, queue_len = state.queue.len(), "Task queued");

        if !state.running {
            state.running = true;
            self.inner.idle.send_replace(false);
            drop(state);
            let scheduler = self.clone();
            runtime.spawn(async move { scheduler.run_loop().await });
        }
        Ok(id)
    }

    fn runtime(&self) -> Result<Handle, SchedulerError> {
        match &self.inner.runtime {
            Some(handle) => Ok(handle.clone()),
            None => Handle::try_current().map_err(|_| SchedulerError::NoRuntime),
        }
    }

    /// Cancel a task that is still waiting in the queue.
    ///
    /// Returns `false` for tasks that are executing, already terminal or unknown.
    pub fn cancel(&self, id: TaskId) -> bool {
        let mut state = self.inner.lock();
        let Some(mut task) = state.queue.remove(&id) else {
            return false;
        };
        task.mark_cancelled();
        state.history.record(task);
        drop(state);
        info!(task_id = %id, "Task cancelled");
        self.inner.emit(TaskEvent::Cancelled { task_id: id });
        true
    }

    /// Cancel every queued task in one sweep. Returns how many were cancelled.
    pub fn clear_queue(&self) -> usize {
        let mut state = self.inner.lock();
        let drained = state.queue.drain();
        let ids: Vec<TaskId> = drained.iter().map(|t| t.id).collect();
        for mut task in drained {
            task.mark_cancelled();
            state.history.record(task);
        }
        drop(state);
        info!(count = ids.len(), "Queue cleared");
        for task_id in &ids {
            self.inner.emit(TaskEvent::Cancelled { task_id: *task_id });
        }
        ids.len()
    }

    /// Look a task up in the queue, then in flight, then in history.
    pub fn status(&self, id: TaskId) -> Option<Task> {
        let state = self.inner.lock();
        state
            .queue
            .get(&id)
            .or_else(|| state.current.as_ref().filter(|t| t.id == id))
            .or_else(|| state.history.get(&id))
            .cloned()
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.inner.lock();
        QueueStats {
            queue_len: state.queue.len(),
            queue_capacity: state.queue.capacity(),
            processing: state.running,
            history_len: state.history.len(),
            completed: state.history.count(TaskStatus::Completed),
            failed: state.history.count(TaskStatus::Failed),
            cancelled: state.history.count(TaskStatus::Cancelled),
            workflows: state
                .registry
                .iter()
                .map(|wf| (wf.name().to_string(), wf.stats()))
                .collect(),
        }
    }

    pub fn workflow_stats(&self, name: &str) -> Option<WorkflowStats> {
        self.inner.lock().registry.get(name).map(|wf| wf.stats())
    }

    pub fn workflow_options(&self, name: &str) -> Option<Value> {
        self.inner
            .lock()
            .registry
            .get(name)
            .map(|wf| wf.options().clone())
    }

    pub fn workflow_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .lock()
            .registry
            .iter()
            .map(|wf| wf.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Tasks waiting in the queue, head first.
    pub fn queued_tasks(&self) -> Vec<Task> {
        self.inner.lock().queue.iter().cloned().collect()
    }

    /// Terminal tasks in the order they finished, optionally filtered by status.
    pub fn history(&self, filter: Option<TaskStatus>) -> Vec<Task> {
        self.inner
            .lock()
            .history
            .iter()
            .filter(|t| filter.map_or(true, |status| t.status == status))
            .cloned()
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.inner.events.subscribe()
    }

    /// Task events as a stream. Events missed by a lagging consumer are skipped.
    pub fn events(&self) -> impl Stream<Item = TaskEvent> {
        BroadcastStream::new(self.subscribe()).filter_map(|event| event.ok())
    }

    pub fn is_idle(&self) -> bool {
        !self.inner.lock().running
    }

    /// Wait until the loop has gone idle: the queue drained, or the scheduler shut down.
    pub async fn wait_idle(&self) {
        let mut idle = self.inner.idle.subscribe();
        let _ = idle.wait_for(|idle| *idle).await;
    }

    /// Stop accepting work and let the loop exit after the task in flight.
    ///
    /// Queued tasks stay in the queue and can still be inspected or cancelled.
    pub fn shutdown(&self) {
        info!("Scheduler shutting down");
        self.inner.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    #[tracing::instrument(skip(self), name = "scheduler_loop")]
    async fn run_loop(self) {
        info!("Scheduler loop started");
        let pacing = self.inner.config.pacing_delay();
        while let Some((task, handler)) = self.next_task() {
            let ctx = SchedulerCtx::new(
                self.clone(),
                task.id,
                task.workflow.clone(),
                task.attempts,
            );
            let outcome = match handler {
                Some(handler) => self.invoke(handler, task.payload.clone(), &ctx).await,
                None => Err(HandlerError::failed(format!(
                    "workflow '{}' is not registered",
                    task.workflow
                ))),
            };
            let backoff = self.settle(task, outcome);

            if let Some(delay) = pacing {
                self.pause(delay).await;
            }
            if let Some(delay) = backoff {
                self.pause(delay).await;
            }
        }
        info!("Scheduler loop idle");
    }

    /// Pop the head task and mark it in flight, or flip the loop to idle.
    fn next_task(&self) -> Option<(Task, Option<Arc<dyn WorkflowHandler>>)> {
        let mut state = self.inner.lock();
        let next = if self.inner.shutdown.is_cancelled() {
            None
        } else {
            state.queue.pop()
        };
        let Some(mut task) = next else {
            state.running = false;
            self.inner.idle.send_replace(true);
            return None;
        };
        task.mark_processing();
        let handler = state.registry.get(&task.workflow).map(|wf| wf.handler());
        state.current = Some(task.clone());
        debug!(task_id = %task.id, workflow = %task.workflow, attempt = task.attempts, "Task started");
        Some((task, handler))
    }

    async fn invoke(
        &self,
        handler: Arc<dyn WorkflowHandler>,
        payload: Value,
        ctx: &SchedulerCtx,
    ) -> Result<Value, HandlerError> {
        let run = AssertUnwindSafe(handler.execute(payload, ctx)).catch_unwind();
        let caught = match self.inner.config.handler_timeout() {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(caught) => caught,
                Err(_) => return Err(HandlerError::TimedOut(limit)),
            },
            None => run.await,
        };
        caught.unwrap_or_else(|panic| {
            let message = panic_message(panic.as_ref());
            error!(task_id = %ctx.task_id(), workflow = %ctx.workflow(), panic = %message, "Handler panicked");
            Err(HandlerError::Panicked(message))
        })
    }

    /// Record the outcome of an execution. Returns the backoff to wait when
    /// the task was re-queued.
    fn settle(&self, mut task: Task, outcome: Result<Value, HandlerError>) -> Option<Duration> {
        let mut state = self.inner.lock();
        state.current = None;
        let (event, backoff) = match outcome {
            Ok(result) => {
                task.mark_completed(result);
                if let Some(wf) = state.registry.get_mut(&task.workflow) {
                    wf.record_success();
                }
                debug!(task_id = %task.id, workflow = %task.workflow, "Task completed");
                archive(&mut state.history, task.clone());
                (TaskEvent::Completed(task), None)
            }
            Err(e) if self.inner.retry.should_retry(task.attempts) => {
                task.mark_retry(e.to_string());
                let backoff = self.inner.retry.backoff_duration(task.attempts);
                if let Some(wf) = state.registry.get_mut(&task.workflow) {
                    wf.record_retry();
                }
                warn!(
                    task_id = %task.id,
                    workflow = %task.workflow,
                    attempt = task.attempts,
                    backoff = ?backoff,
                    error = %e,
                    "Task failed, retrying"
                );
                let event = TaskEvent::Retrying {
                    task_id: task.id,
                    workflow: task.workflow.clone(),
                    attempt: task.attempts,
                    error: e.to_string(),
                    backoff,
                };
                state.queue.push_retry(task);
                (event, Some(backoff))
            }
            Err(e) => {
                task.mark_failed(e.to_string());
                if let Some(wf) = state.registry.get_mut(&task.workflow) {
                    wf.record_failure();
                }
                warn!(
                    task_id = %task.id,
                    workflow = %task.workflow,
                    attempts = task.attempts,
                    error = %e,
                    "Task failed permanently"
                );
                archive(&mut state.history, task.clone());
                (TaskEvent::Failed(task), None)
            }
        };
        drop(state);
        self.inner.emit(event);
        backoff
    }

    /// Sleep unless the scheduler is shut down first.
    async fn pause(&self, delay: Duration) {
        tokio::select! {
            _ = self.inner.shutdown.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

fn archive(history: &mut History, task: Task) {
    if let Some(evicted) = history.record(task) {
        debug!(task_id = %evicted.id, "History full, evicted oldest task");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.inner.config)
            .field("shut_down", &self.inner.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}
