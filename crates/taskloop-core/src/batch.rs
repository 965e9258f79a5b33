//! Chunked batch submission on top of the scheduler.
//!
//! Items are enqueued one chunk at a time; the next chunk is only submitted
//! once every task of the current one has reached a terminal state. All
//! tasks still run on the single scheduler loop.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::SchedulerError;
use crate::scheduler::Scheduler;
use crate::task::{TaskId, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    /// Items per chunk. Zero is treated as one.
    pub batch_size: usize,
    /// Intended fan-out. Accepted for API compatibility; execution stays sequential.
    pub parallelism: usize,
    /// How often to check whether the current chunk has finished.
    pub poll_interval: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 50,
            parallelism: 1,
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl BatchOptions {
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// A successfully processed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItemResult {
    /// Position of the item in the submitted list.
    pub index: usize,
    pub task_id: TaskId,
    pub result: Value,
}

/// An item that did not complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItemFailure {
    pub index: usize,
    /// `None` when the item could not even be enqueued.
    pub task_id: Option<TaskId>,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: Vec<BatchItemResult>,
    pub failures: Vec<BatchItemFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.results.len() + self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl Scheduler {
    /// Run `items` through `workflow` in chunks of `options.batch_size`.
    ///
    /// Fails up front if the workflow is unknown. Per-item enqueue errors
    /// (such as a full queue) are reported as failures for that item.
    #[tracing::instrument(skip(self, items, options), fields(item_count = items.len()))]
    pub async fn batch_process(
        &self,
        workflow: &str,
        items: Vec<Value>,
        options: BatchOptions,
    ) -> Result<BatchReport, SchedulerError> {
        if !self.has_workflow(workflow) {
            return Err(SchedulerError::UnknownWorkflow(workflow.to_string()));
        }
        if options.parallelism > 1 {
            debug!(
                parallelism = options.parallelism,
                "Parallelism requested; tasks still execute one at a time"
            );
        }

        let batch_size = options.batch_size.max(1);
        let chunks = items.len().div_ceil(batch_size);
        let mut remaining = items.into_iter().enumerate();
        let mut report = BatchReport::default();

        for chunk in 1..=chunks {
            let mut pending: Vec<(usize, TaskId)> = Vec::with_capacity(batch_size);
            for (index, item) in remaining.by_ref().take(batch_size) {
                match self.enqueue(workflow, item) {
                    Ok(id) => pending.push((index, id)),
                    Err(e) => {
                        warn!(index, error = %e, "Batch item could not be enqueued");
                        report.failures.push(BatchItemFailure {
                            index,
                            task_id: None,
                            error: e.to_string(),
                        });
                    }
                }
            }

            self.wait_for_terminal(&pending, options.poll_interval).await;
            self.collect_outcomes(&pending, &mut report);
            info!(
                chunk,
                chunks,
                completed = report.results.len(),
                failed = report.failures.len(),
                "Batch chunk finished"
            );
        }
        Ok(report)
    }

    fn has_workflow(&self, name: &str) -> bool {
        self.workflow_stats(name).is_some()
    }

    async fn wait_for_terminal(&self, pending: &[(usize, TaskId)], poll_interval: Duration) {
        loop {
            let done = pending.iter().all(|(_, id)| {
                self.status(*id)
                    .map_or(true, |task| task.status.is_terminal())
            });
            // A shut-down loop will never pick the rest up.
            if done || (self.is_shut_down() && self.is_idle()) {
                return;
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    fn collect_outcomes(&self, pending: &[(usize, TaskId)], report: &mut BatchReport) {
        for &(index, task_id) in pending {
            let failure = |error: String| BatchItemFailure {
                index,
                task_id: Some(task_id),
                error,
            };
            match self.status(task_id) {
                Some(task) => match task.status {
                    TaskStatus::Completed => report.results.push(BatchItemResult {
                        index,
                        task_id,
                        result: task.result.unwrap_or(Value::Null),
                    }),
                    TaskStatus::Failed => report.failures.push(failure(
                        task.last_error.unwrap_or_else(|| "task failed".to_string()),
                    )),
                    TaskStatus::Cancelled => {
                        report.failures.push(failure("task was cancelled".to_string()))
                    }
                    status => report.failures.push(failure(format!(
                        "scheduler shut down while task was {status}"
                    ))),
                },
                None => report
                    .failures
                    .push(failure("task evicted from history".to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = BatchOptions::default();
        assert_eq!(options.batch_size, 50);
        assert_eq!(options.parallelism, 1);
        assert_eq!(options.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_report_totals() {
        let report = BatchReport {
            results: vec![BatchItemResult {
                index: 0,
                task_id: TaskId::new(),
                result: Value::Null,
            }],
            failures: vec![BatchItemFailure {
                index: 1,
                task_id: None,
                error: "Queue is full (capacity 1)".into(),
            }],
        };
        assert_eq!(report.total(), 2);
        assert!(!report.is_success());
    }
}
