//! Aggregate statistics reported to collaborators.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Run counters for one workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStats {
    pub executions: u64,
    pub successes: u64,
    pub failures: u64,
    pub retries: u64,
    /// `successes / executions`, or 0 before the first execution.
    pub success_rate: f64,
}

impl WorkflowStats {
    pub fn new(executions: u64, successes: u64, failures: u64, retries: u64) -> Self {
        let success_rate = if executions == 0 {
            0.0
        } else {
            successes as f64 / executions as f64
        };
        Self {
            executions,
            successes,
            failures,
            retries,
            success_rate,
        }
    }
}

/// Snapshot of the scheduler returned by [`Scheduler::stats`](crate::Scheduler::stats).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub queue_len: usize,
    pub queue_capacity: usize,
    /// Whether the processing loop is currently running.
    pub processing: bool,
    pub history_len: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub workflows: BTreeMap<String, WorkflowStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate_zero_without_executions() {
        let stats = WorkflowStats::new(0, 0, 0, 0);
        assert_eq!(stats.success_rate, 0.0);
    }

    #[test]
    fn test_success_rate_ratio() {
        let stats = WorkflowStats::new(4, 3, 1, 2);
        assert!((stats.success_rate - 0.75).abs() < f64::EPSILON);
    }
}
