//! Append-only record of terminal tasks.
//!
//! Unbounded unless a capacity is configured, in which case the oldest
//! entries are evicted first.

use std::collections::{HashMap, VecDeque};

use crate::task::{Task, TaskId, TaskStatus};

#[derive(Debug, Clone, Default)]
pub struct History {
    entries: HashMap<TaskId, Task>,
    order: VecDeque<TaskId>,
    capacity: Option<usize>,
}

impl History {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    /// Record a terminal task. Returns the evicted task, if the capacity was hit.
    pub fn record(&mut self, task: Task) -> Option<Task> {
        debug_assert!(task.is_terminal(), "only terminal tasks belong in history");
        self.order.push_back(task.id);
        self.entries.insert(task.id, task);
        match self.capacity {
            Some(cap) if self.order.len() > cap => self
                .order
                .pop_front()
                .and_then(|oldest| self.entries.remove(&oldest)),
            _ => None,
        }
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Terminal tasks in the order they were recorded.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.entries.values().filter(|t| t.status == status).count()
    }
}
