//! Bounded FIFO queue of pending tasks.
//!
//! New tasks respect the capacity; retried tasks go back to the tail
//! regardless of it, since they were already admitted once.

use std::collections::VecDeque;

use crate::task::{Task, TaskId};

#[derive(Debug, Clone)]
pub struct TaskQueue {
    tasks: VecDeque<Task>,
    capacity: usize,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            tasks: VecDeque::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.tasks.len() >= self.capacity
    }

    /// Append a new task at the tail. Hands the task back if the queue is full.
    pub fn try_push(&mut self, task: Task) -> Result<(), Task> {
        if self.is_full() {
            return Err(task);
        }
        self.tasks.push_back(task);
        Ok(())
    }

    /// Re-append a retried task at the tail.
    pub fn push_retry(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    pub fn pop(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == *id)
    }

    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        let pos = self.tasks.iter().position(|t| t.id == *id)?;
        self.tasks.remove(pos)
    }

    /// Remove every task, in FIFO order.
    pub fn drain(&mut self) -> Vec<Task> {
        self.tasks.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fifo_order() {
        let mut queue = TaskQueue::new(10);
        let a = Task::new("w", json!(1));
        let b = Task::new("w", json!(2));
        let (a_id, b_id) = (a.id, b.id);
        queue.try_push(a).expect("push a");
        queue.try_push(b).expect("push b");
        assert_eq!(queue.pop().map(|t| t.id), Some(a_id));
        assert_eq!(queue.pop().map(|t| t.id), Some(b_id));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_capacity_rejects_new_but_not_retries() {
        let mut queue = TaskQueue::new(1);
        queue.try_push(Task::new("w", json!(1))).expect("first");
        let rejected = queue.try_push(Task::new("w", json!(2)));
        assert!(rejected.is_err());
        assert_eq!(queue.len(), 1);

        queue.push_retry(Task::new("w", json!(3)));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_remove_from_middle_keeps_order() {
        let mut queue = TaskQueue::new(10);
        let tasks: Vec<Task> = (0..3).map(|i| Task::new("w", json!(i))).collect();
        let ids: Vec<TaskId> = tasks.iter().map(|t| t.id).collect();
        for t in tasks {
            queue.try_push(t).expect("push");
        }
        assert!(queue.remove(&ids[1]).is_some());
        assert!(queue.remove(&ids[1]).is_none());
        let rest: Vec<TaskId> = queue.drain().into_iter().map(|t| t.id).collect();
        assert_eq!(rest, vec![ids[0], ids[2]]);
        assert!(queue.is_empty());
    }
}
