//! Name-keyed registry of workflows.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::workflow::{Workflow, WorkflowHandler};

#[derive(Debug, Default)]
pub struct WorkflowRegistry {
    workflows: HashMap<String, Workflow>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a workflow under `name`.
    ///
    /// Re-registering a name replaces its handler and options and resets its
    /// counters. Returns `true` when an existing entry was replaced.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn WorkflowHandler>,
        options: Value,
    ) -> bool {
        let name = name.into();
        let workflow = Workflow::new(name.clone(), handler, options);
        self.workflows.insert(name, workflow).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Workflow> {
        self.workflows.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Workflow> {
        self.workflows.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.workflows.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Workflow> {
        self.workflows.values()
    }
}
