//! Registry resolving a task's `implementingClass` string to a concrete
//! `Task`, plus the built-in implementations the end-to-end scenarios run
//! against. Mirrors the stage-definition registry: a closed capability set
//! keyed by string tag rather than a type switch in the handler.

use crate::task::{Task, TaskResult};
use async_trait::async_trait;
use stagecraft_shared::domain::Stage;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Arc<dyn Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, implementing_class: impl Into<String>, task: Arc<dyn Task>) {
        self.tasks.insert(implementing_class.into(), task);
    }

    pub fn resolve(&self, implementing_class: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(implementing_class).cloned()
    }

    /// A registry preloaded with the task implementations the built-in
    /// stage types resolve against.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("DummyTask", Arc::new(DummyTask));
        registry.register("WaitForTimeWindowTask", Arc::new(DummyTask));
        registry
    }
}

/// Succeeds immediately with no outputs. Stands in for the unspecified
/// concrete task implementations the engine never binds to.
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyTask;

#[async_trait]
impl Task for DummyTask {
    async fn execute(&self, _stage: &Stage) -> TaskResult {
        TaskResult::succeeded()
    }
}
