//! The `Task` capability — a black box the engine invokes and interprets,
//! never inspects. Concrete implementations (HTTP callers, cloud-driver
//! clients, webhook invokers) live outside this workspace; `RunTask` only
//! ever sees this trait, resolved from a `TaskRegistry` by class name.

use async_trait::async_trait;
use stagecraft_shared::domain::{ContextMap, Stage, TaskStatus};
use std::time::Duration;

/// Outcome of one `execute` call.
#[derive(Debug, Clone, Default)]
pub struct TaskResult {
    pub status: TaskStatus,
    /// Merged into the stage's context on success.
    pub outputs: ContextMap,
    /// Merged into the *parent* execution's context on success, for tasks
    /// whose outputs other stages need to see.
    pub stage_outputs: ContextMap,
}

impl TaskResult {
    pub fn succeeded() -> Self {
        Self {
            status: TaskStatus::Succeeded,
            ..Default::default()
        }
    }

    pub fn running() -> Self {
        Self {
            status: TaskStatus::Running,
            ..Default::default()
        }
    }

    pub fn terminal() -> Self {
        Self {
            status: TaskStatus::Terminal,
            ..Default::default()
        }
    }

    pub fn with_outputs(mut self, outputs: ContextMap) -> Self {
        self.outputs = outputs;
        self
    }
}

#[async_trait]
pub trait Task: Send + Sync + std::fmt::Debug {
    async fn execute(&self, stage: &Stage) -> TaskResult;

    /// Exposes this task as a `RetryableTask` when it declares its own
    /// backoff/timeout. `RunTask` consults this instead of downcasting,
    /// since the registry only ever hands back `Arc<dyn Task>`.
    fn as_retryable(&self) -> Option<&dyn RetryableTask> {
        None
    }
}

/// Extension for tasks that declare their own retry cadence and timeout.
/// `RunTask` reads these when a task reports `Running` instead of settling
/// on a terminal status.
pub trait RetryableTask: Task {
    fn backoff_period(&self) -> Duration;

    /// `None` means no timeout is enforced.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}
