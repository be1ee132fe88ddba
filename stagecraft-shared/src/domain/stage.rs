//! Stage — a node in the execution DAG.

use super::context::ContextMap;
use super::ids::StageId;
use super::task::{Task, TaskStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStatus {
    NotStarted,
    Running,
    Succeeded,
    Terminal,
    Canceled,
    Stopped,
    Skipped,
    FailedContinue,
}

impl StageStatus {
    /// Requisite gating treats these two as "complete enough to unblock
    /// downstream stages".
    pub fn is_terminal_success(self) -> bool {
        matches!(self, StageStatus::Succeeded | StageStatus::FailedContinue)
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, StageStatus::NotStarted | StageStatus::Running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyntheticStageOwner {
    Before,
    After,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    /// Author-assigned id, unique per execution, used for `requisiteStageRefIds`.
    pub ref_id: String,
    pub stage_type: String,
    pub status: StageStatus,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
    pub tasks: Vec<Task>,
    pub parent_stage_id: Option<StageId>,
    pub synthetic_owner: Option<SyntheticStageOwner>,
    pub requisite_stage_ref_ids: Vec<String>,
    pub context: ContextMap,
    /// Set/cleared by `PauseStage`/`ResumeStage`.
    pub paused: bool,
    /// True for a `STAGE_BEFORE` child materialized from
    /// `StageDefinition::parallel_branches` — every sibling carrying this
    /// flag is started together rather than chained one after another.
    pub is_parallel_branch: bool,
    /// Set once `StartStage` has built this stage's task list and synthetic
    /// children, so a redelivered `StartStage` skips straight to the
    /// dispatch phase instead of rebuilding (and duplicating) them.
    pub materialized: bool,
}

impl Stage {
    pub fn new(ref_id: impl Into<String>, stage_type: impl Into<String>) -> Self {
        Self {
            id: StageId::new(),
            ref_id: ref_id.into(),
            stage_type: stage_type.into(),
            status: StageStatus::NotStarted,
            started_at: None,
            ended_at: None,
            tasks: Vec::new(),
            parent_stage_id: None,
            synthetic_owner: None,
            requisite_stage_ref_ids: Vec::new(),
            context: ContextMap::new(),
            paused: false,
            is_parallel_branch: false,
            materialized: false,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.parent_stage_id.is_some()
    }

    pub fn requires(mut self, ref_ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.requisite_stage_ref_ids = ref_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_context(mut self, context: ContextMap) -> Self {
        self.context = context;
        self
    }

    /// Deterministic id for a synthetic child: `"{parentId}-{ordinal}-{authorId}"`.
    pub fn synthetic_ref_id(parent_ref_id: &str, ordinal: usize, author_id: &str) -> String {
        format!("{parent_ref_id}-{ordinal}-{author_id}")
    }

    /// First task in ordinal order with `isStageStart`, if any has been
    /// materialized.
    pub fn stage_start_task(&self) -> Option<&Task> {
        self.tasks.iter().find(|t| t.is_stage_start)
    }

    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    /// Next task after `task_id` in ordinal order, used by `CompleteTask`
    /// next-step selection.
    pub fn next_task(&self, task_id: &str) -> Option<&Task> {
        let current = self.task(task_id)?.ordinal();
        self.tasks
            .iter()
            .filter(|t| t.ordinal() > current)
            .min_by_key(|t| t.ordinal())
    }

    /// The matching `isLoopStart` task for a given `isLoopEnd` task, i.e.
    /// the nearest loop-start at or before it in ordinal order.
    pub fn loop_start_for(&self, loop_end_task_id: &str) -> Option<&Task> {
        let end_ordinal = self.task(loop_end_task_id)?.ordinal();
        self.tasks
            .iter()
            .filter(|t| t.is_loop_start && t.ordinal() <= end_ordinal)
            .max_by_key(|t| t.ordinal())
    }

    /// Reopens a terminal stage for `RestartStage`: clears status, times,
    /// and the task list, and marks it unmaterialized so the next
    /// `StartStage` rebuilds synthetics and tasks from scratch.
    pub fn reset_for_restart(&mut self) {
        self.status = StageStatus::NotStarted;
        self.started_at = None;
        self.ended_at = None;
        self.tasks.clear();
        self.materialized = false;
    }

    /// Resets every task from `from_ordinal` (inclusive) forward to
    /// `NotStarted`, for rolling-push loop re-iteration.
    pub fn reset_tasks_from(&mut self, from_ordinal: u32) {
        for task in self.tasks.iter_mut().filter(|t| t.ordinal() >= from_ordinal) {
            task.status = TaskStatus::NotStarted;
            task.started_at = None;
            task.ended_at = None;
        }
    }
}
