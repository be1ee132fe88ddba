//! Task — the leaf unit of work inside a stage.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TaskStatus {
    #[default]
    NotStarted,
    Running,
    Succeeded,
    Terminal,
    Redirect,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Terminal)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Per-stage ordinal id, e.g. "1", "2", ... Ordered lexically by the
    /// numeric value, never reused within a stage.
    pub id: String,
    pub name: String,
    /// Opaque, registry-resolved implementation class name.
    pub implementing_class: String,
    pub status: TaskStatus,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
    pub is_stage_start: bool,
    pub is_stage_end: bool,
    pub is_loop_start: bool,
    pub is_loop_end: bool,
}

impl Task {
    pub fn new(id: impl Into<String>, name: impl Into<String>, implementing_class: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            implementing_class: implementing_class.into(),
            status: TaskStatus::NotStarted,
            started_at: None,
            ended_at: None,
            is_stage_start: false,
            is_stage_end: false,
            is_loop_start: false,
            is_loop_end: false,
        }
    }

    pub fn stage_start(mut self) -> Self {
        self.is_stage_start = true;
        self
    }

    pub fn stage_end(mut self) -> Self {
        self.is_stage_end = true;
        self
    }

    pub fn loop_start(mut self) -> Self {
        self.is_loop_start = true;
        self
    }

    pub fn loop_end(mut self) -> Self {
        self.is_loop_end = true;
        self
    }

    /// Ordinal comparison key, since ids are numeric strings ("1" < "2" <
    /// "10").
    pub fn ordinal(&self) -> u32 {
        self.id.parse().unwrap_or(u32::MAX)
    }
}
