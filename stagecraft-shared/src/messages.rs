//! The message envelope that flows over the `Queue`.
//!
//! Internally tagged, grouping every operation the handler dispatch loop
//! understands under one type. Every variant here is plain data (no response
//! channel), since delivery happens through the `Queue` trait, not an
//! in-process oneshot.

use crate::domain::{ExecutionId, ExecutionType, StageId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineMessage {
    StartExecution {
        execution_type: ExecutionType,
        execution_id: ExecutionId,
    },
    StartStage {
        execution_type: ExecutionType,
        execution_id: ExecutionId,
        stage_id: StageId,
    },
    StartTask {
        execution_type: ExecutionType,
        execution_id: ExecutionId,
        stage_id: StageId,
        task_id: String,
    },
    RunTask {
        execution_type: ExecutionType,
        execution_id: ExecutionId,
        stage_id: StageId,
        task_id: String,
    },
    CompleteTask {
        execution_type: ExecutionType,
        execution_id: ExecutionId,
        stage_id: StageId,
        task_id: String,
        status: crate::domain::TaskStatus,
    },
    CompleteStage {
        execution_type: ExecutionType,
        execution_id: ExecutionId,
        stage_id: StageId,
        status: crate::domain::StageStatus,
    },
    CompleteExecution {
        execution_type: ExecutionType,
        execution_id: ExecutionId,
        status: crate::domain::ExecutionStatus,
    },
    PauseStage {
        execution_type: ExecutionType,
        execution_id: ExecutionId,
        stage_id: StageId,
    },
    ResumeStage {
        execution_type: ExecutionType,
        execution_id: ExecutionId,
        stage_id: StageId,
    },
    PauseExecution {
        execution_type: ExecutionType,
        execution_id: ExecutionId,
    },
    ResumeExecution {
        execution_type: ExecutionType,
        execution_id: ExecutionId,
    },
    CancelExecution {
        execution_type: ExecutionType,
        execution_id: ExecutionId,
    },
    CancelStage {
        execution_type: ExecutionType,
        execution_id: ExecutionId,
        stage_id: StageId,
    },
    RestartStage {
        execution_type: ExecutionType,
        execution_id: ExecutionId,
        stage_id: StageId,
    },
    InvalidExecutionId {
        execution_type: ExecutionType,
        execution_id: ExecutionId,
    },
    InvalidStageId {
        execution_type: ExecutionType,
        execution_id: ExecutionId,
        stage_id: StageId,
    },
    InvalidTaskType {
        execution_type: ExecutionType,
        execution_id: ExecutionId,
        stage_id: StageId,
        task_id: String,
        class_name: String,
    },
}

impl EngineMessage {
    pub fn execution_id(&self) -> ExecutionId {
        match self {
            EngineMessage::StartExecution { execution_id, .. }
            | EngineMessage::StartStage { execution_id, .. }
            | EngineMessage::StartTask { execution_id, .. }
            | EngineMessage::RunTask { execution_id, .. }
            | EngineMessage::CompleteTask { execution_id, .. }
            | EngineMessage::CompleteStage { execution_id, .. }
            | EngineMessage::CompleteExecution { execution_id, .. }
            | EngineMessage::PauseStage { execution_id, .. }
            | EngineMessage::ResumeStage { execution_id, .. }
            | EngineMessage::PauseExecution { execution_id, .. }
            | EngineMessage::ResumeExecution { execution_id, .. }
            | EngineMessage::CancelExecution { execution_id, .. }
            | EngineMessage::CancelStage { execution_id, .. }
            | EngineMessage::RestartStage { execution_id, .. }
            | EngineMessage::InvalidExecutionId { execution_id, .. }
            | EngineMessage::InvalidStageId { execution_id, .. }
            | EngineMessage::InvalidTaskType { execution_id, .. } => *execution_id,
        }
    }

    /// Short tag used in tracing spans and log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineMessage::StartExecution { .. } => "StartExecution",
            EngineMessage::StartStage { .. } => "StartStage",
            EngineMessage::StartTask { .. } => "StartTask",
            EngineMessage::RunTask { .. } => "RunTask",
            EngineMessage::CompleteTask { .. } => "CompleteTask",
            EngineMessage::CompleteStage { .. } => "CompleteStage",
            EngineMessage::CompleteExecution { .. } => "CompleteExecution",
            EngineMessage::PauseStage { .. } => "PauseStage",
            EngineMessage::ResumeStage { .. } => "ResumeStage",
            EngineMessage::PauseExecution { .. } => "PauseExecution",
            EngineMessage::ResumeExecution { .. } => "ResumeExecution",
            EngineMessage::CancelExecution { .. } => "CancelExecution",
            EngineMessage::CancelStage { .. } => "CancelStage",
            EngineMessage::RestartStage { .. } => "RestartStage",
            EngineMessage::InvalidExecutionId { .. } => "InvalidExecutionId",
            EngineMessage::InvalidStageId { .. } => "InvalidStageId",
            EngineMessage::InvalidTaskType { .. } => "InvalidTaskType",
        }
    }
}
