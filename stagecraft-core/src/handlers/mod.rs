//! Message dispatch: routes a popped `EngineMessage` to its handler.

pub mod execution;
pub mod invalid;
pub mod stage;
pub mod support;
pub mod task;

use crate::context::EngineContext;
use stagecraft_shared::error::EngineResult;
use stagecraft_shared::messages::EngineMessage;

pub async fn dispatch(ctx: &EngineContext, message: EngineMessage) -> EngineResult<()> {
    match message {
        EngineMessage::StartExecution { execution_type, execution_id } => {
            execution::start_execution(ctx, execution_type, execution_id).await
        }
        EngineMessage::StartStage { execution_type, execution_id, stage_id } => {
            stage::start_stage(ctx, execution_type, execution_id, stage_id).await
        }
        EngineMessage::StartTask { execution_type, execution_id, stage_id, task_id } => {
            task::start_task(ctx, execution_type, execution_id, stage_id, task_id).await
        }
        EngineMessage::RunTask { execution_type, execution_id, stage_id, task_id } => {
            task::run_task(ctx, execution_type, execution_id, stage_id, task_id).await
        }
        EngineMessage::CompleteTask { execution_type, execution_id, stage_id, task_id, status } => {
            task::complete_task(ctx, execution_type, execution_id, stage_id, task_id, status).await
        }
        EngineMessage::CompleteStage { execution_type, execution_id, stage_id, status } => {
            stage::complete_stage(ctx, execution_type, execution_id, stage_id, status).await
        }
        EngineMessage::CompleteExecution { execution_type, execution_id, status } => {
            execution::complete_execution(ctx, execution_type, execution_id, status).await
        }
        EngineMessage::PauseStage { execution_type, execution_id, stage_id } => {
            stage::pause_stage(ctx, execution_type, execution_id, stage_id).await
        }
        EngineMessage::ResumeStage { execution_type, execution_id, stage_id } => {
            stage::resume_stage(ctx, execution_type, execution_id, stage_id).await
        }
        EngineMessage::PauseExecution { execution_type, execution_id } => {
            execution::pause_execution(ctx, execution_type, execution_id).await
        }
        EngineMessage::ResumeExecution { execution_type, execution_id } => {
            execution::resume_execution(ctx, execution_type, execution_id).await
        }
        EngineMessage::CancelExecution { execution_type, execution_id } => {
            execution::cancel_execution(ctx, execution_type, execution_id).await
        }
        EngineMessage::CancelStage { execution_type, execution_id, stage_id } => {
            stage::cancel_stage(ctx, execution_type, execution_id, stage_id).await
        }
        EngineMessage::RestartStage { execution_type, execution_id, stage_id } => {
            stage::restart_stage(ctx, execution_type, execution_id, stage_id).await
        }
        EngineMessage::InvalidExecutionId { execution_type, execution_id } => {
            invalid::invalid_execution_id(ctx, execution_type, execution_id).await
        }
        EngineMessage::InvalidStageId { execution_type, execution_id, stage_id } => {
            invalid::invalid_stage_id(ctx, execution_type, execution_id, stage_id).await
        }
        EngineMessage::InvalidTaskType { execution_type, execution_id, stage_id, task_id, class_name } => {
            invalid::invalid_task_type(ctx, execution_type, execution_id, stage_id, task_id, class_name).await
        }
    }
}
