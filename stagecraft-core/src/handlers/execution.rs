//! Handlers for the execution-scoped messages: `StartExecution`,
//! `CompleteExecution`, `CancelExecution`, `PauseExecution`,
//! `ResumeExecution`.

use super::support::load_execution_or_invalid;
use crate::context::EngineContext;
use stagecraft_shared::domain::{ExecutionId, ExecutionStatus, ExecutionType};
use stagecraft_shared::error::EngineResult;
use stagecraft_shared::events::EngineEvent;
use stagecraft_shared::messages::EngineMessage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Transitions a not-yet-started execution to `RUNNING` and kicks off
/// every top-level stage. Each `StartStage` handler independently rechecks
/// its own requisites, so it is safe to fire all of them at once — stages
/// with unmet requisites simply ack and wait to be re-triggered by the
/// completing upstream stage.
pub async fn start_execution(
    ctx: &EngineContext,
    execution_type: ExecutionType,
    execution_id: ExecutionId,
) -> EngineResult<()> {
    let Some(execution) = load_execution_or_invalid(ctx, execution_type, execution_id).await?
    else {
        return Ok(());
    };

    if execution.canceled || execution.status.is_terminal() {
        return Ok(());
    }

    let now = ctx.clock.now();
    ctx.store
        .update(
            execution_id,
            Box::new(move |execution| {
                if execution.status == ExecutionStatus::NotStarted {
                    execution.status = ExecutionStatus::Running;
                    execution.started_at = Some(now);
                }
                Ok(())
            }),
        )
        .await?;

    for stage in execution.stages.iter().filter(|s| !s.is_synthetic()) {
        ctx.queue
            .push(EngineMessage::StartStage {
                execution_type,
                execution_id,
                stage_id: stage.id,
            })
            .await?;
    }
    Ok(())
}

/// Idempotent: redelivery finds the execution already terminal and, per
/// the recorded decision on duplicate-event handling, only re-publishes
/// `ExecutionComplete` on the transition that actually moved the
/// execution into a terminal state.
pub async fn complete_execution(
    ctx: &EngineContext,
    execution_type: ExecutionType,
    execution_id: ExecutionId,
    status: ExecutionStatus,
) -> EngineResult<()> {
    let Some(_execution) = load_execution_or_invalid(ctx, execution_type, execution_id).await?
    else {
        return Ok(());
    };

    let first_transition = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&first_transition);
    let now = ctx.clock.now();
    ctx.store
        .update(
            execution_id,
            Box::new(move |execution| {
                if !execution.status.is_terminal() {
                    execution.status = status;
                    execution.ended_at = Some(now);
                    flag.store(true, Ordering::SeqCst);
                }
                Ok(())
            }),
        )
        .await?;

    if first_transition.load(Ordering::SeqCst) {
        let execution = ctx.store.retrieve(execution_id).await?;
        ctx.events
            .publish(EngineEvent::ExecutionComplete {
                execution_type,
                execution_id,
                status: execution.status,
            })
            .await;
    }
    Ok(())
}

/// Marks the execution `CANCELED` and fans out `CancelStage` to every
/// stage that is not already terminal.
pub async fn cancel_execution(
    ctx: &EngineContext,
    execution_type: ExecutionType,
    execution_id: ExecutionId,
) -> EngineResult<()> {
    let Some(_execution) = load_execution_or_invalid(ctx, execution_type, execution_id).await?
    else {
        return Ok(());
    };

    let now = ctx.clock.now();
    ctx.store
        .update(
            execution_id,
            Box::new(move |execution| {
                execution.canceled = true;
                if !execution.status.is_terminal() {
                    execution.status = ExecutionStatus::Canceled;
                    execution.ended_at = Some(now);
                }
                Ok(())
            }),
        )
        .await?;

    let execution = ctx.store.retrieve(execution_id).await?;
    for stage in execution.stages.iter().filter(|s| !s.status.is_terminal()) {
        ctx.queue
            .push(EngineMessage::CancelStage {
                execution_type,
                execution_id,
                stage_id: stage.id,
            })
            .await?;
    }
    Ok(())
}

/// Cascades a pause marker to every non-terminal top-level stage.
pub async fn pause_execution(
    ctx: &EngineContext,
    execution_type: ExecutionType,
    execution_id: ExecutionId,
) -> EngineResult<()> {
    let Some(execution) = load_execution_or_invalid(ctx, execution_type, execution_id).await?
    else {
        return Ok(());
    };

    for stage in execution.stages.iter().filter(|s| !s.status.is_terminal()) {
        ctx.queue
            .push(EngineMessage::PauseStage {
                execution_type,
                execution_id,
                stage_id: stage.id,
            })
            .await?;
    }
    Ok(())
}

pub async fn resume_execution(
    ctx: &EngineContext,
    execution_type: ExecutionType,
    execution_id: ExecutionId,
) -> EngineResult<()> {
    let Some(execution) = load_execution_or_invalid(ctx, execution_type, execution_id).await?
    else {
        return Ok(());
    };

    for stage in execution.stages.iter().filter(|s| s.paused) {
        ctx.queue
            .push(EngineMessage::ResumeStage {
                execution_type,
                execution_id,
                stage_id: stage.id,
            })
            .await?;
    }
    Ok(())
}
