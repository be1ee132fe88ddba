//! Handlers for the task-scoped messages: `StartTask`, `RunTask`,
//! `CompleteTask`.

use super::support::{find_stage_or_invalid, load_execution_or_invalid};
use crate::context::EngineContext;
use stagecraft_shared::domain::{
    ExecutionId, ExecutionType, StageContextExt, StageId, StageStatus, TaskStatus,
};
use stagecraft_shared::error::EngineResult;
use stagecraft_shared::events::EngineEvent;
use stagecraft_shared::messages::EngineMessage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub async fn start_task(
    ctx: &EngineContext,
    execution_type: ExecutionType,
    execution_id: ExecutionId,
    stage_id: StageId,
    task_id: String,
) -> EngineResult<()> {
    let Some(execution) = load_execution_or_invalid(ctx, execution_type, execution_id).await?
    else {
        return Ok(());
    };
    if execution.canceled || execution.status.is_terminal() {
        return Ok(());
    }
    let Some(stage) = find_stage_or_invalid(ctx, &execution, execution_type, stage_id).await?
    else {
        return Ok(());
    };

    if stage.paused {
        ctx.queue
            .push_delayed(
                EngineMessage::StartTask {
                    execution_type,
                    execution_id,
                    stage_id,
                    task_id,
                },
                ctx.config.retry.paused_recheck(),
            )
            .await?;
        return Ok(());
    }

    let started = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&started);
    let now = ctx.clock.now();
    let task_id_for_closure = task_id.clone();
    ctx.store
        .update(
            execution_id,
            Box::new(move |execution| {
                if let Some(stage) = execution.stage_mut(stage_id) {
                    if let Some(task) = stage.task_mut(&task_id_for_closure) {
                        if task.status == TaskStatus::NotStarted {
                            task.status = TaskStatus::Running;
                            task.started_at = Some(now);
                            flag.store(true, Ordering::SeqCst);
                        }
                    }
                }
                Ok(())
            }),
        )
        .await?;

    // A redelivered StartTask for a task that's already Running (or past
    // it) must not re-publish TaskStarted or re-push RunTask: that would
    // re-execute the task implementation, violating at-least-once safety.
    if !started.load(Ordering::SeqCst) {
        return Ok(());
    }

    ctx.events
        .publish(EngineEvent::TaskStarted {
            execution_type,
            execution_id,
            stage_id,
            task_id: task_id.clone(),
        })
        .await;
    ctx.queue
        .push(EngineMessage::RunTask {
            execution_type,
            execution_id,
            stage_id,
            task_id,
        })
        .await?;
    Ok(())
}

pub async fn run_task(
    ctx: &EngineContext,
    execution_type: ExecutionType,
    execution_id: ExecutionId,
    stage_id: StageId,
    task_id: String,
) -> EngineResult<()> {
    let Some(execution) = load_execution_or_invalid(ctx, execution_type, execution_id).await?
    else {
        return Ok(());
    };
    // Cooperative cancellation: a running task observes the cancel flag on
    // its next poll rather than being forcibly interrupted.
    if execution.canceled || execution.status.is_terminal() {
        return Ok(());
    }
    let Some(stage) = find_stage_or_invalid(ctx, &execution, execution_type, stage_id).await?
    else {
        return Ok(());
    };
    if stage.status.is_terminal() {
        return Ok(());
    }
    let Some(task) = stage.task(&task_id) else {
        tracing::warn!(%execution_id, %stage_id, task_id, "task not found, dropping RunTask");
        return Ok(());
    };
    // A redelivered RunTask for a task whose CompleteTask has already been
    // processed must not re-execute the implementation.
    if task.status.is_terminal() {
        return Ok(());
    }

    let Some(implementation) = ctx.task_registry.resolve(&task.implementing_class) else {
        ctx.queue
            .push(EngineMessage::InvalidTaskType {
                execution_type,
                execution_id,
                stage_id,
                task_id: task_id.clone(),
                class_name: task.implementing_class.clone(),
            })
            .await?;
        ctx.queue
            .push(EngineMessage::CompleteTask {
                execution_type,
                execution_id,
                stage_id,
                task_id,
                status: TaskStatus::Terminal,
            })
            .await?;
        return Ok(());
    };

    if let Some(timeout) = implementation.as_retryable().and_then(|r| r.timeout()) {
        if let (Ok(timeout), Some(started_at)) = (chrono::Duration::from_std(timeout), task.started_at) {
            let elapsed = ctx.clock.now().signed_duration_since(started_at);
            if elapsed >= timeout {
                ctx.queue
                    .push(EngineMessage::CompleteTask {
                        execution_type,
                        execution_id,
                        stage_id,
                        task_id,
                        status: TaskStatus::Terminal,
                    })
                    .await?;
                return Ok(());
            }
        }
    }

    let result = implementation.execute(stage).await;

    match result.status {
        TaskStatus::Succeeded => {
            let outputs = result.outputs;
            let stage_outputs = result.stage_outputs;
            ctx.store
                .update(
                    execution_id,
                    Box::new(move |execution| {
                        execution.context.extend(stage_outputs);
                        if let Some(stage) = execution.stage_mut(stage_id) {
                            stage.context.extend(outputs);
                        }
                        Ok(())
                    }),
                )
                .await?;
            ctx.queue
                .push(EngineMessage::CompleteTask {
                    execution_type,
                    execution_id,
                    stage_id,
                    task_id,
                    status: TaskStatus::Succeeded,
                })
                .await?;
        }
        TaskStatus::Terminal => {
            ctx.queue
                .push(EngineMessage::CompleteTask {
                    execution_type,
                    execution_id,
                    stage_id,
                    task_id,
                    status: TaskStatus::Terminal,
                })
                .await?;
        }
        TaskStatus::Running | TaskStatus::NotStarted | TaskStatus::Redirect => {
            let backoff = implementation
                .as_retryable()
                .map(|r| r.backoff_period())
                .unwrap_or_else(|| ctx.config.retry.default_backoff());
            ctx.queue
                .push_delayed(
                    EngineMessage::RunTask {
                        execution_type,
                        execution_id,
                        stage_id,
                        task_id,
                    },
                    backoff,
                )
                .await?;
        }
    }
    Ok(())
}

pub async fn complete_task(
    ctx: &EngineContext,
    execution_type: ExecutionType,
    execution_id: ExecutionId,
    stage_id: StageId,
    task_id: String,
    status: TaskStatus,
) -> EngineResult<()> {
    let Some(execution) = load_execution_or_invalid(ctx, execution_type, execution_id).await?
    else {
        return Ok(());
    };
    let Some(stage) = find_stage_or_invalid(ctx, &execution, execution_type, stage_id).await?
    else {
        return Ok(());
    };
    // The stage already reached a terminal state (e.g. via a prior
    // delivery of this same message): nothing left to roll forward.
    if stage.status.is_terminal() {
        return Ok(());
    }

    let now = ctx.clock.now();
    let task_id_for_closure = task_id.clone();
    ctx.store
        .update(
            execution_id,
            Box::new(move |execution| {
                if let Some(stage) = execution.stage_mut(stage_id) {
                    if let Some(task) = stage.task_mut(&task_id_for_closure) {
                        task.status = status;
                        task.ended_at = Some(now);
                    }
                }
                Ok(())
            }),
        )
        .await?;

    let execution = ctx.store.retrieve(execution_id).await?;
    let Some(stage) = execution.stage(stage_id) else {
        return Ok(());
    };
    let Some(task) = stage.task(&task_id) else {
        return Ok(());
    };

    match status {
        TaskStatus::Succeeded => {
            if task.is_loop_end {
                let should_iterate = stage
                    .context
                    .get("loopContinue")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                if should_iterate {
                    if let Some(loop_start) = stage.loop_start_for(&task_id) {
                        let loop_start_id = loop_start.id.clone();
                        let from_ordinal = loop_start.ordinal();
                        ctx.store
                            .update(
                                execution_id,
                                Box::new(move |execution| {
                                    if let Some(stage) = execution.stage_mut(stage_id) {
                                        stage.reset_tasks_from(from_ordinal);
                                    }
                                    Ok(())
                                }),
                            )
                            .await?;
                        ctx.queue
                            .push(EngineMessage::StartTask {
                                execution_type,
                                execution_id,
                                stage_id,
                                task_id: loop_start_id,
                            })
                            .await?;
                        return Ok(());
                    }
                }
            }

            if let Some(next) = stage.next_task(&task_id) {
                ctx.queue
                    .push(EngineMessage::StartTask {
                        execution_type,
                        execution_id,
                        stage_id,
                        task_id: next.id.clone(),
                    })
                    .await?;
            } else if task.is_stage_end {
                ctx.queue
                    .push(EngineMessage::CompleteStage {
                        execution_type,
                        execution_id,
                        stage_id,
                        status: StageStatus::Succeeded,
                    })
                    .await?;
            }
        }
        TaskStatus::Terminal => {
            let continue_pipeline = stage.context.continue_pipeline();
            let fail_pipeline = stage.context.fail_pipeline();
            let stage_status = if continue_pipeline || !fail_pipeline {
                StageStatus::FailedContinue
            } else {
                StageStatus::Terminal
            };
            ctx.queue
                .push(EngineMessage::CompleteStage {
                    execution_type,
                    execution_id,
                    stage_id,
                    status: stage_status,
                })
                .await?;
        }
        TaskStatus::Running | TaskStatus::NotStarted | TaskStatus::Redirect => {}
    }
    Ok(())
}
