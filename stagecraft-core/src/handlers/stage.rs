//! Handlers for the stage-scoped messages: `StartStage`, `CompleteStage`,
//! `RestartStage`, `CancelStage`, `PauseStage`, `ResumeStage`.
//!
//! `start_stage` is the central algorithm of the engine: requisite gating,
//! `stageEnabled` evaluation, synthetic-stage materialization, and the
//! dispatch decision (start this stage's own tasks, or wait on its
//! `STAGE_BEFORE` children) all live here.

use super::support::{find_stage_or_invalid, load_execution_or_invalid};
use crate::context::EngineContext;
use stagecraft_shared::domain::{
    Execution, ExecutionId, ExecutionStatus, ExecutionType, Stage, StageId, StageStatus,
    StageContextExt, SyntheticStageOwner,
};
use stagecraft_shared::error::EngineResult;
use stagecraft_shared::events::EngineEvent;
use stagecraft_shared::messages::EngineMessage;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Builds one synthetic child stage: a stub with no tasks of its own yet —
/// its own `StartStage` delivery materializes those — wired to its parent
/// via `parentStageId`/`syntheticStageOwner`.
fn build_synthetic(
    parent_ref_id: &str,
    parent_id: StageId,
    ordinal: usize,
    spec: &stagecraft_shared::stage_definition::SyntheticStageSpec,
    owner: SyntheticStageOwner,
    is_parallel_branch: bool,
) -> Stage {
    let mut child = Stage::new(
        Stage::synthetic_ref_id(parent_ref_id, ordinal, &spec.author_id),
        spec.stage_type.clone(),
    );
    child.parent_stage_id = Some(parent_id);
    child.synthetic_owner = Some(owner);
    child.is_parallel_branch = is_parallel_branch;
    child.context = spec.context.clone();
    child
}

/// From a list of siblings, the set that should be kicked off together
/// starting at `start`: a single stage, or — when `start` begins a run of
/// `isParallelBranch` siblings — every stage in that contiguous run.
fn fan_out_from(children: &[&Stage], start: usize) -> Vec<StageId> {
    let Some(first) = children.get(start) else {
        return Vec::new();
    };
    if first.is_parallel_branch {
        children[start..]
            .iter()
            .take_while(|s| s.is_parallel_branch)
            .map(|s| s.id)
            .collect()
    } else {
        vec![first.id]
    }
}

pub async fn start_stage(
    ctx: &EngineContext,
    execution_type: ExecutionType,
    execution_id: ExecutionId,
    stage_id: StageId,
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

    // Already dispatched or finished by a previous delivery of this same
    // message: nothing left for StartStage to do.
    if stage.status != StageStatus::NotStarted {
        return Ok(());
    }

    if !execution.requisites_satisfied(stage_id) {
        return Ok(());
    }

    if let Some(expression) = stage.context.stage_enabled() {
        match stagecraft_shared::expression::evaluate(&expression.expression, &stage.context) {
            Ok(true) => {}
            Ok(false) => {
                // Status/end-time are left for CompleteStage to set (it is
                // the sole authority on that transition, CAS-guarded on
                // NOT_STARTED) so its downstream/completion logic still
                // runs instead of seeing an already-terminal stage and
                // treating this as a redelivery no-op.
                ctx.queue
                    .push(EngineMessage::CompleteStage {
                        execution_type,
                        execution_id,
                        stage_id,
                        status: StageStatus::Skipped,
                    })
                    .await?;
                return Ok(());
            }
            Err(_) => {
                ctx.queue
                    .push(EngineMessage::CompleteStage {
                        execution_type,
                        execution_id,
                        stage_id,
                        status: StageStatus::Terminal,
                    })
                    .await?;
                return Ok(());
            }
        }
    }

    let definition = ctx.stage_definitions.resolve(&stage.stage_type).ok_or_else(|| {
        stagecraft_shared::error::EngineError::UnknownStageType(stage.stage_type.clone())
    })?;

    let mut before_specs = Vec::new();
    if stage.context.restrict_execution_during_time_window() {
        before_specs.push((
            stagecraft_shared::stage_definition::SyntheticStageSpec::new(
                "restrictExecutionDuringTimeWindow",
                "restrictExecutionDuringTimeWindow",
            ),
            false,
        ));
    }
    for spec in definition.before_stages(stage) {
        before_specs.push((spec, false));
    }
    for spec in definition.parallel_branches(stage) {
        before_specs.push((spec, true));
    }
    let after_specs = definition.after_stages(stage);
    let own_tasks = definition.task_graph(stage);

    let just_materialized = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&just_materialized);
    ctx.store
        .update(
            execution_id,
            Box::new(move |execution| {
                let Some(idx) = execution.index_of(stage_id) else {
                    return Ok(());
                };
                if execution.stages[idx].materialized {
                    return Ok(());
                }
                let parent_ref_id = execution.stages[idx].ref_id.clone();
                let parent_id = execution.stages[idx].id;

                execution.stages[idx].tasks = own_tasks.clone();
                execution.stages[idx].materialized = true;

                for (ordinal, spec) in after_specs.iter().enumerate() {
                    let child = build_synthetic(
                        &parent_ref_id,
                        parent_id,
                        ordinal + 1,
                        spec,
                        SyntheticStageOwner::After,
                        false,
                    );
                    execution.stages.insert(idx + 1 + ordinal, child);
                }
                for (ordinal, (spec, is_parallel)) in before_specs.iter().enumerate() {
                    let child = build_synthetic(
                        &parent_ref_id,
                        parent_id,
                        ordinal + 1,
                        spec,
                        SyntheticStageOwner::Before,
                        *is_parallel,
                    );
                    execution.stages.insert(idx + ordinal, child);
                }
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }),
        )
        .await?;

    let execution = ctx.store.retrieve(execution_id).await?;
    let before_children = execution.children_with_owner(stage_id, SyntheticStageOwner::Before);

    if just_materialized.load(Ordering::SeqCst) {
        if !before_children.is_empty() {
            for id in fan_out_from(&before_children, 0) {
                ctx.queue
                    .push(EngineMessage::StartStage {
                        execution_type,
                        execution_id,
                        stage_id: id,
                    })
                    .await?;
            }
            return Ok(());
        }
    } else if before_children
        .iter()
        .any(|child| !child.status.is_terminal_success())
    {
        // Redelivered StartStage for a stage still waiting on its
        // STAGE_BEFORE children; the completing child will re-trigger us.
        return Ok(());
    }

    dispatch_own_tasks(ctx, execution_type, execution_id, stage_id).await
}

/// CAS-guarded `NOT_STARTED -> RUNNING` transition followed by kicking off
/// the stage's own `isStageStart` task. Guards against two workers racing
/// to start the same join stage.
async fn dispatch_own_tasks(
    ctx: &EngineContext,
    execution_type: ExecutionType,
    execution_id: ExecutionId,
    stage_id: StageId,
) -> EngineResult<()> {
    let started = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&started);
    let now = ctx.clock.now();
    ctx.store
        .update(
            execution_id,
            Box::new(move |execution| {
                if let Some(stage) = execution.stage_mut(stage_id) {
                    if stage.status == StageStatus::NotStarted {
                        stage.status = StageStatus::Running;
                        stage.started_at = Some(now);
                        flag.store(true, Ordering::SeqCst);
                    }
                }
                Ok(())
            }),
        )
        .await?;

    if !started.load(Ordering::SeqCst) {
        return Ok(());
    }

    let execution = ctx.store.retrieve(execution_id).await?;
    let Some(stage) = execution.stage(stage_id) else {
        return Ok(());
    };

    ctx.events
        .publish(EngineEvent::StageStarted {
            execution_type,
            execution_id,
            stage_id,
        })
        .await;

    if let Some(start_task) = stage.stage_start_task() {
        ctx.queue
            .push(EngineMessage::StartTask {
                execution_type,
                execution_id,
                stage_id,
                task_id: start_task.id.clone(),
            })
            .await?;
    } else {
        // No tasks of its own (a pure gating stage, e.g. one that only
        // exists to sequence STAGE_BEFORE synthetics): nothing will ever
        // call CompleteTask for it, so it completes as soon as it starts.
        ctx.queue
            .push(EngineMessage::CompleteStage {
                execution_type,
                execution_id,
                stage_id,
                status: StageStatus::Succeeded,
            })
            .await?;
    }
    Ok(())
}

pub async fn complete_stage(
    ctx: &EngineContext,
    execution_type: ExecutionType,
    execution_id: ExecutionId,
    stage_id: StageId,
    status: StageStatus,
) -> EngineResult<()> {
    let Some(_execution) = load_execution_or_invalid(ctx, execution_type, execution_id).await?
    else {
        return Ok(());
    };

    let stage_already_terminal = {
        let execution = ctx.store.retrieve(execution_id).await?;
        match execution.stage(stage_id) {
            Some(stage) => stage.status.is_terminal(),
            None => return Ok(()),
        }
    };
    if stage_already_terminal {
        return Ok(());
    }

    let now = ctx.clock.now();
    ctx.store
        .update(
            execution_id,
            Box::new(move |execution| {
                if let Some(stage) = execution.stage_mut(stage_id) {
                    if !stage.status.is_terminal() {
                        stage.status = status;
                        stage.ended_at = Some(now);
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
    let fail_pipeline = stage.context.fail_pipeline();
    let parent_id = stage.parent_stage_id;
    let owner = stage.synthetic_owner;

    ctx.events
        .publish(EngineEvent::StageComplete {
            execution_type,
            execution_id,
            stage_id,
            status,
        })
        .await;

    if owner == Some(SyntheticStageOwner::Before) {
        if let Some(parent_id) = parent_id {
            if execution.stage(parent_id).map(|p| p.status) == Some(StageStatus::NotStarted) {
                let siblings = execution.children_with_owner(parent_id, SyntheticStageOwner::Before);
                if siblings.iter().all(|s| s.status.is_terminal_success()) {
                    ctx.queue
                        .push(EngineMessage::StartStage {
                            execution_type,
                            execution_id,
                            stage_id: parent_id,
                        })
                        .await?;
                }
            }
        }
    }

    if status == StageStatus::Terminal && fail_pipeline {
        ctx.queue
            .push(EngineMessage::CompleteExecution {
                execution_type,
                execution_id,
                status: ExecutionStatus::Terminal,
            })
            .await?;
        return Ok(());
    }

    let downstream = execution.downstream_of(stage_id);
    if downstream.is_empty() {
        let completes_execution = owner != Some(SyntheticStageOwner::Before);
        if completes_execution {
            ctx.queue
                .push(EngineMessage::CompleteExecution {
                    execution_type,
                    execution_id,
                    status: ExecutionStatus::Succeeded,
                })
                .await?;
        }
    } else {
        for id in downstream {
            ctx.queue
                .push(EngineMessage::StartStage {
                    execution_type,
                    execution_id,
                    stage_id: id,
                })
                .await?;
        }
    }
    Ok(())
}

/// The forward-reachable closure over explicit `requisiteStageRefIds`
/// edges: the target plus every stage transitively downstream of it.
/// Deliberately does not follow the sibling-order fallback `downstream_of`
/// uses — restart locality is defined purely in terms of the authored DAG.
fn restart_set(execution: &Execution, target: StageId) -> Vec<StageId> {
    let mut result = vec![target];
    let mut frontier = vec![target];
    while let Some(id) = frontier.pop() {
        let Some(ref_id) = execution.stage(id).map(|s| s.ref_id.clone()) else {
            continue;
        };
        for candidate in &execution.stages {
            if result.contains(&candidate.id) {
                continue;
            }
            if candidate.requisite_stage_ref_ids.iter().any(|r| r == &ref_id) {
                result.push(candidate.id);
                frontier.push(candidate.id);
            }
        }
    }
    result
}

pub async fn restart_stage(
    ctx: &EngineContext,
    execution_type: ExecutionType,
    execution_id: ExecutionId,
    stage_id: StageId,
) -> EngineResult<()> {
    let Some(execution) = load_execution_or_invalid(ctx, execution_type, execution_id).await?
    else {
        return Ok(());
    };
    let Some(stage) = find_stage_or_invalid(ctx, &execution, execution_type, stage_id).await?
    else {
        return Ok(());
    };

    // Open question, resolved: restarting a non-terminal stage is a no-op.
    if !stage.status.is_terminal() {
        return Ok(());
    }

    ctx.store
        .update(
            execution_id,
            Box::new(move |execution| {
                let ids = restart_set(execution, stage_id);
                let restart_set: HashSet<StageId> = ids.iter().copied().collect();
                execution
                    .stages
                    .retain(|s| !s.parent_stage_id.is_some_and(|p| restart_set.contains(&p)));
                for id in ids {
                    if let Some(stage) = execution.stage_mut(id) {
                        stage.reset_for_restart();
                    }
                }
                execution.status = ExecutionStatus::Running;
                Ok(())
            }),
        )
        .await?;

    ctx.queue
        .push(EngineMessage::StartStage {
            execution_type,
            execution_id,
            stage_id,
        })
        .await?;
    Ok(())
}

pub async fn cancel_stage(
    ctx: &EngineContext,
    execution_type: ExecutionType,
    execution_id: ExecutionId,
    stage_id: StageId,
) -> EngineResult<()> {
    let Some(execution) = load_execution_or_invalid(ctx, execution_type, execution_id).await?
    else {
        return Ok(());
    };
    if find_stage_or_invalid(ctx, &execution, execution_type, stage_id).await?.is_none() {
        return Ok(());
    }

    let now = ctx.clock.now();
    ctx.store
        .update(
            execution_id,
            Box::new(move |execution| {
                if let Some(stage) = execution.stage_mut(stage_id) {
                    if !stage.status.is_terminal() {
                        stage.status = StageStatus::Canceled;
                        stage.ended_at = Some(now);
                    }
                }
                Ok(())
            }),
        )
        .await?;
    Ok(())
}

pub async fn pause_stage(
    ctx: &EngineContext,
    execution_type: ExecutionType,
    execution_id: ExecutionId,
    stage_id: StageId,
) -> EngineResult<()> {
    let Some(execution) = load_execution_or_invalid(ctx, execution_type, execution_id).await?
    else {
        return Ok(());
    };
    if find_stage_or_invalid(ctx, &execution, execution_type, stage_id).await?.is_none() {
        return Ok(());
    }
    ctx.store
        .update(
            execution_id,
            Box::new(move |execution| {
                if let Some(stage) = execution.stage_mut(stage_id) {
                    stage.paused = true;
                }
                Ok(())
            }),
        )
        .await?;
    Ok(())
}

pub async fn resume_stage(
    ctx: &EngineContext,
    execution_type: ExecutionType,
    execution_id: ExecutionId,
    stage_id: StageId,
) -> EngineResult<()> {
    let Some(execution) = load_execution_or_invalid(ctx, execution_type, execution_id).await?
    else {
        return Ok(());
    };
    if find_stage_or_invalid(ctx, &execution, execution_type, stage_id).await?.is_none() {
        return Ok(());
    }
    ctx.store
        .update(
            execution_id,
            Box::new(move |execution| {
                if let Some(stage) = execution.stage_mut(stage_id) {
                    stage.paused = false;
                }
                Ok(())
            }),
        )
        .await?;
    Ok(())
}
