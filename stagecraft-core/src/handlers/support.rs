//! Shared lookups every handler needs: load-or-emit-Invalid*Id, centralizing
//! "not found, log and return" guards rather than repeating the same match
//! arm in every handler.

use crate::context::EngineContext;
use stagecraft_shared::domain::{Execution, ExecutionId, ExecutionType, StageId};
use stagecraft_shared::error::{EngineError, EngineResult};
use stagecraft_shared::messages::EngineMessage;

/// Loads the execution or, if missing, pushes `InvalidExecutionId` and
/// signals the caller to ack-and-stop by returning `Ok(None)`. A genuine
/// store/queue fault propagates so the message is left unacked.
pub(crate) async fn load_execution_or_invalid(
    ctx: &EngineContext,
    execution_type: ExecutionType,
    execution_id: ExecutionId,
) -> EngineResult<Option<Execution>> {
    match ctx.store.retrieve(execution_id).await {
        Ok(execution) => Ok(Some(execution)),
        Err(EngineError::ExecutionNotFound(id)) => {
            tracing::warn!(execution_id = %id, "execution not found, emitting InvalidExecutionId");
            ctx.queue
                .push(EngineMessage::InvalidExecutionId { execution_type, execution_id: id })
                .await?;
            Ok(None)
        }
        Err(other) => Err(other),
    }
}

/// Locates a stage within an already-loaded execution or, if missing,
/// pushes `InvalidStageId` and signals ack-and-stop.
pub(crate) async fn find_stage_or_invalid<'a>(
    ctx: &EngineContext,
    execution: &'a Execution,
    execution_type: ExecutionType,
    stage_id: StageId,
) -> EngineResult<Option<&'a stagecraft_shared::domain::Stage>> {
    match execution.stage(stage_id) {
        Some(stage) => Ok(Some(stage)),
        None => {
            tracing::warn!(execution_id = %execution.id, %stage_id, "stage not found, emitting InvalidStageId");
            ctx.queue
                .push(EngineMessage::InvalidStageId {
                    execution_type,
                    execution_id: execution.id,
                    stage_id,
                })
                .await?;
            Ok(None)
        }
    }
}
