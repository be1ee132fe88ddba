//! Handlers for the `Invalid*` diagnostic messages themselves. These are
//! terminal: by the time one reaches a worker there is nothing left to
//! roll forward, only to record.

use crate::context::EngineContext;
use stagecraft_shared::domain::{ExecutionId, ExecutionType, StageId};
use stagecraft_shared::error::EngineResult;

pub async fn invalid_execution_id(
    _ctx: &EngineContext,
    execution_type: ExecutionType,
    execution_id: ExecutionId,
) -> EngineResult<()> {
    tracing::warn!(%execution_id, execution_type = execution_type.as_str(), "invalid execution id");
    Ok(())
}

pub async fn invalid_stage_id(
    _ctx: &EngineContext,
    execution_type: ExecutionType,
    execution_id: ExecutionId,
    stage_id: StageId,
) -> EngineResult<()> {
    tracing::warn!(%execution_id, %stage_id, execution_type = execution_type.as_str(), "invalid stage id");
    Ok(())
}

pub async fn invalid_task_type(
    _ctx: &EngineContext,
    execution_type: ExecutionType,
    execution_id: ExecutionId,
    stage_id: StageId,
    task_id: String,
    class_name: String,
) -> EngineResult<()> {
    tracing::warn!(
        %execution_id, %stage_id, task_id, class_name,
        execution_type = execution_type.as_str(),
        "unknown task implementation class"
    );
    Ok(())
}
