//! Crate-level error type for the execution engine's data model and
//! out-of-process collaborator traits (`Queue`, `ExecutionStore`).

use crate::domain::{ExecutionId, StageId};
use thiserror::Error;

/// Errors surfaced by the store, queue, and expression evaluator.
///
/// Handlers in `stagecraft-core` map a missing execution or stage onto an
/// `Invalid*Id` message, while `Store`/`Queue` variants are treated as
/// transient and left for redelivery (the handler does not ack).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("execution {0} not found")]
    ExecutionNotFound(ExecutionId),

    #[error("stage {stage_id} not found in execution {execution_id}")]
    StageNotFound {
        execution_id: ExecutionId,
        stage_id: StageId,
    },

    #[error("no task implementation registered for class {0:?}")]
    UnknownTaskType(String),

    #[error("no stage definition registered for stage type {0:?}")]
    UnknownStageType(String),

    #[error("failed to evaluate expression {expression:?}: {reason}")]
    ExpressionEvaluation { expression: String, reason: String },

    #[error("store operation failed: {0}")]
    Store(String),

    #[error("queue operation failed: {0}")]
    Queue(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
