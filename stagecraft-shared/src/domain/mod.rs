//! Data model for executions, stages, and tasks.

pub mod context;
pub mod execution;
pub mod ids;
pub mod stage;
pub mod task;

pub use context::{ContextMap, StageContextExt, StageEnabledExpression};
pub use execution::{Execution, ExecutionStatus, ExecutionType};
pub use ids::{ExecutionId, StageId};
pub use stage::{Stage, StageStatus, SyntheticStageOwner};
pub use task::{Task, TaskStatus};
