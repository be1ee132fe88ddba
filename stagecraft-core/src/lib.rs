//! The execution engine: message handlers implementing the stage/task
//! lifecycle, and the worker pool that drives them against a `Queue` and
//! an `ExecutionStore` from `stagecraft-shared`.

pub mod context;
pub mod dispatch;
pub mod handlers;
pub mod task;
pub mod tasks;

pub use context::EngineContext;
pub use dispatch::WorkerPool;
pub use handlers::dispatch as dispatch_message;
pub use task::{RetryableTask, Task, TaskResult};
pub use tasks::TaskRegistry;
