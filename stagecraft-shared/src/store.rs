//! Durable storage for executions.
//!
//! Every handler in `stagecraft-core` reads the full `Execution` aggregate,
//! mutates it in memory, and writes it back, rather than issuing targeted
//! column updates. `InMemoryExecutionStore` is the reference implementation
//! the test suite runs against; a real deployment would back this trait
//! with Postgres.

use crate::domain::{Execution, ExecutionId};
use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A single-use mutation applied atomically against the stored execution.
/// Boxed rather than generic so `ExecutionStore` stays object-safe — every
/// handler in `stagecraft-core` holds it as `Arc<dyn ExecutionStore>`.
pub type ExecutionMutation = Box<dyn FnOnce(&mut Execution) -> EngineResult<()> + Send>;

#[async_trait]
pub trait ExecutionStore: Send + Sync + std::fmt::Debug {
    async fn retrieve(&self, id: ExecutionId) -> EngineResult<Execution>;

    /// Insert or overwrite an execution wholesale.
    async fn store(&self, execution: Execution) -> EngineResult<()>;

    /// Compare-and-set update: `mutate` runs against the latest stored
    /// value while holding the store's lock for that execution, so two
    /// workers racing to handle redelivered copies of the same message
    /// can't clobber each other's writes.
    async fn update(&self, id: ExecutionId, mutate: ExecutionMutation) -> EngineResult<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryExecutionStore {
    executions: RwLock<HashMap<ExecutionId, Execution>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn retrieve(&self, id: ExecutionId) -> EngineResult<Execution> {
        self.executions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(EngineError::ExecutionNotFound(id))
    }

    async fn store(&self, execution: Execution) -> EngineResult<()> {
        self.executions.write().await.insert(execution.id, execution);
        Ok(())
    }

    async fn update(&self, id: ExecutionId, mutate: ExecutionMutation) -> EngineResult<()> {
        let mut executions = self.executions.write().await;
        let execution = executions.get_mut(&id).ok_or(EngineError::ExecutionNotFound(id))?;
        mutate(execution)
    }
}
