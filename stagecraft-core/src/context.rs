//! `EngineContext` — the bundle of collaborators every handler closes
//! over. One struct instead of five separate parameters threaded through
//! every handler signature, held as a single `Arc`-backed bundle rather
//! than passing the store, config, and event bus individually.

use crate::tasks::TaskRegistry;
use stagecraft_shared::{
    config::EngineConfig, events::EventSink, queue::Queue, stage_definition::StageDefinitionRegistry,
    store::ExecutionStore, SharedClock,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct EngineContext {
    pub store: Arc<dyn ExecutionStore>,
    pub queue: Arc<dyn Queue>,
    pub stage_definitions: Arc<StageDefinitionRegistry>,
    pub task_registry: Arc<TaskRegistry>,
    pub events: Arc<dyn EventSink>,
    pub clock: SharedClock,
    pub config: EngineConfig,
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
