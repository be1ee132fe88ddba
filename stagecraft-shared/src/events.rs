//! Event publication.
//!
//! Handlers never reach for a global publisher; they hold an injected
//! `Arc<dyn EventSink>` rather than a static channel, so tests can swap in a
//! recorder and assert on exact event ordering.

use crate::domain::{ExecutionId, ExecutionStatus, ExecutionType, StageId, StageStatus};
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StageStarted {
        execution_type: ExecutionType,
        execution_id: ExecutionId,
        stage_id: StageId,
    },
    StageComplete {
        execution_type: ExecutionType,
        execution_id: ExecutionId,
        stage_id: StageId,
        status: StageStatus,
    },
    TaskStarted {
        execution_type: ExecutionType,
        execution_id: ExecutionId,
        stage_id: StageId,
        task_id: String,
    },
    TaskComplete {
        execution_type: ExecutionType,
        execution_id: ExecutionId,
        stage_id: StageId,
        task_id: String,
        status: crate::domain::TaskStatus,
    },
    ExecutionComplete {
        execution_type: ExecutionType,
        execution_id: ExecutionId,
        status: ExecutionStatus,
    },
}

#[async_trait]
pub trait EventSink: Send + Sync + std::fmt::Debug {
    async fn publish(&self, event: EngineEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn publish(&self, event: EngineEvent) {
        tracing::debug!(?event, "discarding event: no sink configured");
    }
}

/// Test double: records every published event in arrival order.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().expect("event sink mutex poisoned").clone()
    }

    pub fn contains_stage_started(&self, stage_id: StageId) -> bool {
        self.events()
            .iter()
            .any(|e| matches!(e, EngineEvent::StageStarted { stage_id: s, .. } if *s == stage_id))
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn publish(&self, event: EngineEvent) {
        self.events.lock().expect("event sink mutex poisoned").push(event);
    }
}
