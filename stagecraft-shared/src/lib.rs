//! Data model, message envelope, and collaborator traits shared by every
//! piece of the execution engine. `stagecraft-core` builds the handler
//! dispatch loop on top of the types exported here.

pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod expression;
pub mod messages;
pub mod queue;
pub mod stage_definition;
pub mod store;

pub use clock::{Clock, FixedClock, SharedClock, SystemClock};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use events::{EngineEvent, EventSink, NoOpEventSink, RecordingEventSink};
pub use messages::EngineMessage;
pub use queue::{AckToken, InMemoryQueue, Queue, QueueStats};
pub use stage_definition::{StageDefinition, StageDefinitionRegistry, SyntheticStageSpec};
pub use store::{ExecutionMutation, ExecutionStore, InMemoryExecutionStore};
