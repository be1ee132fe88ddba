//! Stage-type catalog: the capability a stage's `stageType` resolves to.
//!
//! A `StageDefinition` knows how to materialize a stage's own task list and
//! describe whatever synthetic children it needs. The engine treats stage
//! types as a closed capability set — `taskGraph`/`beforeStages`/
//! `afterStages`/`parallelBranches` — resolved from a registry by string
//! tag rather than hard-coding a type switch in the handler.

use crate::domain::{ContextMap, Stage, Task};
use std::collections::HashMap;
use std::sync::Arc;

/// Descriptor for a synthetic child stage `StartStage` will insert into the
/// execution's stage sequence. Does not carry an id — the handler assigns
/// the deterministic `{parentId}-{ordinal}-{authorId}` id at insertion time.
#[derive(Debug, Clone)]
pub struct SyntheticStageSpec {
    pub author_id: String,
    pub stage_type: String,
    pub context: ContextMap,
}

impl SyntheticStageSpec {
    pub fn new(author_id: impl Into<String>, stage_type: impl Into<String>) -> Self {
        Self {
            author_id: author_id.into(),
            stage_type: stage_type.into(),
            context: ContextMap::new(),
        }
    }
}

pub trait StageDefinition: Send + Sync + std::fmt::Debug {
    fn stage_type(&self) -> &'static str;

    /// Build this stage's own task list. For a parallel-branching stage
    /// this is only the post-branch tasks; the pre-branch work, if any,
    /// belongs on the branch children themselves.
    fn task_graph(&self, stage: &Stage) -> Vec<Task>;

    fn before_stages(&self, _stage: &Stage) -> Vec<SyntheticStageSpec> {
        Vec::new()
    }

    fn after_stages(&self, _stage: &Stage) -> Vec<SyntheticStageSpec> {
        Vec::new()
    }

    /// Parallel branch children, added as `STAGE_BEFORE` synthetics of the
    /// same stage type as `stage` itself.
    fn parallel_branches(&self, _stage: &Stage) -> Vec<SyntheticStageSpec> {
        Vec::new()
    }
}

#[derive(Debug, Default)]
pub struct StageDefinitionRegistry {
    definitions: HashMap<String, Arc<dyn StageDefinition>>,
}

impl StageDefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: Arc<dyn StageDefinition>) {
        self.definitions.insert(definition.stage_type().to_string(), definition);
    }

    pub fn resolve(&self, stage_type: &str) -> Option<Arc<dyn StageDefinition>> {
        self.definitions.get(stage_type).cloned()
    }

    /// A registry preloaded with the built-in stage types exercised by the
    /// end-to-end scenarios.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MultiTaskStage));
        registry.register(Arc::new(SyntheticBeforeStage));
        registry.register(Arc::new(ParallelBranchesStage));
        registry.register(Arc::new(TimeWindowStage));
        registry
    }
}

/// Three tasks in a row: `dummy1`, `dummy2`, `dummy3`.
#[derive(Debug)]
pub struct MultiTaskStage;

impl StageDefinition for MultiTaskStage {
    fn stage_type(&self) -> &'static str {
        "multiTask"
    }

    fn task_graph(&self, _stage: &Stage) -> Vec<Task> {
        vec![
            Task::new("1", "dummy1", "DummyTask").stage_start(),
            Task::new("2", "dummy2", "DummyTask"),
            Task::new("3", "dummy3", "DummyTask").stage_end(),
        ]
    }
}

/// Two `STAGE_BEFORE` children ahead of a parent with no tasks of its own
/// until they complete.
#[derive(Debug)]
pub struct SyntheticBeforeStage;

impl StageDefinition for SyntheticBeforeStage {
    fn stage_type(&self) -> &'static str {
        "stageWithSyntheticBefore"
    }

    fn task_graph(&self, _stage: &Stage) -> Vec<Task> {
        Vec::new()
    }

    fn before_stages(&self, _stage: &Stage) -> Vec<SyntheticStageSpec> {
        vec![
            SyntheticStageSpec::new("pre1", "multiTask"),
            SyntheticStageSpec::new("pre2", "multiTask"),
        ]
    }
}

/// Fans out into 3 parallel branch children; the parent's own task list is
/// just the post-branch join step.
#[derive(Debug)]
pub struct ParallelBranchesStage;

impl StageDefinition for ParallelBranchesStage {
    fn stage_type(&self) -> &'static str {
        "stageWithParallelBranches"
    }

    fn task_graph(&self, _stage: &Stage) -> Vec<Task> {
        vec![Task::new("1", "post-branch", "DummyTask").stage_start().stage_end()]
    }

    /// Branches reuse the parent's own stage type, but only the top-level
    /// stage fans out: a branch is itself a `stageWithParallelBranches`
    /// synthetic, and re-running this for it would fan out forever.
    fn parallel_branches(&self, stage: &Stage) -> Vec<SyntheticStageSpec> {
        if stage.is_synthetic() {
            return Vec::new();
        }
        vec![
            SyntheticStageSpec::new("branch1", "stageWithParallelBranches"),
            SyntheticStageSpec::new("branch2", "stageWithParallelBranches"),
            SyntheticStageSpec::new("branch3", "stageWithParallelBranches"),
        ]
    }
}

/// The synthetic execution-window gate prepended ahead of any stage whose
/// `restrictExecutionDuringTimeWindow` context flag is set. A single task
/// that a concrete `Task` implementation resolves against a configured
/// window; this crate only describes its shape.
#[derive(Debug)]
pub struct TimeWindowStage;

impl StageDefinition for TimeWindowStage {
    fn stage_type(&self) -> &'static str {
        "restrictExecutionDuringTimeWindow"
    }

    fn task_graph(&self, _stage: &Stage) -> Vec<Task> {
        vec![Task::new("1", "waitForTimeWindow", "WaitForTimeWindowTask")
            .stage_start()
            .stage_end()]
    }
}
