//! Execution — the root entity.

use super::context::ContextMap;
use super::ids::{ExecutionId, StageId};
use super::stage::{Stage, SyntheticStageOwner};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionType {
    Pipeline,
    Orchestration,
}

impl ExecutionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionType::Pipeline => "pipeline",
            ExecutionType::Orchestration => "orchestration",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    NotStarted,
    Running,
    Succeeded,
    Terminal,
    Canceled,
    Stopped,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::NotStarted | ExecutionStatus::Running)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub application: String,
    pub execution_type: ExecutionType,
    pub status: ExecutionStatus,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
    pub canceled: bool,
    /// Ordered sequence of stages; author order plus whatever synthetics
    /// `StartStage` has spliced in.
    pub stages: Vec<Stage>,
    pub context: ContextMap,
}

impl Execution {
    pub fn new(application: impl Into<String>, execution_type: ExecutionType) -> Self {
        Self {
            id: ExecutionId::new(),
            application: application.into(),
            execution_type,
            status: ExecutionStatus::NotStarted,
            started_at: None,
            ended_at: None,
            canceled: false,
            stages: Vec::new(),
            context: ContextMap::new(),
        }
    }

    pub fn stage(&self, stage_id: StageId) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == stage_id)
    }

    pub fn stage_mut(&mut self, stage_id: StageId) -> Option<&mut Stage> {
        self.stages.iter_mut().find(|s| s.id == stage_id)
    }

    pub fn stage_by_ref_id(&self, ref_id: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.ref_id == ref_id)
    }

    pub fn index_of(&self, stage_id: StageId) -> Option<usize> {
        self.stages.iter().position(|s| s.id == stage_id)
    }

    /// Every stage whose `requisiteStageRefIds` names `ref_id`, plus the
    /// next sibling in author order when a stage has no explicit
    /// requisites pointing elsewhere and is simply next in line.
    /// "Sibling" means sharing the same `(parentStageId, syntheticStageOwner)`
    /// pair, so top-level stages, a parent's `STAGE_BEFORE` children, and
    /// its `STAGE_AFTER` children each chain only within their own group.
    pub fn downstream_of(&self, stage_id: StageId) -> Vec<StageId> {
        let Some(stage) = self.stage(stage_id) else {
            return Vec::new();
        };
        let ref_id = stage.ref_id.clone();
        let level = (stage.parent_stage_id, stage.synthetic_owner);

        let siblings: Vec<&Stage> = self
            .stages
            .iter()
            .filter(|s| (s.parent_stage_id, s.synthetic_owner) == level)
            .collect();

        let explicit: Vec<StageId> = siblings
            .iter()
            .filter(|s| s.requisite_stage_ref_ids.iter().any(|r| r == &ref_id))
            .map(|s| s.id)
            .collect();

        if !explicit.is_empty() {
            return explicit;
        }

        // No explicit DAG edge references this stage: fall back to the
        // next sibling in author order. A run of parallel-branch siblings
        // immediately following this one all start together (fan-out);
        // anything else just chains to the single next sibling.
        if let Some(pos) = siblings.iter().position(|s| s.id == stage_id) {
            if let Some(next) = siblings.get(pos + 1) {
                if next.is_parallel_branch {
                    return siblings[pos + 1..]
                        .iter()
                        .take_while(|s| s.is_parallel_branch)
                        .map(|s| s.id)
                        .collect();
                }
                return vec![next.id];
            }
        }
        Vec::new()
    }

    /// Every stage whose `parentStageId` is `stage_id` — the synthetic
    /// children of a stage, regardless of `STAGE_BEFORE`/`STAGE_AFTER`.
    pub fn synthetic_children_of(&self, stage_id: StageId) -> Vec<StageId> {
        self.stages
            .iter()
            .filter(|s| s.parent_stage_id == Some(stage_id))
            .map(|s| s.id)
            .collect()
    }

    /// Synthetic children of `parent_id` with a specific owner tag, in
    /// stage-sequence order.
    pub fn children_with_owner(&self, parent_id: StageId, owner: SyntheticStageOwner) -> Vec<&Stage> {
        self.stages
            .iter()
            .filter(|s| s.parent_stage_id == Some(parent_id) && s.synthetic_owner == Some(owner))
            .collect()
    }

    /// Whether every requisite of `stage_id` has reached terminal-success.
    pub fn requisites_satisfied(&self, stage_id: StageId) -> bool {
        let Some(stage) = self.stage(stage_id) else {
            return false;
        };
        stage.requisite_stage_ref_ids.iter().all(|ref_id| {
            self.stage_by_ref_id(ref_id)
                .map(|s| s.status.is_terminal_success())
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stage::StageStatus;

    fn linear_execution() -> Execution {
        let mut exec = Execution::new("app", ExecutionType::Pipeline);
        exec.stages.push(Stage::new("1", "deploy"));
        exec.stages.push(Stage::new("2", "bake").requires(["1"]));
        exec
    }

    #[test]
    fn downstream_follows_explicit_requisite() {
        let exec = linear_execution();
        let first = exec.stage_by_ref_id("1").unwrap().id;
        let second = exec.stage_by_ref_id("2").unwrap().id;
        assert_eq!(exec.downstream_of(first), vec![second]);
    }

    #[test]
    fn downstream_falls_back_to_next_sibling_without_edges() {
        let mut exec = Execution::new("app", ExecutionType::Pipeline);
        exec.stages.push(Stage::new("1", "deploy"));
        exec.stages.push(Stage::new("2", "bake"));
        let first = exec.stage_by_ref_id("1").unwrap().id;
        let second = exec.stage_by_ref_id("2").unwrap().id;
        assert_eq!(exec.downstream_of(first), vec![second]);
    }

    #[test]
    fn requisites_satisfied_requires_terminal_success() {
        let mut exec = linear_execution();
        let second = exec.stage_by_ref_id("2").unwrap().id;
        assert!(!exec.requisites_satisfied(second));

        exec.stage_mut(exec.stage_by_ref_id("1").unwrap().id).unwrap().status = StageStatus::Succeeded;
        assert!(exec.requisites_satisfied(second));
    }

    #[test]
    fn requisites_satisfied_accepts_failed_continue() {
        let mut exec = linear_execution();
        let second = exec.stage_by_ref_id("2").unwrap().id;
        exec.stage_mut(exec.stage_by_ref_id("1").unwrap().id).unwrap().status =
            StageStatus::FailedContinue;
        assert!(exec.requisites_satisfied(second));
    }

    fn synthetic_before_child(parent_id: StageId, ref_id: &str) -> Stage {
        let mut child = Stage::new(ref_id, "multiTask");
        child.parent_stage_id = Some(parent_id);
        child.synthetic_owner = Some(SyntheticStageOwner::Before);
        child
    }

    #[test]
    fn downstream_chaining_stays_within_its_own_synthetic_owner_group() {
        let mut exec = Execution::new("app", ExecutionType::Pipeline);
        exec.stages.push(Stage::new("1", "stageWithSyntheticBefore"));
        let parent_id = exec.stage_by_ref_id("1").unwrap().id;

        exec.stages.push(synthetic_before_child(parent_id, "1-1-pre1"));
        exec.stages.push(synthetic_before_child(parent_id, "1-2-pre2"));
        // A second top-level stage, unrelated to the synthetics above.
        exec.stages.push(Stage::new("2", "multiTask"));

        let pre1 = exec.stage_by_ref_id("1-1-pre1").unwrap().id;
        let pre2 = exec.stage_by_ref_id("1-2-pre2").unwrap().id;
        let second_top_level = exec.stage_by_ref_id("2").unwrap().id;

        // pre1 chains to pre2 (same BEFORE group), never to the unrelated
        // top-level stage that happens to sit later in the sequence.
        assert_eq!(exec.downstream_of(pre1), vec![pre2]);
        // pre2 is the last of its group: nothing downstream, not even the
        // parent (the parent is triggered separately, by CompleteStage's
        // explicit before-group-complete check).
        assert_eq!(exec.downstream_of(pre2), Vec::<StageId>::new());
        // The parent's own downstream_of (top-level group of one) is
        // likewise empty, never crossing into its own synthetic children.
        assert_eq!(exec.downstream_of(parent_id), Vec::<StageId>::new());
        let _ = second_top_level;
    }

    #[test]
    fn downstream_fans_out_a_contiguous_run_of_parallel_branches() {
        let mut exec = Execution::new("app", ExecutionType::Pipeline);
        exec.stages.push(Stage::new("1", "stageWithParallelBranches"));
        let parent_id = exec.stage_by_ref_id("1").unwrap().id;

        for ref_id in ["1-1-branch1", "1-2-branch2", "1-3-branch3"] {
            let mut branch = Stage::new(ref_id, "stageWithParallelBranches");
            branch.parent_stage_id = Some(parent_id);
            branch.synthetic_owner = Some(SyntheticStageOwner::Before);
            branch.is_parallel_branch = true;
            exec.stages.push(branch);
        }

        let branch1 = exec.stage_by_ref_id("1-1-branch1").unwrap().id;
        let branch2 = exec.stage_by_ref_id("1-2-branch2").unwrap().id;
        let branch3 = exec.stage_by_ref_id("1-3-branch3").unwrap().id;

        // Every branch still sees the rest of the contiguous parallel run
        // as its fallback "downstream" (harmless: StartStage's own
        // NOT_STARTED guard makes the resulting duplicates no-ops).
        assert_eq!(exec.downstream_of(branch1), vec![branch2, branch3]);
        assert_eq!(exec.downstream_of(branch2), vec![branch3]);
        assert_eq!(exec.downstream_of(branch3), Vec::<StageId>::new());
    }
}
