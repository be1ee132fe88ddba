//! Stage context — the only part of a stage's free-form context map the
//! engine itself interprets.
//!
//! Everything else in a context map is opaque and passed through to task
//! implementations and parameter substitution untouched.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type ContextMap = HashMap<String, serde_json::Value>;

/// `stageEnabled` — `{type, expression}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEnabledExpression {
    #[serde(rename = "type")]
    pub expr_type: String,
    pub expression: String,
}

/// Typed access to the handful of context keys the engine cares about.
/// Named accessors instead of repeated `get("key").and_then(...)` call
/// sites scattered through handlers.
pub trait StageContextExt {
    fn stage_enabled(&self) -> Option<StageEnabledExpression>;
    fn restrict_execution_during_time_window(&self) -> bool;
    fn fail_pipeline(&self) -> bool;
    fn continue_pipeline(&self) -> bool;
}

impl StageContextExt for ContextMap {
    fn stage_enabled(&self) -> Option<StageEnabledExpression> {
        self.get("stageEnabled")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    fn restrict_execution_during_time_window(&self) -> bool {
        self.get("restrictExecutionDuringTimeWindow")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    fn fail_pipeline(&self) -> bool {
        self.get("failPipeline")
            .and_then(|v| v.as_bool())
            .unwrap_or(true)
    }

    fn continue_pipeline(&self) -> bool {
        self.get("continuePipeline")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_absent() {
        let ctx = ContextMap::new();
        assert!(ctx.stage_enabled().is_none());
        assert!(!ctx.restrict_execution_during_time_window());
        assert!(ctx.fail_pipeline());
        assert!(!ctx.continue_pipeline());
    }

    #[test]
    fn reads_stage_enabled_expression() {
        let mut ctx = ContextMap::new();
        ctx.insert(
            "stageEnabled".to_string(),
            serde_json::json!({"type": "expression", "expression": "false"}),
        );
        let expr = ctx.stage_enabled().unwrap();
        assert_eq!(expr.expr_type, "expression");
        assert_eq!(expr.expression, "false");
    }

    #[test]
    fn explicit_false_overrides_default() {
        let mut ctx = ContextMap::new();
        ctx.insert("failPipeline".to_string(), serde_json::json!(false));
        ctx.insert("continuePipeline".to_string(), serde_json::json!(true));
        assert!(!ctx.fail_pipeline());
        assert!(ctx.continue_pipeline());
    }
}
