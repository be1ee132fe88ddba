//! Evaluator for `stageEnabled` expressions.
//!
//! Author-facing expressions are kept deliberately small: a boolean
//! literal, a context-key lookup, or an equality test against a context
//! value. There is no general-purpose templating language here: a typed,
//! closed evaluator beats embedding a scripting engine for a handful of
//! predicates.

use crate::domain::ContextMap;
use crate::error::{EngineError, EngineResult};

/// Evaluate a `stageEnabled.expression` string against the stage's
/// context. Recognized forms:
///
/// - `"true"` / `"false"` — literal.
/// - `"${context['key']}"` — truthy lookup (absent or `false`/`null` is
///   falsy, anything else is truthy).
/// - `"${context['key']} == 'value'"` — string equality against a context
///   value coerced to its display form.
pub fn evaluate(expression: &str, context: &ContextMap) -> EngineResult<bool> {
    let trimmed = expression.trim();

    match trimmed {
        "true" => return Ok(true),
        "false" => return Ok(false),
        _ => {}
    }

    if let Some((lhs, rhs)) = trimmed.split_once("==") {
        let actual = resolve_reference(lhs.trim(), context, expression)?;
        let expected = rhs.trim().trim_matches(|c| c == '\'' || c == '"');
        return Ok(actual == expected);
    }

    Ok(truthy(&resolve_value(trimmed, context, expression)?))
}

fn resolve_reference(reference: &str, context: &ContextMap, expression: &str) -> EngineResult<String> {
    let value = resolve_value(reference, context, expression)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

fn resolve_value(
    reference: &str,
    context: &ContextMap,
    expression: &str,
) -> EngineResult<serde_json::Value> {
    let key = parse_context_key(reference).ok_or_else(|| EngineError::ExpressionEvaluation {
        expression: expression.to_string(),
        reason: format!("unrecognized reference {reference:?}"),
    })?;
    Ok(context.get(&key).cloned().unwrap_or(serde_json::Value::Null))
}

/// Pulls `key` out of the `${context['key']}` form. Returns `None` for
/// anything else, which the caller surfaces as an evaluation error.
fn parse_context_key(reference: &str) -> Option<String> {
    let inner = reference.strip_prefix("${context[")?.strip_suffix("]}")?;
    let key = inner.trim_matches(|c| c == '\'' || c == '"');
    Some(key.to_string())
}

fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_true_and_false() {
        let ctx = ContextMap::new();
        assert!(evaluate("true", &ctx).unwrap());
        assert!(!evaluate("false", &ctx).unwrap());
    }

    #[test]
    fn context_lookup_is_truthy_when_present() {
        let mut ctx = ContextMap::new();
        ctx.insert("region".to_string(), serde_json::json!("us-east-1"));
        assert!(evaluate("${context['region']}", &ctx).unwrap());
    }

    #[test]
    fn context_lookup_is_falsy_when_absent() {
        let ctx = ContextMap::new();
        assert!(!evaluate("${context['region']}", &ctx).unwrap());
    }

    #[test]
    fn equality_against_a_context_value() {
        let mut ctx = ContextMap::new();
        ctx.insert("region".to_string(), serde_json::json!("us-east-1"));
        assert!(evaluate("${context['region']} == 'us-east-1'", &ctx).unwrap());
        assert!(!evaluate("${context['region']} == 'eu-west-1'", &ctx).unwrap());
    }

    #[test]
    fn unrecognized_reference_is_an_error() {
        let ctx = ContextMap::new();
        let err = evaluate("garbage", &ctx).unwrap_err();
        assert!(matches!(err, EngineError::ExpressionEvaluation { .. }));
    }
}
