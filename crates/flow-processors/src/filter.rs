//! Filter node: keeps the values that satisfy a predicate
//!
//! The predicate is either a boolean expression over `item` or a simple
//! field comparison taken from the configuration. Arrays are filtered
//! element-wise preserving order; a scalar either passes unchanged or
//! becomes null. With no predicate configured the node keeps everything.

use std::collections::HashMap;

use async_trait::async_trait;
use flow_engine::{
    EngineError, Processor, ProcessorCategory, ProcessorDescriptor, ProcessorMetadata, Result,
};
use serde::Deserialize;
use serde_json::Value;

use crate::expr::Expr;
use crate::values::{as_f64_lossy, coerce_string, extract_path, parse_config, resolve_single, value_eq};

/// Configuration for a filter node
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterConfig {
    /// Boolean expression with each candidate bound as `item`; takes
    /// precedence over the field comparison
    pub condition: Option<String>,
    /// Dot-path into each candidate for the field comparison
    pub field: Option<String>,
    /// One of `equals`, `not_equals`, `greater_than`, `less_than`,
    /// `contains`, `exists` (default `equals`)
    pub operator: Option<String>,
    /// Comparison operand for the field comparison
    pub value: Option<Value>,
}

/// Drops values that fail the configured predicate
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterProcessor;

impl FilterProcessor {
    pub fn new() -> Self {
        Self
    }
}

fn field_matches(actual: &Value, operator: &str, expected: &Value) -> bool {
    match operator {
        "equals" => value_eq(actual, expected),
        "not_equals" => !value_eq(actual, expected),
        "greater_than" => compare_numeric(actual, expected, |a, b| a > b),
        "less_than" => compare_numeric(actual, expected, |a, b| a < b),
        "contains" => coerce_string(actual).contains(&coerce_string(expected)),
        "exists" => !actual.is_null(),
        // An unrecognized operator filters nothing out.
        _ => true,
    }
}

fn compare_numeric(actual: &Value, expected: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    // A missing field never orders; without this guard null would coerce
    // to zero and `less_than` would match vacuously.
    if actual.is_null() || expected.is_null() {
        return false;
    }
    match (as_f64_lossy(actual), as_f64_lossy(expected)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

impl ProcessorDescriptor for FilterProcessor {
    fn descriptor() -> ProcessorMetadata {
        ProcessorMetadata::new(
            "filter",
            ProcessorCategory::Processing,
            "Filter",
            "Keeps array elements or scalars that satisfy a predicate",
        )
    }
}

#[async_trait]
impl Processor for FilterProcessor {
    async fn process(
        &self,
        node_id: &str,
        inputs: HashMap<String, Value>,
        config: &Value,
    ) -> Result<Value> {
        let config: FilterConfig = parse_config(config, node_id)?;
        let input = resolve_single(&inputs);

        let expr = match config.condition.as_deref().filter(|s| !s.is_empty()) {
            Some(source) => Some(
                Expr::parse(source, "item")
                    .map_err(|e| EngineError::evaluation(format!("node '{}': {}", node_id, e)))?,
            ),
            None => None,
        };
        let field = config.field.as_deref().filter(|s| !s.is_empty());
        let operator = config.operator.as_deref().unwrap_or("equals");
        let expected = config.value.clone().unwrap_or(Value::Null);
        log::debug!(
            "filter node '{}' uses {}",
            node_id,
            if expr.is_some() {
                "an expression predicate"
            } else if field.is_some() {
                "a field comparison"
            } else {
                "no predicate"
            }
        );

        let matches = |item: &Value| -> Result<bool> {
            if let Some(expr) = &expr {
                return expr
                    .eval_bool(item)
                    .map_err(|e| EngineError::evaluation(format!("node '{}': {}", node_id, e)));
            }
            match field {
                Some(path) => Ok(field_matches(&extract_path(item, path), operator, &expected)),
                None => Ok(true),
            }
        };

        let output = match input {
            Value::Array(items) => {
                let mut kept = Vec::new();
                for item in items {
                    if matches(&item)? {
                        kept.push(item);
                    }
                }
                Value::Array(kept)
            }
            other => {
                if matches(&other)? {
                    other
                } else {
                    Value::Null
                }
            }
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn run(input: Value, config: Value) -> Result<Value> {
        let mut inputs = HashMap::new();
        inputs.insert("default".to_string(), input);
        FilterProcessor::new().process("f", inputs, &config).await
    }

    #[tokio::test]
    async fn test_expression_predicate_over_an_array() {
        let out = run(
            json!([{"score": 80}, {"score": 20}, {"score": 50}]),
            json!({"condition": "item.score >= 50"}),
        )
        .await
        .unwrap();
        assert_eq!(out, json!([{"score": 80}, {"score": 50}]));
    }

    #[tokio::test]
    async fn test_expression_predicate_on_a_scalar() {
        let out = run(json!(9), json!({"condition": "item > 5"})).await.unwrap();
        assert_eq!(out, json!(9));
        let out = run(json!(3), json!({"condition": "item > 5"})).await.unwrap();
        assert_eq!(out, Value::Null);
    }

    #[tokio::test]
    async fn test_expression_failure_stops_the_node() {
        let err = run(json!([2, 0]), json!({"condition": "100 / item"}))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Expression evaluation failed"));

        let err = run(json!([1]), json!({"condition": "item >"})).await.unwrap_err();
        assert!(err.to_string().contains("parse error"));
    }

    #[tokio::test]
    async fn test_field_comparisons() {
        let rows = json!([
            {"name": "a", "value": 1},
            {"name": "b", "value": 3},
            {"name": "c", "value": 5},
        ]);
        let out = run(
            rows.clone(),
            json!({"field": "value", "operator": "greater_than", "value": 2}),
        )
        .await
        .unwrap();
        assert_eq!(out, json!([{"name": "b", "value": 3}, {"name": "c", "value": 5}]));

        let out = run(
            rows.clone(),
            json!({"field": "value", "operator": "equals", "value": 3.0}),
        )
        .await
        .unwrap();
        assert_eq!(out, json!([{"name": "b", "value": 3}]));

        let out = run(
            rows.clone(),
            json!({"field": "value", "operator": "not_equals", "value": 3}),
        )
        .await
        .unwrap();
        assert_eq!(out, json!([{"name": "a", "value": 1}, {"name": "c", "value": 5}]));

        let out = run(
            rows,
            json!({"field": "name", "operator": "contains", "value": "b"}),
        )
        .await
        .unwrap();
        assert_eq!(out, json!([{"name": "b", "value": 3}]));
    }

    #[tokio::test]
    async fn test_missing_fields_never_order() {
        let rows = json!([{"value": 1}, {"other": true}]);
        let out = run(
            rows.clone(),
            json!({"field": "value", "operator": "less_than", "value": 10}),
        )
        .await
        .unwrap();
        assert_eq!(out, json!([{"value": 1}]));

        let out = run(rows, json!({"field": "value", "operator": "exists"}))
            .await
            .unwrap();
        assert_eq!(out, json!([{"value": 1}]));
    }

    #[tokio::test]
    async fn test_no_predicate_keeps_everything() {
        let out = run(json!([1, 2]), Value::Null).await.unwrap();
        assert_eq!(out, json!([1, 2]));
        let out = run(json!([1, 2]), json!({"condition": "", "field": ""}))
            .await
            .unwrap();
        assert_eq!(out, json!([1, 2]));
    }

    #[tokio::test]
    async fn test_unknown_operator_keeps_everything() {
        let out = run(
            json!([{"v": 1}, {"v": 2}]),
            json!({"field": "v", "operator": "approximately", "value": 1}),
        )
        .await
        .unwrap();
        assert_eq!(out, json!([{"v": 1}, {"v": 2}]));
    }
}
