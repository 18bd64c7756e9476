//! Transform node: reshapes values between pipeline stages
//!
//! Four transform types share this node: `map` runs an expression over the
//! input (element-wise for arrays), `extract` pulls a dot-path out of the
//! input, `merge` folds every input handle into one value under a chosen
//! strategy, and `restructure` builds a fresh object from a schema of
//! dot-paths. An unknown type degrades to passthrough.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use flow_engine::{
    EngineError, Processor, ProcessorCategory, ProcessorDescriptor, ProcessorMetadata, Result,
};
use serde::Deserialize;
use serde_json::Value;

use crate::expr::Expr;
use crate::values::{as_f64_lossy, extract_path, number_value, parse_config, resolve_single};

/// Configuration for a transform node
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransformConfig {
    /// One of `map`, `extract`, `merge`, `restructure` (default `map`)
    pub transform_type: Option<String>,
    /// Mapping expression for the `map` type, with the input bound as `data`
    pub transform: Option<String>,
    /// Dot-path for the `extract` type
    pub field_path: Option<String>,
    /// One of `combine`, `array`, `sum` for the `merge` type
    pub merge_strategy: Option<String>,
    /// Output-key to dot-path mapping for the `restructure` type
    pub schema: Option<BTreeMap<String, String>>,
}

/// Reshapes the input according to the configured transform type
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformProcessor;

impl TransformProcessor {
    pub fn new() -> Self {
        Self
    }

    fn map(input: Value, source: &str, node_id: &str) -> Result<Value> {
        let expr = Expr::parse(source, "data")
            .map_err(|e| EngineError::evaluation(format!("node '{}': {}", node_id, e)))?;
        match input {
            Value::Array(items) => {
                let mapped: std::result::Result<Vec<Value>, _> =
                    items.iter().map(|item| expr.eval(item)).collect();
                mapped
                    .map(Value::Array)
                    .map_err(|e| EngineError::evaluation(format!("node '{}': {}", node_id, e)))
            }
            other => expr
                .eval(&other)
                .map_err(|e| EngineError::evaluation(format!("node '{}': {}", node_id, e))),
        }
    }

    fn merge(inputs: &HashMap<String, Value>, strategy: &str) -> Value {
        // Handle order is lexicographic so the merge result does not depend
        // on hash iteration order.
        let ordered: BTreeMap<&String, &Value> = inputs.iter().collect();
        match strategy {
            "combine" => {
                let mut merged = serde_json::Map::new();
                for value in ordered.values() {
                    if let Value::Object(fields) = value {
                        merged.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                    }
                }
                Value::Object(merged)
            }
            "array" => Value::Array(ordered.values().map(|v| (*v).clone()).collect()),
            "sum" => {
                let total: f64 = ordered
                    .values()
                    .map(|v| as_f64_lossy(v).unwrap_or(0.0))
                    .sum();
                number_value(total)
            }
            _ => ordered
                .values()
                .next()
                .map(|v| (*v).clone())
                .unwrap_or(Value::Null),
        }
    }

    fn restructure(input: &Value, schema: &BTreeMap<String, String>) -> Value {
        Value::Object(
            schema
                .iter()
                .map(|(key, path)| (key.clone(), extract_path(input, path)))
                .collect(),
        )
    }
}

impl ProcessorDescriptor for TransformProcessor {
    fn descriptor() -> ProcessorMetadata {
        ProcessorMetadata::new(
            "transform",
            ProcessorCategory::Processing,
            "Transform",
            "Maps, extracts, merges, or restructures values between stages",
        )
    }
}

#[async_trait]
impl Processor for TransformProcessor {
    async fn process(
        &self,
        node_id: &str,
        inputs: HashMap<String, Value>,
        config: &Value,
    ) -> Result<Value> {
        let config: TransformConfig = parse_config(config, node_id)?;
        let transform_type = config.transform_type.as_deref().unwrap_or("map");
        log::debug!("transform node '{}' applies '{}'", node_id, transform_type);

        let output = match transform_type {
            "map" => {
                let input = resolve_single(&inputs);
                match config.transform.as_deref().filter(|s| !s.is_empty()) {
                    Some(source) => Self::map(input, source, node_id)?,
                    None => input,
                }
            }
            "extract" => {
                let input = resolve_single(&inputs);
                match config.field_path.as_deref().filter(|p| !p.is_empty()) {
                    Some(path) => extract_path(&input, path),
                    None => input,
                }
            }
            "merge" => Self::merge(
                &inputs,
                config.merge_strategy.as_deref().unwrap_or("combine"),
            ),
            "restructure" => {
                let input = resolve_single(&inputs);
                match &config.schema {
                    Some(schema) => Self::restructure(&input, schema),
                    None => input,
                }
            }
            _ => resolve_single(&inputs),
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn run(inputs: HashMap<String, Value>, config: Value) -> Result<Value> {
        TransformProcessor::new().process("t", inputs, &config).await
    }

    fn single(input: Value) -> HashMap<String, Value> {
        let mut inputs = HashMap::new();
        inputs.insert("default".to_string(), input);
        inputs
    }

    fn handles(entries: &[(&str, Value)]) -> HashMap<String, Value> {
        entries
            .iter()
            .map(|(handle, value)| (handle.to_string(), value.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_map_over_an_array() {
        let out = run(
            single(json!([1, 2, "3"])),
            json!({"transformType": "map", "transform": "data * 2"}),
        )
        .await
        .unwrap();
        assert_eq!(out, json!([2, 4, 6]));
    }

    #[tokio::test]
    async fn test_map_a_whole_value() {
        let out = run(
            single(json!({"n": 4})),
            json!({"transform": "data.n + 1"}),
        )
        .await
        .unwrap();
        assert_eq!(out, json!(5));
    }

    #[tokio::test]
    async fn test_map_without_expression_passes_through() {
        let out = run(single(json!([1, 2])), json!({"transformType": "map"}))
            .await
            .unwrap();
        assert_eq!(out, json!([1, 2]));
        let out = run(single(json!(7)), json!({"transform": ""})).await.unwrap();
        assert_eq!(out, json!(7));
    }

    #[tokio::test]
    async fn test_map_failure_stops_the_node() {
        let err = run(
            single(json!([1, {"not": "numeric"}])),
            json!({"transform": "data * 2"}),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().starts_with("Expression evaluation failed"));

        let err = run(single(json!(1)), json!({"transform": "data +"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("parse error"));
    }

    #[tokio::test]
    async fn test_extract() {
        let input = json!({"user": {"name": "ada"}, "items": [1, 2, 3]});
        let out = run(
            single(input.clone()),
            json!({"transformType": "extract", "fieldPath": "user.name"}),
        )
        .await
        .unwrap();
        assert_eq!(out, json!("ada"));

        let out = run(
            single(input.clone()),
            json!({"transformType": "extract", "fieldPath": "items.length"}),
        )
        .await
        .unwrap();
        assert_eq!(out, json!(3));

        // A missing path resolves to null; no path at all passes through.
        let out = run(
            single(input.clone()),
            json!({"transformType": "extract", "fieldPath": "user.age"}),
        )
        .await
        .unwrap();
        assert_eq!(out, Value::Null);

        let out = run(single(input.clone()), json!({"transformType": "extract"}))
            .await
            .unwrap();
        assert_eq!(out, input);
    }

    #[tokio::test]
    async fn test_merge_combine() {
        let out = run(
            handles(&[
                ("a", json!({"x": 1, "kept": true})),
                ("b", json!({"x": 9, "y": 2})),
                ("c", json!(5)),
            ]),
            json!({"transformType": "merge"}),
        )
        .await
        .unwrap();
        // Later handles override, and non-objects are skipped.
        assert_eq!(out, json!({"x": 9, "y": 2, "kept": true}));
    }

    #[tokio::test]
    async fn test_merge_array_and_sum() {
        let inputs = handles(&[("b", json!(2)), ("a", json!(1)), ("c", json!("3"))]);
        let out = run(
            inputs.clone(),
            json!({"transformType": "merge", "mergeStrategy": "array"}),
        )
        .await
        .unwrap();
        assert_eq!(out, json!([1, 2, "3"]));

        let out = run(
            inputs,
            json!({"transformType": "merge", "mergeStrategy": "sum"}),
        )
        .await
        .unwrap();
        assert_eq!(out, json!(6));
    }

    #[tokio::test]
    async fn test_merge_unknown_strategy_takes_the_first_handle() {
        let out = run(
            handles(&[("b", json!(2)), ("a", json!(1))]),
            json!({"transformType": "merge", "mergeStrategy": "pick"}),
        )
        .await
        .unwrap();
        assert_eq!(out, json!(1));

        let out = run(
            HashMap::new(),
            json!({"transformType": "merge", "mergeStrategy": "pick"}),
        )
        .await
        .unwrap();
        assert_eq!(out, Value::Null);
    }

    #[tokio::test]
    async fn test_restructure() {
        let out = run(
            single(json!({"user": {"name": "ada"}, "items": [1, 2]})),
            json!({
                "transformType": "restructure",
                "schema": {"name": "user.name", "count": "items.length", "missing": "user.age"}
            }),
        )
        .await
        .unwrap();
        assert_eq!(out, json!({"name": "ada", "count": 2, "missing": null}));
    }

    #[tokio::test]
    async fn test_unknown_type_passes_through() {
        let out = run(single(json!("v")), json!({"transformType": "reverse"}))
            .await
            .unwrap();
        assert_eq!(out, json!("v"));
    }
}
