//! Aggregate node: reduces an array to a summary value
//!
//! Operations optionally scope each element through a dot-path first, so
//! `sum` over `order.total` works on an array of order objects. Non-array
//! inputs pass through untouched, as does any unrecognized operation.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use flow_engine::{Processor, ProcessorCategory, ProcessorDescriptor, ProcessorMetadata, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::values::{as_f64_lossy, coerce_string, extract_path, number_value, parse_config, resolve_single};

/// Configuration for an aggregate node
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AggregateConfig {
    /// One of `count`, `sum`, `average`, `min`, `max`, `group_by`
    /// (default `count`)
    pub operation: Option<String>,
    /// Dot-path applied to each element before aggregating
    pub field: Option<String>,
}

/// Reduces an array input to a count, sum, average, extremum, or grouping
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateProcessor;

impl AggregateProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessorDescriptor for AggregateProcessor {
    fn descriptor() -> ProcessorMetadata {
        ProcessorMetadata::new(
            "aggregate",
            ProcessorCategory::Processing,
            "Aggregate",
            "Reduces an array to a count, sum, average, extremum, or grouping",
        )
    }
}

#[async_trait]
impl Processor for AggregateProcessor {
    async fn process(
        &self,
        node_id: &str,
        inputs: HashMap<String, Value>,
        config: &Value,
    ) -> Result<Value> {
        let config: AggregateConfig = parse_config(config, node_id)?;
        let input = resolve_single(&inputs);
        let Value::Array(items) = input else {
            return Ok(input);
        };

        let operation = config.operation.as_deref().unwrap_or("count");
        let field = config.field.as_deref().filter(|f| !f.is_empty());
        log::debug!(
            "aggregate node '{}' runs '{}' over {} items",
            node_id,
            operation,
            items.len()
        );

        let scoped = |item: &Value| match field {
            Some(path) => extract_path(item, path),
            None => item.clone(),
        };
        let numeric = |item: &Value| as_f64_lossy(&scoped(item)).unwrap_or(0.0);

        let output = match operation {
            "count" => Value::from(items.len()),
            "sum" => number_value(items.iter().map(&numeric).sum()),
            "average" => {
                if items.is_empty() {
                    Value::from(0)
                } else {
                    let total: f64 = items.iter().map(&numeric).sum();
                    number_value(total / items.len() as f64)
                }
            }
            "min" => items
                .iter()
                .map(&numeric)
                .reduce(f64::min)
                .map(number_value)
                .unwrap_or(Value::Null),
            "max" => items
                .iter()
                .map(&numeric)
                .reduce(f64::max)
                .map(number_value)
                .unwrap_or(Value::Null),
            "group_by" => {
                // BTreeMap keeps group keys sorted; items within a group
                // preserve encounter order.
                let mut groups: BTreeMap<String, Vec<Value>> = BTreeMap::new();
                for item in &items {
                    groups
                        .entry(coerce_string(&scoped(item)))
                        .or_default()
                        .push(item.clone());
                }
                Value::Object(
                    groups
                        .into_iter()
                        .map(|(key, members)| (key, Value::Array(members)))
                        .collect(),
                )
            }
            _ => Value::Array(items),
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn run(input: Value, config: Value) -> Value {
        let mut inputs = HashMap::new();
        inputs.insert("default".to_string(), input);
        AggregateProcessor::new()
            .process("agg", inputs, &config)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_count_is_the_default() {
        assert_eq!(run(json!([1, 2, 3, 4]), Value::Null).await, json!(4));
        assert_eq!(run(json!([]), json!({"operation": "count"})).await, json!(0));
    }

    #[tokio::test]
    async fn test_sum_with_a_field_scope() {
        let rows = json!([{"n": 2}, {"n": 3}, {"n": "4"}, {"other": 9}]);
        let out = run(rows, json!({"operation": "sum", "field": "n"})).await;
        // Numeric strings coerce; missing fields count as zero.
        assert_eq!(out, json!(9));
    }

    #[tokio::test]
    async fn test_average() {
        let out = run(json!([2, 4, 6]), json!({"operation": "average"})).await;
        assert_eq!(out, json!(4));
        let out = run(json!([1, 2]), json!({"operation": "average"})).await;
        assert_eq!(out, json!(1.5));
        // An empty array averages to zero rather than dividing by zero.
        let out = run(json!([]), json!({"operation": "average"})).await;
        assert_eq!(out, json!(0));
    }

    #[tokio::test]
    async fn test_min_and_max() {
        let rows = json!([{"v": 5}, {"v": -2}, {"v": 9}]);
        assert_eq!(
            run(rows.clone(), json!({"operation": "min", "field": "v"})).await,
            json!(-2)
        );
        assert_eq!(
            run(rows, json!({"operation": "max", "field": "v"})).await,
            json!(9)
        );
        // No elements means no extremum.
        assert_eq!(run(json!([]), json!({"operation": "min"})).await, Value::Null);
        assert_eq!(run(json!([]), json!({"operation": "max"})).await, Value::Null);
    }

    #[tokio::test]
    async fn test_group_by() {
        let rows = json!([
            {"kind": "a", "n": 1},
            {"kind": "b", "n": 2},
            {"kind": "a", "n": 3},
        ]);
        let out = run(rows, json!({"operation": "group_by", "field": "kind"})).await;
        assert_eq!(
            out,
            json!({
                "a": [{"kind": "a", "n": 1}, {"kind": "a", "n": 3}],
                "b": [{"kind": "b", "n": 2}],
            })
        );
    }

    #[tokio::test]
    async fn test_group_by_coerces_keys() {
        let out = run(
            json!([{"k": 1}, {"k": 1}, {"no_k": true}]),
            json!({"operation": "group_by", "field": "k"}),
        )
        .await;
        assert_eq!(
            out,
            json!({
                "1": [{"k": 1}, {"k": 1}],
                "null": [{"no_k": true}],
            })
        );
    }

    #[tokio::test]
    async fn test_non_arrays_pass_through() {
        assert_eq!(
            run(json!({"not": "an array"}), json!({"operation": "sum"})).await,
            json!({"not": "an array"})
        );
        assert_eq!(run(json!(7), Value::Null).await, json!(7));
    }

    #[tokio::test]
    async fn test_unknown_operation_passes_through() {
        assert_eq!(
            run(json!([1, 2]), json!({"operation": "median"})).await,
            json!([1, 2])
        );
    }
}
