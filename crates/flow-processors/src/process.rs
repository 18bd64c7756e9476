//! Generic process node: small value transformations and pacing delays
//!
//! The workhorse node type for demo flows. Its operation is chosen by
//! configuration; anything unrecognized passes the input through unchanged,
//! which also makes this the natural fallback target for permissive
//! registries.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use flow_engine::{Processor, ProcessorCategory, ProcessorDescriptor, ProcessorMetadata, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::values::{number_value, parse_config, resolve_single};

/// Configuration for a process node
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessConfig {
    /// One of `passthrough`, `delay`, `multiply`, `uppercase`, `lowercase`
    pub operation: Option<String>,
    /// Sleep duration for the `delay` operation, in milliseconds
    pub delay_ms: Option<f64>,
    /// Multiplier for the `multiply` operation
    pub factor: Option<f64>,
}

/// Applies a configured operation to the resolved input value
///
/// Operations that do not apply to the input's type (multiplying a string,
/// uppercasing a number) leave the value untouched rather than failing, so
/// a loosely wired demo flow keeps moving.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericProcessor;

impl GenericProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessorDescriptor for GenericProcessor {
    fn descriptor() -> ProcessorMetadata {
        ProcessorMetadata::new(
            "process",
            ProcessorCategory::Processing,
            "Process",
            "Applies simple transformations such as multiply, case changes, or a delay",
        )
    }
}

#[async_trait]
impl Processor for GenericProcessor {
    async fn process(
        &self,
        node_id: &str,
        inputs: HashMap<String, Value>,
        config: &Value,
    ) -> Result<Value> {
        let config: ProcessConfig = parse_config(config, node_id)?;
        let input = resolve_single(&inputs);
        let operation = config.operation.as_deref().unwrap_or("passthrough");
        log::debug!("process node '{}' runs operation '{}'", node_id, operation);

        let output = match operation {
            "delay" => {
                let millis = config.delay_ms.unwrap_or(1000.0).max(0.0) as u64;
                if millis > 0 {
                    tokio::time::sleep(Duration::from_millis(millis)).await;
                }
                input
            }
            "multiply" => {
                let factor = config.factor.unwrap_or(1.0);
                // Only numbers multiply; other types pass through untouched.
                match input.as_f64() {
                    Some(f) => number_value(f * factor),
                    None => input,
                }
            }
            "uppercase" => match input {
                Value::String(s) => Value::String(s.to_uppercase()),
                other => other,
            },
            "lowercase" => match input {
                Value::String(s) => Value::String(s.to_lowercase()),
                other => other,
            },
            _ => input,
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Instant;

    async fn run(input: Value, config: Value) -> Value {
        let mut inputs = HashMap::new();
        inputs.insert("default".to_string(), input);
        GenericProcessor::new()
            .process("p", inputs, &config)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_passthrough_is_the_default() {
        assert_eq!(run(json!({"a": 1}), Value::Null).await, json!({"a": 1}));
        assert_eq!(run(json!(5), json!({})).await, json!(5));
        assert_eq!(
            run(json!(5), json!({"operation": "mystery"})).await,
            json!(5)
        );
    }

    #[tokio::test]
    async fn test_multiply() {
        assert_eq!(
            run(json!(5), json!({"operation": "multiply", "factor": 3})).await,
            json!(15)
        );
        // A missing factor multiplies by one; an explicit zero is honored.
        assert_eq!(run(json!(5), json!({"operation": "multiply"})).await, json!(5));
        assert_eq!(
            run(json!(5), json!({"operation": "multiply", "factor": 0})).await,
            json!(0)
        );
        assert_eq!(
            run(json!(2.5), json!({"operation": "multiply", "factor": 2})).await,
            json!(5)
        );
    }

    #[tokio::test]
    async fn test_multiply_leaves_non_numbers_alone() {
        assert_eq!(
            run(json!("abc"), json!({"operation": "multiply", "factor": 3})).await,
            json!("abc")
        );
        assert_eq!(
            run(json!([1, 2]), json!({"operation": "multiply", "factor": 3})).await,
            json!([1, 2])
        );
    }

    #[tokio::test]
    async fn test_case_operations() {
        assert_eq!(
            run(json!("Hello"), json!({"operation": "uppercase"})).await,
            json!("HELLO")
        );
        assert_eq!(
            run(json!("Hello"), json!({"operation": "lowercase"})).await,
            json!("hello")
        );
        assert_eq!(run(json!(7), json!({"operation": "uppercase"})).await, json!(7));
    }

    #[tokio::test]
    async fn test_delay_waits_then_passes_through() {
        let start = Instant::now();
        let out = run(json!("x"), json!({"operation": "delay", "delayMs": 30})).await;
        assert_eq!(out, json!("x"));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_delay_of_zero_does_not_sleep() {
        let out = run(json!("x"), json!({"operation": "delay", "delayMs": 0})).await;
        assert_eq!(out, json!("x"));
    }

    #[tokio::test]
    async fn test_malformed_config_is_rejected() {
        let mut inputs = HashMap::new();
        inputs.insert("default".to_string(), json!(1));
        let err = GenericProcessor::new()
            .process("p", inputs, &json!({"operation": 5}))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Configuration error"));
    }
}
