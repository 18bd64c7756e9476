//! Output node: surfaces the final value of a branch
//!
//! Carries no configuration. The node's value is whatever arrives on its
//! inputs, resolved down to a single working value, which makes the run's
//! result readable from the data store under the output node's id.

use std::collections::HashMap;

use async_trait::async_trait;
use flow_engine::{Processor, ProcessorCategory, ProcessorDescriptor, ProcessorMetadata, Result};
use serde_json::Value;

use crate::values::resolve_single;

/// Passes the resolved input through as the branch result
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputProcessor;

impl OutputProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessorDescriptor for OutputProcessor {
    fn descriptor() -> ProcessorMetadata {
        ProcessorMetadata::new(
            "output",
            ProcessorCategory::Output,
            "Output",
            "Exposes the value arriving at the end of a branch",
        )
    }
}

#[async_trait]
impl Processor for OutputProcessor {
    async fn process(
        &self,
        node_id: &str,
        inputs: HashMap<String, Value>,
        _config: &Value,
    ) -> Result<Value> {
        let value = resolve_single(&inputs);
        log::debug!("output node '{}' captured its result", node_id);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inputs(entries: &[(&str, Value)]) -> HashMap<String, Value> {
        entries
            .iter()
            .map(|(handle, value)| (handle.to_string(), value.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_passes_the_single_input_through() {
        let out = OutputProcessor::new()
            .process("out", inputs(&[("default", json!({"total": 9}))]), &Value::Null)
            .await
            .unwrap();
        assert_eq!(out, json!({"total": 9}));
    }

    #[tokio::test]
    async fn test_no_inputs_is_null() {
        let out = OutputProcessor::new()
            .process("out", HashMap::new(), &Value::Null)
            .await
            .unwrap();
        assert_eq!(out, Value::Null);
    }

    #[tokio::test]
    async fn test_multiple_handles_collapse_to_an_object() {
        let out = OutputProcessor::new()
            .process(
                "out",
                inputs(&[("b", json!(2)), ("a", json!(1))]),
                &Value::Null,
            )
            .await
            .unwrap();
        assert_eq!(out, json!({"a": 1, "b": 2}));
    }
}
