//! Condition node: routes a value down a true or false branch
//!
//! Evaluates a boolean expression over the resolved input and emits a
//! record carrying the verdict, the branch value, and the original input.
//! A broken or missing condition takes the false branch instead of failing
//! the run; branching is control flow, not a data error.

use std::collections::HashMap;

use async_trait::async_trait;
use flow_engine::{Processor, ProcessorCategory, ProcessorDescriptor, ProcessorMetadata, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::expr::Expr;
use crate::values::{parse_config, resolve_single};

/// Configuration for a condition node
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConditionConfig {
    /// Boolean expression with the resolved value bound as `input`
    pub condition: Option<String>,
    /// Branch value when the condition holds
    pub true_value: Option<Value>,
    /// Branch value when the condition does not hold
    pub false_value: Option<Value>,
}

/// Evaluates a condition and picks the configured branch value
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionProcessor;

impl ConditionProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessorDescriptor for ConditionProcessor {
    fn descriptor() -> ProcessorMetadata {
        ProcessorMetadata::new(
            "condition",
            ProcessorCategory::Control,
            "Condition",
            "Evaluates a predicate and emits the matching branch value",
        )
    }
}

#[async_trait]
impl Processor for ConditionProcessor {
    async fn process(
        &self,
        node_id: &str,
        inputs: HashMap<String, Value>,
        config: &Value,
    ) -> Result<Value> {
        let config: ConditionConfig = parse_config(config, node_id)?;
        let input = resolve_single(&inputs);

        let verdict = match config.condition.as_deref().filter(|s| !s.is_empty()) {
            Some(source) => Expr::parse(source, "input")
                .and_then(|expr| expr.eval_bool(&input))
                .unwrap_or_else(|e| {
                    log::debug!("condition node '{}' fell to the false branch: {}", node_id, e);
                    false
                }),
            None => false,
        };
        let branch = if verdict {
            config.true_value
        } else {
            config.false_value
        };

        Ok(json!({
            "condition": verdict,
            "value": branch.unwrap_or(Value::Null),
            "input": input,
        }))
    }
}
