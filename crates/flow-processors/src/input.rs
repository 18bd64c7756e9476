//! Input node: seeds a workflow run with a configured value
//!
//! During a run the controller resolves input nodes itself (external
//! bindings win over the configured default), so this processor only runs
//! when an input node is dispatched outside that path, for example through
//! a registry fallback or a standalone call. It applies the same
//! configuration chain the controller uses.

use std::collections::HashMap;

use async_trait::async_trait;
use flow_engine::{
    Processor, ProcessorCategory, ProcessorDescriptor, ProcessorMetadata, Result, INPUT_NODE_TYPE,
};
use serde::Deserialize;
use serde_json::Value;

use crate::values::parse_config;

/// Configuration for an input node
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InputConfig {
    /// Value produced by this node
    pub value: Option<Value>,
    /// Fallback when no value is configured
    pub default_value: Option<Value>,
}

/// Produces a configured value to start a flow
#[derive(Debug, Clone, Copy, Default)]
pub struct InputProcessor;

impl InputProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessorDescriptor for InputProcessor {
    fn descriptor() -> ProcessorMetadata {
        ProcessorMetadata::new(
            INPUT_NODE_TYPE,
            ProcessorCategory::Input,
            "Input",
            "Provides a configured or externally bound value to start a flow",
        )
    }
}

#[async_trait]
impl Processor for InputProcessor {
    async fn process(
        &self,
        node_id: &str,
        _inputs: HashMap<String, Value>,
        config: &Value,
    ) -> Result<Value> {
        let config: InputConfig = parse_config(config, node_id)?;
        let seeded = config.value.or(config.default_value).unwrap_or(Value::Null);
        log::debug!("input node '{}' produced {}", node_id, seeded);
        Ok(seeded)
    }
}
