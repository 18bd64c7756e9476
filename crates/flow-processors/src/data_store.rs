//! Data store node: simulated storage operations
//!
//! Stands in for a database table during flow design. Reads return a fixed
//! sample result set so repeated runs stay comparable; writes acknowledge
//! the value they were given without persisting anything.

use std::collections::HashMap;

use async_trait::async_trait;
use flow_engine::{
    Processor, ProcessorCategory, ProcessorDescriptor, ProcessorMetadata, Result, DEFAULT_HANDLE,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::values::{parse_config, require_value, resolve_single};

/// Configuration for a data store node
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DataStoreConfig {
    /// One of `select`, `insert`, `update`, `delete` (default `select`)
    pub operation: Option<String>,
    /// Table name, echoed for logging only
    pub table: Option<String>,
    /// Query description, echoed back in select results
    pub query: Option<Value>,
}

/// Simulates select, insert, update, and delete against a store
#[derive(Debug, Clone, Copy, Default)]
pub struct DataStoreProcessor;

impl DataStoreProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessorDescriptor for DataStoreProcessor {
    fn descriptor() -> ProcessorMetadata {
        ProcessorMetadata::new(
            "data-store",
            ProcessorCategory::Storage,
            "Data Store",
            "Simulates storage reads and writes for flow design",
        )
    }
}

#[async_trait]
impl Processor for DataStoreProcessor {
    async fn process(
        &self,
        node_id: &str,
        inputs: HashMap<String, Value>,
        config: &Value,
    ) -> Result<Value> {
        let config: DataStoreConfig = parse_config(config, node_id)?;
        let input = resolve_single(&inputs);
        let operation = config.operation.as_deref().unwrap_or("select");
        log::debug!(
            "data store node '{}' runs '{}' on table '{}'",
            node_id,
            operation,
            config.table.as_deref().unwrap_or("records")
        );

        let output = match operation {
            "select" => json!({
                "success": true,
                "data": [
                    {"id": 1, "name": "Sample A", "value": 10},
                    {"id": 2, "name": "Sample B", "value": 20},
                ],
                "query": config.query,
                "input": input,
            }),
            "insert" => {
                let data = require_value(input, DEFAULT_HANDLE)?;
                json!({
                    "success": true,
                    "insertedId": Uuid::new_v4().to_string(),
                    "data": data,
                })
            }
            "update" => {
                let data = require_value(input, DEFAULT_HANDLE)?;
                json!({
                    "success": true,
                    "affected": 1,
                    "data": data,
                })
            }
            "delete" => json!({
                "success": true,
                "affected": 1,
            }),
            _ => json!({
                "success": false,
                "error": "Unknown operation",
            }),
        };
        Ok(output)
    }
}
