//! Processor registry for node type dispatch
//!
//! Maps node type tags to processor implementations and their palette
//! metadata. Registration is explicit: the registry holds a closed set of
//! types, and resolving an unregistered tag is an error. A fallback type can
//! be configured to restore the permissive legacy behavior (route unknown
//! tags through a generic processor), but only as a deliberate opt-in,
//! since silent fallback masks configuration typos.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::types::ProcessorCategory;

/// Per-node-type unit of work
///
/// A processor handles exactly one node type. It receives the gathered
/// handle-to-value input mapping and the node's configuration, and produces
/// the node's output value. Processors may suspend on I/O (network calls,
/// artificial delays); the run controller awaits them one at a time.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Execute this node type against the gathered inputs
    async fn process(
        &self,
        node_id: &str,
        inputs: HashMap<String, serde_json::Value>,
        config: &serde_json::Value,
    ) -> Result<serde_json::Value>;
}

/// Trait for processors that describe their own palette metadata
///
/// Implementing this keeps a processor's behavior and its editor-facing
/// definition in one place.
pub trait ProcessorDescriptor {
    /// Get the static metadata for this processor type
    fn descriptor() -> ProcessorMetadata
    where
        Self: Sized;
}

/// Palette metadata for a processor type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorMetadata {
    /// Unique type tag (e.g. "external-call")
    pub node_type: String,
    /// Category for palette grouping
    pub category: ProcessorCategory,
    /// Human-readable label
    pub label: String,
    /// Description of what the processor does
    pub description: String,
}

impl ProcessorMetadata {
    /// Create metadata for a node type
    pub fn new(
        node_type: impl Into<String>,
        category: ProcessorCategory,
        label: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            node_type: node_type.into(),
            category,
            label: label.into(),
            description: description.into(),
        }
    }
}

/// A registration entry pairing metadata with its processor
struct RegistryEntry {
    metadata: ProcessorMetadata,
    processor: Arc<dyn Processor>,
}

/// Registry of node types with their metadata and processors
///
/// Registries can be composed by merging, letting a host add custom types
/// on top of the built-in set.
#[derive(Default)]
pub struct ProcessorRegistry {
    entries: HashMap<String, RegistryEntry>,
    fallback: Option<String>,
}

impl ProcessorRegistry {
    /// Create a new empty registry (strict: unknown types are errors)
    pub fn new() -> Self {
        Self::default()
    }

    /// Route unknown node types through the given registered type
    ///
    /// This restores the legacy permissive dispatch. The fallback type must
    /// itself be registered or resolution still fails.
    pub fn with_fallback(mut self, node_type: impl Into<String>) -> Self {
        self.fallback = Some(node_type.into());
        self
    }

    /// Register a node type with its metadata and processor
    pub fn register(&mut self, metadata: ProcessorMetadata, processor: Arc<dyn Processor>) {
        self.entries.insert(
            metadata.node_type.clone(),
            RegistryEntry {
                metadata,
                processor,
            },
        );
    }

    /// Resolve the processor for a node type
    ///
    /// Unregistered types fail with [`EngineError::UnknownNodeType`] unless
    /// a fallback is configured and registered.
    pub fn processor_for(&self, node_type: &str) -> Result<Arc<dyn Processor>> {
        if let Some(entry) = self.entries.get(node_type) {
            return Ok(Arc::clone(&entry.processor));
        }
        if let Some(fallback) = &self.fallback {
            if let Some(entry) = self.entries.get(fallback) {
                log::debug!(
                    "no processor for node type '{}', falling back to '{}'",
                    node_type,
                    fallback
                );
                return Ok(Arc::clone(&entry.processor));
            }
            log::warn!(
                "fallback node type '{}' is not registered; cannot resolve '{}'",
                fallback,
                node_type
            );
        }
        Err(EngineError::UnknownNodeType(node_type.to_string()))
    }

    /// Whether a node type resolves (directly or via the fallback)
    pub fn can_resolve(&self, node_type: &str) -> bool {
        if self.entries.contains_key(node_type) {
            return true;
        }
        self.fallback
            .as_ref()
            .is_some_and(|fallback| self.entries.contains_key(fallback))
    }

    /// Whether a node type is registered directly
    pub fn has_node_type(&self, node_type: &str) -> bool {
        self.entries.contains_key(node_type)
    }

    /// Get the metadata for a registered node type
    pub fn metadata(&self, node_type: &str) -> Option<&ProcessorMetadata> {
        self.entries.get(node_type).map(|entry| &entry.metadata)
    }

    /// Get metadata for every registered type, sorted by type tag
    pub fn all_metadata(&self) -> Vec<&ProcessorMetadata> {
        let mut all: Vec<_> = self.entries.values().map(|e| &e.metadata).collect();
        all.sort_by(|a, b| a.node_type.cmp(&b.node_type));
        all
    }

    /// Get the registered type tags, sorted
    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<_> = self.entries.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Merge another registry into this one
    ///
    /// Entries from `other` win on tag collisions; its fallback, if set,
    /// replaces this registry's.
    pub fn merge(&mut self, other: ProcessorRegistry) {
        self.entries.extend(other.entries);
        if other.fallback.is_some() {
            self.fallback = other.fallback;
        }
    }
}
