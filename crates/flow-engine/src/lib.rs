//! Flow Engine - Graph-based workflow execution for Cartograph
//!
//! This crate runs editor-authored workflow graphs: nodes carry a type tag
//! and a JSON configuration, edges deliver one node's output into a named
//! input handle of another. A run walks the graph in topological order,
//! strictly one node at a time, and reports progress through an event
//! channel. It supports:
//!
//! - Deterministic topological ordering with pre-run cycle rejection
//! - An explicit processor registry keyed by node type tag
//! - Seeded input nodes with per-run input bindings
//! - A write-once data store plus a per-node history log
//! - Cooperative stop, reset, and adjustable pacing between nodes
//!
//! # Architecture
//!
//! - [`order`]: Kahn's algorithm over the node and edge lists
//! - [`registry`]: maps node type tags to [`Processor`] implementations
//! - [`controller`]: owns run state and drives the sequential walk
//! - [`events`]: publish/subscribe channel for run progress
//! - [`validation`]: advisory pre-run graph checks for the editor
//!
//! # Example
//!
//! ```ignore
//! use flow_engine::{ProcessorRegistry, RunController, WorkflowGraph};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(ProcessorRegistry::new());
//! let controller = RunController::new(registry);
//! let graph: WorkflowGraph = serde_json::from_str(graph_json)?;
//! controller.execute_workflow(&graph, bindings).await?;
//! ```

pub mod controller;
pub mod error;
pub mod events;
pub mod order;
pub mod registry;
pub mod types;
pub mod validation;

// Re-export key types
pub use controller::{RunController, DEFAULT_SPEED_MS};
pub use error::{EngineError, Result};
pub use events::{EngineEvent, EventChannel, EventKind, ListenerId, RecordingListener};
pub use order::build_execution_order;
pub use registry::{Processor, ProcessorDescriptor, ProcessorMetadata, ProcessorRegistry};
pub use types::{
    GraphEdge, GraphNode, HistoryEntry, NodeId, ProcessorCategory, RunSnapshot, RunStatus,
    WorkflowGraph, DEFAULT_HANDLE, INPUT_NODE_TYPE,
};
pub use validation::{validate_graph, ValidationError};
