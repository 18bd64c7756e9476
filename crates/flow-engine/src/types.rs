//! Core types for workflow graphs
//!
//! These types define the structure of a workflow graph (nodes, edges,
//! per-node configuration) plus the run-facing records the engine produces
//! while executing one: history entries, run status, and state snapshots.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for an edge
pub type EdgeId = String;

/// Node type tag for seedable input nodes
///
/// Nodes carrying this tag are initialized from the run's input bindings
/// before the walk starts and are not dispatched again during it.
pub const INPUT_NODE_TYPE: &str = "input";

/// The input slot an edge delivers into when none is named
pub const DEFAULT_HANDLE: &str = "default";

fn default_handle() -> String {
    DEFAULT_HANDLE.to_string()
}

/// Category of a processor, used for palette grouping in the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorCategory {
    /// Seed data entry points
    Input,
    /// Terminal display/export sinks
    Output,
    /// Data shaping (process, transform, filter, aggregate)
    Processing,
    /// Control flow (conditions)
    Control,
    /// Outbound integrations (HTTP calls)
    Integration,
    /// Table-backed operations
    Storage,
}

/// A node instance in a graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Unique identifier for this node instance
    pub id: NodeId,
    /// Node type tag, resolved through the processor registry
    #[serde(rename = "type")]
    pub node_type: String,
    /// Per-node configuration, owned by the editor and read-only during a run
    #[serde(default)]
    pub config: serde_json::Value,
}

impl GraphNode {
    /// Create a node with an empty configuration
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            config: serde_json::Value::Null,
        }
    }

    /// Create a node with the given configuration
    pub fn with_config(
        id: impl Into<String>,
        node_type: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            config,
        }
    }

    /// Read a configuration key, treating an explicit null as absent
    pub fn config_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.config.get(key).filter(|v| !v.is_null())
    }
}

/// A directed data dependency between two nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    /// Unique identifier for this edge
    pub id: EdgeId,
    /// Source node ID
    pub source: NodeId,
    /// Target node ID
    pub target: NodeId,
    /// Input slot on the target node this edge delivers into
    #[serde(default = "default_handle")]
    pub handle: String,
}

impl GraphEdge {
    /// Create an edge delivering into the default handle
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            handle: default_handle(),
        }
    }

    /// Name the input slot this edge delivers into
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = handle.into();
        self
    }
}

/// A complete workflow graph
///
/// Node and edge order is significant: the order builder breaks ties by
/// node-list position and gathers fan-in by edge-list position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowGraph {
    /// Nodes in the graph
    pub nodes: Vec<GraphNode>,
    /// Edges connecting nodes
    pub edges: Vec<GraphEdge>,
}

impl WorkflowGraph {
    /// Create a graph from node and edge lists
    pub fn new(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        Self { nodes, edges }
    }

    /// Find a node by ID
    pub fn find_node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Get edges coming into a node, in edge-list order
    pub fn incoming_edges<'a>(
        &'a self,
        node_id: &'a str,
    ) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    /// Get edges going out of a node, in edge-list order
    pub fn outgoing_edges<'a>(
        &'a self,
        node_id: &'a str,
    ) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// Get the input-type nodes, in node-list order
    pub fn input_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|n| n.node_type == INPUT_NODE_TYPE)
    }
}

/// Lifecycle status of a run controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No run in progress and none finished since the last reset
    Idle,
    /// A run is walking the execution order
    Running,
    /// The last run walked every node
    Completed,
    /// The last run was stopped before finishing
    Stopped,
    /// The last run aborted on an error
    Failed,
}

impl RunStatus {
    /// Whether a run is currently in progress
    pub fn is_running(&self) -> bool {
        matches!(self, RunStatus::Running)
    }
}

/// Audit record for one executed node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// The node that executed
    pub node_id: NodeId,
    /// When the node finished
    pub timestamp: DateTime<Utc>,
    /// The gathered handle-to-value mapping the node saw
    pub input: serde_json::Value,
    /// The value the node produced
    pub output: serde_json::Value,
}

impl HistoryEntry {
    /// Record an entry stamped with the current time
    pub fn now(
        node_id: impl Into<String>,
        input: serde_json::Value,
        output: serde_json::Value,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            timestamp: Utc::now(),
            input,
            output,
        }
    }
}

/// Point-in-time view of controller state for polling consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    /// Current lifecycle status
    pub status: RunStatus,
    /// Whether a run is in progress
    pub running: bool,
    /// Node outputs produced so far by the current or last run
    pub current_data: HashMap<NodeId, serde_json::Value>,
    /// Per-node audit records for the current or last run
    pub history: Vec<HistoryEntry>,
    /// Pacing delay between nodes, in milliseconds
    pub speed_ms: u64,
}
