//! Graph validation for workflow graphs
//!
//! Validates graph structure (unique node ids, edge references) and detects
//! cycles. All findings are collected so an editor can surface every problem
//! at once rather than stopping at the first.

use std::collections::HashSet;

use crate::order::build_execution_order;
use crate::registry::ProcessorRegistry;
use crate::types::WorkflowGraph;

/// Validation error with location context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Cycle detected in the graph
    CycleDetected,
    /// Two nodes share an id
    DuplicateNodeId { node_id: String },
    /// An edge references a non-existent node
    UnknownNode { edge_id: String, node_id: String },
    /// A node has a type the registry cannot resolve
    UnknownNodeType { node_id: String, node_type: String },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CycleDetected => write!(f, "Cycle detected in graph"),
            Self::DuplicateNodeId { node_id } => {
                write!(f, "Duplicate node id '{}'", node_id)
            }
            Self::UnknownNode { edge_id, node_id } => {
                write!(f, "Edge '{}' references unknown node '{}'", edge_id, node_id)
            }
            Self::UnknownNodeType { node_id, node_type } => {
                write!(f, "Unknown node type '{}' for node '{}'", node_type, node_id)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a workflow graph
///
/// Returns all validation errors found (not just the first).
/// Pass a registry to also check that every node type resolves; the check
/// honors a configured fallback, so permissive registries accept any tag.
pub fn validate_graph(
    graph: &WorkflowGraph,
    registry: Option<&ProcessorRegistry>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_unique_node_ids(graph, &mut errors);
    validate_edge_references(graph, &mut errors);
    detect_cycles(graph, &mut errors);

    if let Some(reg) = registry {
        validate_node_types(graph, reg, &mut errors);
    }

    errors
}

/// Check that node ids are unique
fn validate_unique_node_ids(graph: &WorkflowGraph, errors: &mut Vec<ValidationError>) {
    let mut seen: HashSet<&str> = HashSet::new();
    for node in &graph.nodes {
        if !seen.insert(node.id.as_str()) {
            errors.push(ValidationError::DuplicateNodeId {
                node_id: node.id.clone(),
            });
        }
    }
}

/// Check that all edge source/target nodes exist
fn validate_edge_references(graph: &WorkflowGraph, errors: &mut Vec<ValidationError>) {
    let node_ids: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();

    for edge in &graph.edges {
        if !node_ids.contains(edge.source.as_str()) {
            errors.push(ValidationError::UnknownNode {
                edge_id: edge.id.clone(),
                node_id: edge.source.clone(),
            });
        }
        if !node_ids.contains(edge.target.as_str()) {
            errors.push(ValidationError::UnknownNode {
                edge_id: edge.id.clone(),
                node_id: edge.target.clone(),
            });
        }
    }
}

/// Detect cycles via the order builder
fn detect_cycles(graph: &WorkflowGraph, errors: &mut Vec<ValidationError>) {
    if build_execution_order(graph).is_err() {
        errors.push(ValidationError::CycleDetected);
    }
}

/// Check that every node type resolves through the registry
fn validate_node_types(
    graph: &WorkflowGraph,
    registry: &ProcessorRegistry,
    errors: &mut Vec<ValidationError>,
) {
    for node in &graph.nodes {
        if !registry.can_resolve(&node.node_type) {
            errors.push(ValidationError::UnknownNodeType {
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Processor, ProcessorMetadata};
    use crate::types::{GraphEdge, GraphNode, ProcessorCategory};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct NoopProcessor;

    #[async_trait]
    impl Processor for NoopProcessor {
        async fn process(
            &self,
            _node_id: &str,
            _inputs: HashMap<String, serde_json::Value>,
            _config: &serde_json::Value,
        ) -> crate::error::Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
    }

    fn registry_with(types: &[&str]) -> ProcessorRegistry {
        let mut registry = ProcessorRegistry::new();
        for ty in types {
            registry.register(
                ProcessorMetadata::new(*ty, ProcessorCategory::Processing, *ty, ""),
                Arc::new(NoopProcessor),
            );
        }
        registry
    }

    #[test]
    fn test_valid_graph_has_no_errors() {
        let graph = WorkflowGraph::new(
            vec![GraphNode::new("a", "input"), GraphNode::new("b", "output")],
            vec![GraphEdge::new("e1", "a", "b")],
        );
        assert!(validate_graph(&graph, None).is_empty());
    }

    #[test]
    fn test_duplicate_node_ids_reported() {
        let graph = WorkflowGraph::new(
            vec![GraphNode::new("a", "input"), GraphNode::new("a", "output")],
            vec![],
        );
        let errors = validate_graph(&graph, None);
        assert!(errors.contains(&ValidationError::DuplicateNodeId {
            node_id: "a".to_string()
        }));
    }

    #[test]
    fn test_dangling_edges_reported() {
        let graph = WorkflowGraph::new(
            vec![GraphNode::new("a", "input")],
            vec![GraphEdge::new("e1", "a", "ghost"), GraphEdge::new("e2", "phantom", "a")],
        );
        let errors = validate_graph(&graph, None);
        assert!(errors.contains(&ValidationError::UnknownNode {
            edge_id: "e1".to_string(),
            node_id: "ghost".to_string()
        }));
        assert!(errors.contains(&ValidationError::UnknownNode {
            edge_id: "e2".to_string(),
            node_id: "phantom".to_string()
        }));
    }

    #[test]
    fn test_cycle_reported() {
        let graph = WorkflowGraph::new(
            vec![GraphNode::new("a", "process"), GraphNode::new("b", "process")],
            vec![GraphEdge::new("e1", "a", "b"), GraphEdge::new("e2", "b", "a")],
        );
        let errors = validate_graph(&graph, None);
        assert!(errors.contains(&ValidationError::CycleDetected));
    }

    #[test]
    fn test_unknown_node_type_with_strict_registry() {
        let graph = WorkflowGraph::new(vec![GraphNode::new("a", "mystery")], vec![]);
        let registry = registry_with(&["process"]);
        let errors = validate_graph(&graph, Some(&registry));
        assert!(errors.contains(&ValidationError::UnknownNodeType {
            node_id: "a".to_string(),
            node_type: "mystery".to_string()
        }));
    }

    #[test]
    fn test_fallback_registry_accepts_any_type() {
        let graph = WorkflowGraph::new(vec![GraphNode::new("a", "mystery")], vec![]);
        let registry = registry_with(&["process"]).with_fallback("process");
        assert!(validate_graph(&graph, Some(&registry)).is_empty());
    }

    #[test]
    fn test_all_errors_collected() {
        let graph = WorkflowGraph::new(
            vec![
                GraphNode::new("a", "process"),
                GraphNode::new("a", "process"),
                GraphNode::new("b", "process"),
            ],
            vec![
                GraphEdge::new("e1", "a", "b"),
                GraphEdge::new("e2", "b", "a"),
                GraphEdge::new("e3", "ghost", "b"),
            ],
        );
        let errors = validate_graph(&graph, None);
        assert!(errors.len() >= 3);
    }
}
