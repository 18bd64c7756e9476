//! Execution order construction
//!
//! Builds a deterministic topological order over a workflow graph using
//! Kahn's algorithm. Ties are broken only by node-list position: the queue
//! is seeded with zero-in-degree nodes in the order they appear in the
//! graph, and successors are relaxed in edge-list order. The same node and
//! edge arrays therefore always produce the same order.

use std::collections::{HashMap, VecDeque};

use crate::error::{EngineError, Result};
use crate::types::{NodeId, WorkflowGraph};

/// Compute the execution order for a graph
///
/// Returns node ids such that every edge's source precedes its target.
/// Fails with [`EngineError::Cycle`] when the graph is not a DAG; the check
/// runs to completion before anything executes, so a rejected graph never
/// runs partially. Edges referencing unknown nodes are skipped, matching
/// the input-gathering rule that absent sources contribute nothing.
/// Duplicate node ids are undefined input; the controller rejects them
/// before asking for an order.
pub fn build_execution_order(graph: &WorkflowGraph) -> Result<Vec<NodeId>> {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    for node in &graph.nodes {
        in_degree.entry(node.id.as_str()).or_insert(0);
    }
    for edge in &graph.edges {
        // A self-loop counts too: the node never reaches zero in-degree.
        if in_degree.contains_key(edge.source.as_str()) {
            if let Some(deg) = in_degree.get_mut(edge.target.as_str()) {
                *deg += 1;
            }
        }
    }

    // Seed in node-list order; this is the only tie-break.
    let mut queue: VecDeque<&str> = graph
        .nodes
        .iter()
        .filter(|n| in_degree.get(n.id.as_str()) == Some(&0))
        .map(|n| n.id.as_str())
        .collect();

    let mut order: Vec<NodeId> = Vec::with_capacity(graph.nodes.len());
    while let Some(node_id) = queue.pop_front() {
        order.push(node_id.to_string());
        for edge in &graph.edges {
            if edge.source == node_id {
                if let Some(deg) = in_degree.get_mut(edge.target.as_str()) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(edge.target.as_str());
                    }
                }
            }
        }
    }

    if order.len() < graph.nodes.len() {
        return Err(EngineError::Cycle);
    }
    Ok(order)
}
