//! Workflow run controller
//!
//! The controller owns all mutable state of a run: the data store of node
//! outputs, the history log, and the lifecycle status. It is the only
//! writer; observers receive clones through events or snapshots, so no
//! state can be mutated from outside a run.
//!
//! Execution is strictly sequential. Exactly one processor runs at a time
//! in the order produced by [`build_execution_order`], with a cooperative
//! stop check between nodes. A processor that is already in flight (e.g.
//! awaiting an HTTP response) always finishes before a stop takes effect.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::json;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::events::{EngineEvent, EventChannel, EventKind, ListenerId};
use crate::order::build_execution_order;
use crate::registry::ProcessorRegistry;
use crate::types::{HistoryEntry, NodeId, RunSnapshot, RunStatus, WorkflowGraph};

/// Default pacing delay between nodes, in milliseconds
pub const DEFAULT_SPEED_MS: u64 = 1000;

/// Mutable run state, guarded by one mutex
struct RunState {
    status: RunStatus,
    store: HashMap<NodeId, serde_json::Value>,
    history: Vec<HistoryEntry>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            status: RunStatus::Idle,
            store: HashMap::new(),
            history: Vec::new(),
        }
    }
}

/// Build a node's input mapping from its incoming edges
///
/// Edges are read in edge-list order and keyed by handle, so when two
/// edges deliver into the same handle the later edge wins. Edges whose
/// source has not produced a value are skipped.
fn gather_inputs(
    store: &HashMap<NodeId, serde_json::Value>,
    graph: &WorkflowGraph,
    node_id: &str,
) -> HashMap<String, serde_json::Value> {
    let mut inputs = HashMap::new();
    for edge in graph.incoming_edges(node_id) {
        if let Some(value) = store.get(&edge.source) {
            inputs.insert(edge.handle.clone(), value.clone());
        }
    }
    inputs
}

/// Drives workflow graphs through sequential, observable executions
///
/// One controller runs at most one workflow at a time; re-entrant
/// [`execute_workflow`](Self::execute_workflow) calls are rejected. The
/// controller keeps the results of the last run until the next run or a
/// [`reset`](Self::reset).
pub struct RunController {
    registry: Arc<ProcessorRegistry>,
    channel: EventChannel,
    state: Mutex<RunState>,
    stop_requested: AtomicBool,
    speed_ms: AtomicU64,
}

impl RunController {
    /// Create a controller dispatching through the given registry
    pub fn new(registry: Arc<ProcessorRegistry>) -> Self {
        Self {
            registry,
            channel: EventChannel::new(),
            state: Mutex::new(RunState::default()),
            stop_requested: AtomicBool::new(false),
            speed_ms: AtomicU64::new(DEFAULT_SPEED_MS),
        }
    }

    /// Set the pacing delay between nodes
    pub fn with_speed_ms(self, ms: u64) -> Self {
        self.speed_ms.store(ms, Ordering::Relaxed);
        self
    }

    /// Get the processor registry this controller dispatches through
    pub fn registry(&self) -> &Arc<ProcessorRegistry> {
        &self.registry
    }

    /// Execute a workflow graph from start to finish
    ///
    /// Nodes run strictly sequentially in the order produced by
    /// [`build_execution_order`]. Input-type nodes are seeded before the
    /// walk from `input_bindings`, falling back to their `defaultValue`
    /// configuration, else null; they are announced during the walk but
    /// never dispatched. Every other node is dispatched through the
    /// registry with the inputs gathered from its incoming edges.
    ///
    /// Progress is reported through the event channel; the returned result
    /// is secondary. A stopped run still returns `Ok(())`, and a failing
    /// run emits its error before returning it.
    ///
    /// Fails with [`EngineError::AlreadyRunning`] when a run is in
    /// progress. That rejection is not reported on the event channel, so
    /// listeners of the in-flight run see nothing.
    pub async fn execute_workflow(
        &self,
        graph: &WorkflowGraph,
        input_bindings: HashMap<NodeId, serde_json::Value>,
    ) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.status.is_running() {
                return Err(EngineError::AlreadyRunning);
            }
            state.status = RunStatus::Running;
            state.store.clear();
            state.history.clear();
        }
        self.stop_requested.store(false, Ordering::SeqCst);

        let run_id = format!("run-{}", Uuid::new_v4());
        let started = Instant::now();
        log::info!(
            "starting run {}: {} node(s), {} edge(s)",
            run_id,
            graph.nodes.len(),
            graph.edges.len()
        );

        // Duplicate ids would corrupt the write-once store, reject up front.
        let mut seen = HashSet::new();
        for node in &graph.nodes {
            if !seen.insert(node.id.as_str()) {
                let error = EngineError::InvalidGraph(format!("duplicate node id '{}'", node.id));
                return Err(self.fail_run(&run_id, error, Some(node.id.clone())));
            }
        }

        // The cycle check runs before any seeding so that an invalid graph
        // leaves the store untouched.
        let order = match build_execution_order(graph) {
            Ok(order) => order,
            Err(error) => return Err(self.fail_run(&run_id, error, None)),
        };

        {
            let mut state = self.state.lock();
            for node in graph.input_nodes() {
                let seeded = input_bindings
                    .get(&node.id)
                    .filter(|v| !v.is_null())
                    .cloned()
                    .or_else(|| node.config_value("defaultValue").cloned())
                    .unwrap_or(serde_json::Value::Null);
                state.store.insert(node.id.clone(), seeded.clone());
                state.history.push(HistoryEntry::now(&node.id, json!({}), seeded));
            }
        }

        for node_id in &order {
            if self.stop_requested.load(Ordering::SeqCst) {
                log::info!("run {} stopped before node '{}'", run_id, node_id);
                let mut state = self.state.lock();
                // reset() may already have returned the controller to idle.
                if state.status == RunStatus::Running {
                    state.status = RunStatus::Stopped;
                }
                return Ok(());
            }

            // Seeded nodes already hold their value; announce without
            // dispatching so the store and history keep one entry each.
            let seeded = self.state.lock().store.get(node_id).cloned();
            if let Some(value) = seeded {
                self.channel.emit(&EngineEvent::NodeExecuted {
                    run_id: run_id.clone(),
                    node_id: node_id.clone(),
                    data: value,
                });
                self.pace().await;
                continue;
            }

            let node = match graph.find_node(node_id) {
                Some(node) => node,
                None => continue,
            };

            let inputs = {
                let state = self.state.lock();
                gather_inputs(&state.store, graph, node_id)
            };
            let input_record = serde_json::Value::Object(
                inputs
                    .iter()
                    .map(|(handle, value)| (handle.clone(), value.clone()))
                    .collect(),
            );

            log::debug!(
                "run {}: dispatching node '{}' ({}) with {} input(s)",
                run_id,
                node_id,
                node.node_type,
                inputs.len()
            );
            let processor = match self.registry.processor_for(&node.node_type) {
                Ok(processor) => processor,
                Err(error) => return Err(self.fail_run(&run_id, error, Some(node_id.clone()))),
            };
            let output = match processor.process(node_id, inputs, &node.config).await {
                Ok(output) => output,
                Err(error) => return Err(self.fail_run(&run_id, error, Some(node_id.clone()))),
            };

            {
                let mut state = self.state.lock();
                if state.store.contains_key(node_id) {
                    log::warn!(
                        "run {}: node '{}' already has a stored result, keeping the first",
                        run_id,
                        node_id
                    );
                } else {
                    state.store.insert(node_id.clone(), output.clone());
                }
                state
                    .history
                    .push(HistoryEntry::now(node_id, input_record, output.clone()));
            }

            self.channel.emit(&EngineEvent::NodeExecuted {
                run_id: run_id.clone(),
                node_id: node_id.clone(),
                data: output,
            });
            self.pace().await;
        }

        let (data, history) = {
            let mut state = self.state.lock();
            state.status = RunStatus::Completed;
            (state.store.clone(), state.history.clone())
        };
        log::info!(
            "run {} completed: {} node(s) in {:?}",
            run_id,
            order.len(),
            started.elapsed()
        );
        self.channel.emit(&EngineEvent::ExecutionComplete {
            run_id,
            data,
            history,
        });
        Ok(())
    }

    /// Request that the current run stop before its next node
    ///
    /// The flag is observed at the top of each walk iteration; a processor
    /// already in flight finishes first. Idempotent, and a no-op for the
    /// run after this one since each run clears the flag on entry.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Clear all run results and return the controller to idle
    ///
    /// Works from any state. An in-flight walk is asked to stop so it does
    /// not keep writing into the cleared store.
    pub fn reset(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        *self.state.lock() = RunState::default();
    }

    /// Update the pacing delay between nodes
    ///
    /// Takes effect from the next walk iteration, including mid-run.
    pub fn set_speed(&self, ms: u64) {
        self.speed_ms.store(ms, Ordering::Relaxed);
    }

    /// Get the current pacing delay in milliseconds
    pub fn speed_ms(&self) -> u64 {
        self.speed_ms.load(Ordering::Relaxed)
    }

    /// Whether a run is currently in progress
    pub fn is_running(&self) -> bool {
        self.state.lock().status.is_running()
    }

    /// Get a point-in-time copy of the controller state
    pub fn snapshot(&self) -> RunSnapshot {
        let state = self.state.lock();
        RunSnapshot {
            status: state.status,
            running: state.status.is_running(),
            current_data: state.store.clone(),
            history: state.history.clone(),
            speed_ms: self.speed_ms.load(Ordering::Relaxed),
        }
    }

    /// Subscribe a callback to one event kind
    pub fn add_listener<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.channel.add_listener(kind, callback)
    }

    /// Unsubscribe a previously added callback
    pub fn remove_listener(&self, kind: EventKind, id: ListenerId) -> bool {
        self.channel.remove_listener(kind, id)
    }

    /// Mark the run failed and report the error before returning it
    fn fail_run(&self, run_id: &str, error: EngineError, node_id: Option<NodeId>) -> EngineError {
        self.state.lock().status = RunStatus::Failed;
        log::error!("run {} failed: {}", run_id, error);
        self.channel.emit(&EngineEvent::ExecutionError {
            run_id: run_id.to_string(),
            error: error.to_string(),
            node_id,
        });
        error
    }

    /// Suspend between nodes so progress is observable
    async fn pace(&self) {
        let speed = self.speed_ms.load(Ordering::Relaxed);
        if speed > 0 {
            tokio::time::sleep(Duration::from_millis(speed)).await;
        }
    }
}
