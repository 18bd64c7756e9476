//! Event channel for reporting run progress
//!
//! Events are published from the run controller to any subscribed observer
//! (the editor UI, tests, log collectors). Each controller owns one channel;
//! there is no process-wide registry. Subscribers are isolated from each
//! other: a panicking callback is logged and swallowed so its siblings in
//! the same dispatch still get notified.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::{HistoryEntry, NodeId};

/// Identifier handed out by [`EventChannel::add_listener`] for later removal
pub type ListenerId = u64;

/// Callback invoked with each published event of the subscribed kind
pub type EventCallback = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

/// The event names observers can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A node finished and its output was recorded
    NodeExecuted,
    /// A run walked every node
    ExecutionComplete,
    /// A run aborted on an error
    ExecutionError,
}

/// Events emitted during workflow execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    /// A node finished; `data` is its recorded output
    #[serde(rename_all = "camelCase")]
    NodeExecuted {
        run_id: String,
        node_id: NodeId,
        data: serde_json::Value,
    },

    /// The run walked every node; carries the full data store and history
    #[serde(rename_all = "camelCase")]
    ExecutionComplete {
        run_id: String,
        data: HashMap<NodeId, serde_json::Value>,
        history: Vec<HistoryEntry>,
    },

    /// The run aborted; `node_id` names the failing node when one is known
    #[serde(rename_all = "camelCase")]
    ExecutionError {
        run_id: String,
        error: String,
        node_id: Option<NodeId>,
    },
}

impl EngineEvent {
    /// The subscription kind this event dispatches under
    pub fn kind(&self) -> EventKind {
        match self {
            Self::NodeExecuted { .. } => EventKind::NodeExecuted,
            Self::ExecutionComplete { .. } => EventKind::ExecutionComplete,
            Self::ExecutionError { .. } => EventKind::ExecutionError,
        }
    }
}

/// Publish/subscribe channel owned by one run controller
///
/// Listener storage is snapshotted before dispatch, so callbacks may add or
/// remove listeners, or call back into the controller (e.g. `stop()`),
/// without deadlocking.
pub struct EventChannel {
    listeners: Mutex<HashMap<EventKind, Vec<(ListenerId, EventCallback)>>>,
    next_id: AtomicU64,
}

impl EventChannel {
    /// Create a channel with no subscribers
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe a callback to one event kind
    ///
    /// Returns an id usable with [`remove_listener`](Self::remove_listener).
    pub fn add_listener<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Unsubscribe a previously added callback
    ///
    /// Returns whether a listener was actually removed.
    pub fn remove_listener(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        if let Some(subscribers) = listeners.get_mut(&kind) {
            let before = subscribers.len();
            subscribers.retain(|(listener_id, _)| *listener_id != id);
            return subscribers.len() != before;
        }
        false
    }

    /// Number of subscribers for an event kind
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .lock()
            .get(&kind)
            .map_or(0, |subscribers| subscribers.len())
    }

    /// Publish an event to every subscriber of its kind
    pub fn emit(&self, event: &EngineEvent) {
        let snapshot: Vec<EventCallback> = {
            let listeners = self.listeners.lock();
            match listeners.get(&event.kind()) {
                Some(subscribers) => subscribers
                    .iter()
                    .map(|(_, callback)| Arc::clone(callback))
                    .collect(),
                None => return,
            }
        };

        for callback in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                log::warn!("event listener panicked during {:?} dispatch", event.kind());
            }
        }
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// A listener that records every event it sees
///
/// Useful for testing and for hosts that want a polling view of recent
/// events.
pub struct RecordingListener {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingListener {
    /// Create a shared recorder
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    /// Build a callback that appends into this recorder
    pub fn callback(self: &Arc<Self>) -> impl Fn(&EngineEvent) + Send + Sync + 'static {
        let recorder = Arc::clone(self);
        move |event| recorder.events.lock().push(event.clone())
    }

    /// Get all recorded events
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Clear all recorded events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}
