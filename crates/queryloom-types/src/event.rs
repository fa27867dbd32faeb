//! Event types for the Queryloom engine event bus.
//!
//! `EngineEvent` is the unified event type broadcast while a thread walks
//! the graph. All variants are Clone + Send + Sync for use with tokio
//! broadcast channels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events emitted during a thread's walk through the graph.
///
/// Used by the event bus to communicate lifecycle progress to subscribers
/// (CLI spinner, logging).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A new thread began walking from the start node.
    ThreadStarted { thread_id: Uuid, node: String },

    /// The walk entered a node.
    NodeEntered { thread_id: Uuid, node: String },

    /// A fan-out node dispatched concurrent producer tasks.
    FanOutDispatched {
        thread_id: Uuid,
        node: String,
        targets: Vec<String>,
    },

    /// One fan-out branch finished (successfully or with a captured fault).
    ProducerCompleted {
        thread_id: Uuid,
        producer: String,
        faulted: bool,
    },

    /// The thread parked at a suspend point awaiting external input.
    ThreadSuspended { thread_id: Uuid, node: String },

    /// A suspended thread was given input and continued its walk.
    ThreadResumed { thread_id: Uuid, node: String },

    /// The thread reached a terminal node.
    ThreadCompleted { thread_id: Uuid, node: String },

    /// The engine could not carry the thread to a terminal.
    ThreadFailed { thread_id: Uuid, reason: String },
}

impl EngineEvent {
    /// The thread this event belongs to (for subscriber filtering).
    pub fn thread_id(&self) -> Uuid {
        match self {
            EngineEvent::ThreadStarted { thread_id, .. }
            | EngineEvent::NodeEntered { thread_id, .. }
            | EngineEvent::FanOutDispatched { thread_id, .. }
            | EngineEvent::ProducerCompleted { thread_id, .. }
            | EngineEvent::ThreadSuspended { thread_id, .. }
            | EngineEvent::ThreadResumed { thread_id, .. }
            | EngineEvent::ThreadCompleted { thread_id, .. }
            | EngineEvent::ThreadFailed { thread_id, .. } => *thread_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
