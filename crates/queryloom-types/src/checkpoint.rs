//! Checkpoint types for durable thread state.
//!
//! A `Checkpoint` is the persisted snapshot of one thread: its workflow
//! state, lifecycle status, and (when suspended) the node to resume at plus
//! the prompt shown to the user. One checkpoint per thread; saving is an
//! idempotent overwrite.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::{Candidate, WorkflowState};

/// Lifecycle status of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    Running,
    Suspended,
    Completed,
    Failed,
}

impl ThreadStatus {
    /// A thread in this status occupies its id: starting it again conflicts.
    pub fn is_active(&self) -> bool {
        matches!(self, ThreadStatus::Running | ThreadStatus::Suspended)
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, ThreadStatus::Suspended)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ThreadStatus::Completed | ThreadStatus::Failed)
    }
}

/// Payload returned to the caller when a thread parks at a suspend point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspendPrompt {
    /// Machine-readable tag for the kind of input awaited.
    pub action: String,
    /// Current candidate per producer, for display.
    pub candidates: Vec<Candidate>,
    /// Instruction lines shown to the user.
    pub question: Vec<String>,
}

/// The persisted snapshot of one thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// UUIDv7 thread id.
    pub thread_id: Uuid,
    /// Current lifecycle status.
    pub status: ThreadStatus,
    /// Full workflow state at the snapshot point.
    pub state: WorkflowState,
    /// Node to resume at; set only while suspended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspended_node: Option<String>,
    /// Prompt shown when the thread suspended; set only while suspended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<SuspendPrompt>,
    /// Producers dispatched by the most recent fan-out. Informational: the
    /// graph never suspends mid-fan-out, so nothing replays these.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_producers: Vec<String>,
    /// When the thread was first started.
    pub created_at: DateTime<Utc>,
    /// When this snapshot was taken.
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// A fresh RUNNING checkpoint for a newly started thread.
    pub fn new(thread_id: Uuid, state: WorkflowState) -> Self {
        let now = Utc::now();
        Self {
            thread_id,
            status: ThreadStatus::Running,
            state,
            suspended_node: None,
            prompt: None,
            pending_producers: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_checkpoint() -> Checkpoint {
        let mut cp = Checkpoint::new(
            Uuid::now_v7(),
            WorkflowState::new("how many orders shipped yesterday?"),
        );
        cp.status = ThreadStatus::Suspended;
        cp.suspended_node = Some("await_feedback".to_string());
        cp.prompt = Some(SuspendPrompt {
            action: "await_feedback".to_string(),
            candidates: vec![Candidate::new("basic", "SELECT COUNT(*) FROM orders")],
            question: vec![
                "Which query should run?".to_string(),
                "Reply 1, 2, or 3 to execute.".to_string(),
            ],
        });
        cp
    }

    #[test]
    fn test_status_helpers() {
        assert!(ThreadStatus::Running.is_active());
        assert!(ThreadStatus::Suspended.is_active());
        assert!(ThreadStatus::Suspended.is_suspended());
        assert!(!ThreadStatus::Completed.is_active());
        assert!(ThreadStatus::Completed.is_terminal());
        assert!(ThreadStatus::Failed.is_terminal());
        assert!(!ThreadStatus::Running.is_terminal());
    }

    #[test]
    fn test_status_serde_snake_case() {
        for (status, expected) in [
            (ThreadStatus::Running, "\"running\""),
            (ThreadStatus::Suspended, "\"suspended\""),
            (ThreadStatus::Completed, "\"completed\""),
            (ThreadStatus::Failed, "\"failed\""),
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, expected);
            let parsed: ThreadStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_new_checkpoint_is_running() {
        let cp = Checkpoint::new(Uuid::now_v7(), WorkflowState::new("q"));
        assert_eq!(cp.status, ThreadStatus::Running);
        assert!(cp.suspended_node.is_none());
        assert!(cp.prompt.is_none());
        assert_eq!(cp.created_at, cp.updated_at);
    }

    #[test]
    fn test_checkpoint_json_roundtrip() {
        let cp = sample_checkpoint();
        let json = serde_json::to_string(&cp).unwrap();
        let parsed: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cp);
        assert_eq!(parsed.suspended_node.as_deref(), Some("await_feedback"));
        assert_eq!(parsed.prompt.unwrap().candidates.len(), 1);
    }

    #[test]
    fn test_suspension_fields_omitted_when_absent() {
        let cp = Checkpoint::new(Uuid::now_v7(), WorkflowState::new("q"));
        let json = serde_json::to_string(&cp).unwrap();
        assert!(!json.contains("suspended_node"));
        assert!(!json.contains("prompt"));
        assert!(!json.contains("pending_producers"));
    }
}
