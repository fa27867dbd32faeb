//! Workflow state for a Queryloom query session.
//!
//! `WorkflowState` is the data bag threaded through every node of a session.
//! Nodes never mutate state directly; they return a sparse `StateUpdate` and
//! the engine applies it through the per-field merge policy defined here:
//! plain scalars overwrite, `candidates` and `transcript` append, and
//! nullable fields use `Patch` to distinguish "leave unchanged" from "clear".

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// WorkflowState
// ---------------------------------------------------------------------------

/// Accumulated state of one query session thread.
///
/// Immutable between steps; the engine owns the only mutable copy during a
/// walk and snapshots it into a checkpoint at every parking point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// The user's natural-language question.
    pub user_request: String,
    /// Most recent free-form feedback supplied at a suspend point.
    #[serde(default)]
    pub user_feedback: String,
    /// Query text chosen at the selection suspend point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_query: Option<String>,
    /// Every candidate ever produced, in merge order. Never truncated by the
    /// engine; `latest_for` / `latest_per_producer` give the current view.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    /// Schema-refinement notes copied from the chosen candidate.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refinement_notes: Vec<String>,
    /// Rendered result of executing the selected query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_result: Option<String>,
    /// Execution fault captured as data; routes the walk to the error terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Conversation log rendered to the user at the end of a session.
    #[serde(default)]
    pub transcript: Vec<TranscriptEntry>,
}

impl WorkflowState {
    /// Create the initial state for a new thread.
    ///
    /// The request is also recorded as the first transcript entry.
    pub fn new(user_request: impl Into<String>) -> Self {
        let user_request = user_request.into();
        Self {
            user_feedback: String::new(),
            selected_query: None,
            candidates: Vec::new(),
            refinement_notes: Vec::new(),
            execution_result: None,
            error: None,
            transcript: vec![TranscriptEntry::user(user_request.clone())],
            user_request,
        }
    }

    /// Merge a sparse update into this state.
    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(v) = update.user_request {
            self.user_request = v;
        }
        if let Some(v) = update.user_feedback {
            self.user_feedback = v;
        }
        update.selected_query.apply_to(&mut self.selected_query);
        self.candidates.extend(update.candidates);
        match update.refinement_notes {
            Patch::Keep => {}
            Patch::Clear => self.refinement_notes.clear(),
            Patch::Set(v) => self.refinement_notes = v,
        }
        update.execution_result.apply_to(&mut self.execution_result);
        update.error.apply_to(&mut self.error);
        self.transcript.extend(update.transcript);
    }

    /// The most recent candidate for one producer, if any.
    pub fn latest_for(&self, producer: &str) -> Option<&Candidate> {
        self.candidates.iter().rev().find(|c| c.producer == producer)
    }

    /// The current candidate per producer, ordered by each producer's first
    /// appearance in the history. Display layers use this instead of the raw
    /// (unbounded) history.
    pub fn latest_per_producer(&self) -> Vec<&Candidate> {
        let mut order: Vec<&str> = Vec::new();
        for candidate in &self.candidates {
            if !order.contains(&candidate.producer.as_str()) {
                order.push(&candidate.producer);
            }
        }
        order
            .into_iter()
            .filter_map(|producer| self.latest_for(producer))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// One generated query candidate, keyed by the producer that made it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Name of the generation strategy that produced this entry.
    pub producer: String,
    /// The proposed query text. For a faulted candidate this is an
    /// explanatory placeholder, never executable.
    pub query: String,
    /// Schema-refinement suggestions (advanced strategy only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    /// Generation fault captured as data; the fan-out still joins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Candidate {
    /// A successful candidate with no suggestions.
    pub fn new(producer: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            producer: producer.into(),
            query: query.into(),
            suggestions: Vec::new(),
            error: None,
        }
    }

    /// A candidate recording a generation fault. The query text becomes a
    /// placeholder so selection of a faulted candidate is visibly wrong
    /// rather than silently executable.
    pub fn faulted(producer: impl Into<String>, fault: &str) -> Self {
        Self {
            producer: producer.into(),
            query: format!("-- Error: {fault}"),
            suggestions: Vec::new(),
            error: Some(fault.to_string()),
        }
    }

    pub fn is_faulted(&self) -> bool {
        self.error.is_some()
    }
}

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

/// Who said a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One line of the session conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub text: String,
}

impl TranscriptEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// StateUpdate
// ---------------------------------------------------------------------------

/// Tri-state patch for a nullable field: leave it, clear it, or set it.
///
/// `Option` alone cannot express "clear", and the gateway node must reset
/// stale fields at the start of every generation cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Patch<T> {
    #[default]
    Keep,
    Clear,
    Set(T),
}

impl<T> Patch<T> {
    /// Apply this patch to an optional slot.
    pub fn apply_to(self, slot: &mut Option<T>) {
        match self {
            Patch::Keep => {}
            Patch::Clear => *slot = None,
            Patch::Set(v) => *slot = Some(v),
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }
}

/// A sparse state update returned by one node.
///
/// The default value changes nothing; nodes fill in only the fields they
/// own. `candidates` and `transcript` are append lists (empty = no-op).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub selected_query: Patch<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub refinement_notes: Patch<Vec<String>>,
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub execution_result: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_keep")]
    pub error: Patch<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transcript: Vec<TranscriptEntry>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
