//! Durable walk engine: steps threads through a frozen [`Graph`].
//!
//! The engine owns the three mechanics every walk shares: merging node
//! updates into the thread state, persisting checkpoints at each durability
//! point, and publishing lifecycle events. Node handlers stay pure state
//! functions.
//!
//! Durability contract: a RUNNING checkpoint is written before the first
//! node runs, a SUSPENDED checkpoint is written before a suspension is
//! returned to the caller, and a COMPLETED/FAILED checkpoint is written
//! before a terminal result is returned. A crash at any point leaves a
//! resumable or inspectable snapshot behind.

use std::sync::Arc;

use queryloom_types::checkpoint::{Checkpoint, SuspendPrompt, ThreadStatus};
use queryloom_types::event::EngineEvent;
use queryloom_types::state::{Patch, StateUpdate, WorkflowState};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::engine::checkpoint::{CheckpointError, CheckpointManager};
use crate::engine::graph::{Edge, Graph, NodeFault, NodeKind};
use crate::event::bus::EventBus;
use crate::repository::checkpoint::CheckpointRepository;

// ---------------------------------------------------------------------------
// Result type
// ---------------------------------------------------------------------------

/// Snapshot handed back to the caller when a walk stops.
///
/// A walk stops for exactly one of three reasons: the thread suspended
/// (`prompt` is populated), it completed, or it failed. The matching
/// checkpoint is already durable by the time this value exists.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// Thread this walk belongs to.
    pub thread_id: Uuid,

    /// Status recorded in the checkpoint: suspended, completed, or failed.
    pub status: ThreadStatus,

    /// Merged state at the stopping point.
    pub state: WorkflowState,

    /// Prompt for the caller, present only when the thread suspended.
    pub prompt: Option<SuspendPrompt>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Walks threads through a shared, immutable graph.
///
/// One engine serves any number of threads concurrently; the graph is behind
/// an `Arc` and per-thread state travels with the checkpoint.
pub struct Engine<R: CheckpointRepository> {
    graph: Arc<Graph>,
    checkpoints: CheckpointManager<R>,
    events: EventBus,
}

impl<R: CheckpointRepository> Engine<R> {
    /// Create an engine over a validated graph and checkpoint backend.
    pub fn new(graph: Graph, repository: R, events: EventBus) -> Self {
        Self {
            graph: Arc::new(graph),
            checkpoints: CheckpointManager::new(repository),
            events,
        }
    }

    /// Event bus carrying thread lifecycle events.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Checkpoint manager, for status lookups outside a walk.
    pub fn checkpoints(&self) -> &CheckpointManager<R> {
        &self.checkpoints
    }

    /// The graph this engine walks.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Start a new thread for `request` and walk until it suspends, completes,
    /// or fails.
    ///
    /// Rejected with [`EngineError::DuplicateThread`] while a running or
    /// suspended checkpoint exists under the same id. Completed and failed
    /// threads may be restarted; their checkpoint is overwritten.
    pub async fn start(&self, thread_id: Uuid, request: &str) -> Result<ExecutionResult, EngineError> {
        if let Some(existing) = self.checkpoints.load(thread_id).await? {
            if existing.status.is_active() {
                return Err(EngineError::DuplicateThread(thread_id));
            }
        }

        let state = WorkflowState::new(request);
        let mut checkpoint = self.checkpoints.begin(thread_id, state).await?;

        let entry = self.graph.start_node().to_string();
        self.events.publish(EngineEvent::ThreadStarted {
            thread_id,
            node: entry.clone(),
        });
        tracing::info!(thread_id = %thread_id, "starting thread");

        self.walk(&mut checkpoint, entry, None).await
    }

    /// Feed `input` to a suspended thread and walk until it stops again.
    ///
    /// Rejected with [`EngineError::UnknownThread`] when no checkpoint exists
    /// and [`EngineError::NotSuspended`] when the stored checkpoint is not
    /// waiting for input. Both checks run before anything is mutated.
    pub async fn resume(&self, thread_id: Uuid, input: &str) -> Result<ExecutionResult, EngineError> {
        let Some(mut checkpoint) = self.checkpoints.load(thread_id).await? else {
            return Err(EngineError::UnknownThread(thread_id));
        };
        if !checkpoint.status.is_suspended() {
            return Err(EngineError::NotSuspended(thread_id));
        }
        let Some(node) = checkpoint.suspended_node.clone() else {
            return Err(EngineError::NotSuspended(thread_id));
        };

        self.checkpoints.mark_running(&mut checkpoint).await?;
        self.events.publish(EngineEvent::ThreadResumed {
            thread_id,
            node: node.clone(),
        });
        tracing::info!(thread_id = %thread_id, node = %node, "resuming thread");

        self.walk(&mut checkpoint, node, Some(input.to_string())).await
    }

    // -----------------------------------------------------------------------
    // Walk loop
    // -----------------------------------------------------------------------

    async fn walk(
        &self,
        checkpoint: &mut Checkpoint,
        entry: String,
        mut pending_input: Option<String>,
    ) -> Result<ExecutionResult, EngineError> {
        let thread_id = checkpoint.thread_id;
        let mut current = entry;

        loop {
            self.events.publish(EngineEvent::NodeEntered {
                thread_id,
                node: current.clone(),
            });

            let Some(node) = self.graph.node(&current) else {
                return self.abort(checkpoint, EngineError::MissingNode(current)).await;
            };
            tracing::debug!(
                thread_id = %thread_id,
                node = %current,
                kind = node.kind_name(),
                "entering node"
            );

            match node {
                NodeKind::Transform(handler) => {
                    match handler(checkpoint.state.clone()).await {
                        Ok(update) => {
                            checkpoint.state.apply(update);
                            match self.next_node(&current, &checkpoint.state) {
                                Ok(next) => current = next,
                                Err(e) => return self.abort(checkpoint, e).await,
                            }
                        }
                        Err(fault) => match self.divert(checkpoint, &current, fault).await? {
                            Some(next) => current = next,
                            None => return self.fail_thread(checkpoint).await,
                        },
                    }
                }

                NodeKind::FanOut { dispatch, targets } => {
                    let dispatches = dispatch(&checkpoint.state);
                    for dispatched in &dispatches {
                        if !targets.iter().any(|t| t == &dispatched.target) {
                            let error = EngineError::DispatchTarget {
                                node: current.clone(),
                                target: dispatched.target.clone(),
                            };
                            return self.abort(checkpoint, error).await;
                        }
                    }
                    let Some(join) = self.graph.join_of(&current).map(str::to_string) else {
                        return self.abort(checkpoint, EngineError::MissingNode(current)).await;
                    };

                    checkpoint.pending_producers =
                        dispatches.iter().map(|d| d.target.clone()).collect();
                    self.checkpoints.save_running(checkpoint).await?;
                    self.events.publish(EngineEvent::FanOutDispatched {
                        thread_id,
                        node: current.clone(),
                        targets: checkpoint.pending_producers.clone(),
                    });
                    tracing::debug!(
                        thread_id = %thread_id,
                        node = %current,
                        branches = dispatches.len(),
                        "dispatching fan-out"
                    );

                    let mut branches: JoinSet<(String, Result<StateUpdate, NodeFault>)> =
                        JoinSet::new();
                    for dispatched in dispatches {
                        let graph = Arc::clone(&self.graph);
                        let mut branch_state = checkpoint.state.clone();
                        branch_state.apply(dispatched.seed);
                        let target = dispatched.target;
                        branches.spawn(async move {
                            match graph.node(&target) {
                                Some(NodeKind::Transform(handler)) => {
                                    let result = handler(branch_state).await;
                                    (target, result)
                                }
                                _ => {
                                    let fault = NodeFault::new(format!(
                                        "fan-out target '{target}' is not a transform"
                                    ));
                                    (target, Err(fault))
                                }
                            }
                        });
                    }

                    // Branch updates merge in completion order; the merge
                    // policy keeps that commutative for candidate appends.
                    let mut branch_fault: Option<NodeFault> = None;
                    while let Some(joined) = branches.join_next().await {
                        let (target, result) = match joined {
                            Ok(pair) => pair,
                            Err(e) => {
                                branches.abort_all();
                                let error = EngineError::Branch(e.to_string());
                                return self.abort(checkpoint, error).await;
                            }
                        };
                        match result {
                            Ok(update) => {
                                let faulted = update.candidates.iter().any(|c| c.is_faulted());
                                self.events.publish(EngineEvent::ProducerCompleted {
                                    thread_id,
                                    producer: target,
                                    faulted,
                                });
                                checkpoint.state.apply(update);
                            }
                            Err(fault) => {
                                tracing::warn!(
                                    thread_id = %thread_id,
                                    producer = %target,
                                    error = %fault,
                                    "fan-out branch fault"
                                );
                                self.events.publish(EngineEvent::ProducerCompleted {
                                    thread_id,
                                    producer: target,
                                    faulted: true,
                                });
                                branch_fault.get_or_insert(fault);
                            }
                        }
                    }
                    checkpoint.pending_producers.clear();

                    match branch_fault {
                        None => current = join,
                        Some(fault) => match self.divert(checkpoint, &current, fault).await? {
                            Some(next) => current = next,
                            None => return self.fail_thread(checkpoint).await,
                        },
                    }
                }

                NodeKind::Suspend { prompt, absorb } => {
                    if let Some(input) = pending_input.take() {
                        let update = absorb(&checkpoint.state, &input);
                        checkpoint.state.apply(update);
                        match self.next_node(&current, &checkpoint.state) {
                            Ok(next) => current = next,
                            Err(e) => return self.abort(checkpoint, e).await,
                        }
                    } else {
                        let suspend_prompt = prompt(&checkpoint.state);
                        self.checkpoints
                            .suspend(checkpoint, &current, suspend_prompt.clone())
                            .await?;
                        self.events.publish(EngineEvent::ThreadSuspended {
                            thread_id,
                            node: current.clone(),
                        });
                        tracing::info!(thread_id = %thread_id, node = %current, "thread suspended");
                        return Ok(ExecutionResult {
                            thread_id,
                            status: ThreadStatus::Suspended,
                            state: checkpoint.state.clone(),
                            prompt: Some(suspend_prompt),
                        });
                    }
                }

                NodeKind::Terminal(handler) => {
                    return match handler(checkpoint.state.clone()).await {
                        Ok(update) => {
                            checkpoint.state.apply(update);
                            self.checkpoints.complete(checkpoint).await?;
                            self.events.publish(EngineEvent::ThreadCompleted {
                                thread_id,
                                node: current.clone(),
                            });
                            tracing::info!(thread_id = %thread_id, node = %current, "thread completed");
                            Ok(ExecutionResult {
                                thread_id,
                                status: ThreadStatus::Completed,
                                state: checkpoint.state.clone(),
                                prompt: None,
                            })
                        }
                        Err(fault) => {
                            tracing::warn!(
                                thread_id = %thread_id,
                                node = %current,
                                error = %fault,
                                "terminal fault"
                            );
                            checkpoint.state.apply(error_update(&fault));
                            self.fail_thread(checkpoint).await
                        }
                    };
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Fault handling
    // -----------------------------------------------------------------------

    /// Record a node fault on the state and pick the fault terminal.
    ///
    /// Returns `Ok(None)` when the graph declares no fault route, in which
    /// case the caller fails the thread.
    async fn divert(
        &self,
        checkpoint: &mut Checkpoint,
        node: &str,
        fault: NodeFault,
    ) -> Result<Option<String>, EngineError> {
        tracing::warn!(
            thread_id = %checkpoint.thread_id,
            node = %node,
            error = %fault,
            "node fault"
        );
        checkpoint.state.apply(error_update(&fault));
        Ok(self.graph.fault_node().map(str::to_string))
    }

    /// Persist a FAILED checkpoint and return a failed result.
    ///
    /// Used when a fault has nowhere to route: the state already carries the
    /// error message.
    async fn fail_thread(&self, checkpoint: &mut Checkpoint) -> Result<ExecutionResult, EngineError> {
        self.checkpoints.fail(checkpoint).await?;
        let reason = checkpoint
            .state
            .error
            .clone()
            .unwrap_or_else(|| "node fault".to_string());
        self.events.publish(EngineEvent::ThreadFailed {
            thread_id: checkpoint.thread_id,
            reason: reason.clone(),
        });
        tracing::warn!(thread_id = %checkpoint.thread_id, reason = %reason, "thread failed");
        Ok(ExecutionResult {
            thread_id: checkpoint.thread_id,
            status: ThreadStatus::Failed,
            state: checkpoint.state.clone(),
            prompt: None,
        })
    }

    /// Fail the thread for an engine-level error and surface that error.
    ///
    /// The checkpoint write must not mask the original error, so it is not
    /// propagated here.
    async fn abort(
        &self,
        checkpoint: &mut Checkpoint,
        error: EngineError,
    ) -> Result<ExecutionResult, EngineError> {
        let _ = self.checkpoints.fail(checkpoint).await;
        self.events.publish(EngineEvent::ThreadFailed {
            thread_id: checkpoint.thread_id,
            reason: error.to_string(),
        });
        tracing::error!(thread_id = %checkpoint.thread_id, error = %error, "thread aborted");
        Err(error)
    }

    fn next_node(&self, node: &str, state: &WorkflowState) -> Result<String, EngineError> {
        match self.graph.edge(node) {
            Some(Edge::To(target)) => Ok(target.clone()),
            Some(Edge::Router { decide, routes }) => {
                let label = decide(state);
                routes
                    .get(&label)
                    .cloned()
                    .ok_or_else(|| EngineError::UnknownRoute {
                        node: node.to_string(),
                        label,
                    })
            }
            None => Err(EngineError::MissingEdge(node.to_string())),
        }
    }
}

fn error_update(fault: &NodeFault) -> StateUpdate {
    StateUpdate {
        error: Patch::Set(fault.to_string()),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors surfaced to the caller of [`Engine::start`] / [`Engine::resume`].
///
/// Node faults never appear here -- they are recorded on the state and
/// routed through the graph. These variants cover protocol misuse, storage
/// trouble, and graph wiring bugs the builder could not catch.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A running or suspended checkpoint already exists under this id.
    #[error("thread '{0}' is already running or suspended")]
    DuplicateThread(Uuid),

    /// No checkpoint exists under this id.
    #[error("unknown thread '{0}'")]
    UnknownThread(Uuid),

    /// Resume was called on a thread that is not waiting for input.
    #[error("thread '{0}' is not suspended")]
    NotSuspended(Uuid),

    /// Checkpoint persistence failed; the walk stopped where it was.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// A router produced a label with no declared route.
    #[error("node '{node}' routed to unknown label '{label}'")]
    UnknownRoute { node: String, label: String },

    /// A dispatcher selected a target outside its declared set.
    #[error("fan-out '{node}' dispatched undeclared target '{target}'")]
    DispatchTarget { node: String, target: String },

    /// The walk reached a node name the graph does not contain.
    #[error("walk reached unregistered node '{0}'")]
    MissingNode(String),

    /// A non-terminal node had no outgoing edge at runtime.
    #[error("node '{0}' has no outgoing edge")]
    MissingEdge(String),

    /// A fan-out branch task panicked or was cancelled.
    #[error("fan-out branch task failed: {0}")]
    Branch(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
