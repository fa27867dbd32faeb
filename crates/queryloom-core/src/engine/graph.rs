//! Workflow graph model: typed nodes, routed edges, and build-time validation.
//!
//! A [`Graph`] is assembled once through [`GraphBuilder`] and frozen before any
//! thread walks it. `build()` rejects malformed topologies up front -- dangling
//! targets, terminals with outgoing edges, fan-outs whose branches do not
//! converge -- so the engine never discovers a wiring mistake mid-walk.
//! Cycles are permitted: feedback loops route a suspended thread back through
//! earlier nodes by design.

use std::collections::HashMap;

use futures_util::future::BoxFuture;
use petgraph::graph::DiGraph;
use petgraph::visit::Bfs;
use queryloom_types::checkpoint::SuspendPrompt;
use queryloom_types::state::{StateUpdate, WorkflowState};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Node handler signatures
// ---------------------------------------------------------------------------

/// Fault raised by a node handler.
///
/// Node faults are data, not control flow: the engine records the message on
/// the thread state and routes to the graph's fault terminal instead of
/// aborting the walk.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct NodeFault(pub String);

impl NodeFault {
    /// Create a fault from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Async handler for transform and terminal nodes.
///
/// Receives a snapshot of the merged state and returns a partial update; the
/// engine owns the merge.
pub type TransformFn =
    Box<dyn Fn(WorkflowState) -> BoxFuture<'static, Result<StateUpdate, NodeFault>> + Send + Sync>;

/// Chooses the concurrent branches dispatched by a fan-out node.
pub type DispatchFn = Box<dyn Fn(&WorkflowState) -> Vec<Dispatch> + Send + Sync>;

/// Builds the client-facing prompt persisted when a thread suspends.
pub type PromptFn = Box<dyn Fn(&WorkflowState) -> SuspendPrompt + Send + Sync>;

/// Folds external input into the state when a suspended thread resumes.
pub type AbsorbFn = Box<dyn Fn(&WorkflowState, &str) -> StateUpdate + Send + Sync>;

/// Inspects the merged state and names the route label to follow.
pub type RouteFn = Box<dyn Fn(&WorkflowState) -> String + Send + Sync>;

/// One branch of a fan-out: the target node plus the partial state it is
/// seeded with before running.
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// Name of the transform node to run on this branch.
    pub target: String,

    /// Update applied to the branch's state snapshot before the handler runs.
    pub seed: StateUpdate,
}

impl Dispatch {
    /// Create a dispatch for `target` seeded with `seed`.
    pub fn new(target: impl Into<String>, seed: StateUpdate) -> Self {
        Self {
            target: target.into(),
            seed,
        }
    }
}

// ---------------------------------------------------------------------------
// Nodes and edges
// ---------------------------------------------------------------------------

/// The four node kinds a graph is composed of.
pub enum NodeKind {
    /// Computes a state update and follows its single outgoing edge.
    Transform(TransformFn),

    /// Dispatches concurrent branches; the walk continues at the inferred
    /// join node once every branch has completed.
    FanOut {
        /// Decides at runtime which declared targets run, and with what seed.
        dispatch: DispatchFn,

        /// Targets the dispatcher may select from, fixed at build time.
        targets: Vec<String>,
    },

    /// Persists a prompt and parks the thread until external input arrives.
    Suspend {
        /// Builds the prompt returned to the caller on suspension.
        prompt: PromptFn,

        /// Folds the resume input into the state before routing continues.
        absorb: AbsorbFn,
    },

    /// Computes a final state update; the thread completes afterwards.
    Terminal(TransformFn),
}

impl NodeKind {
    /// Stable lowercase label for logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeKind::Transform(_) => "transform",
            NodeKind::FanOut { .. } => "fan_out",
            NodeKind::Suspend { .. } => "suspend",
            NodeKind::Terminal(_) => "terminal",
        }
    }
}

/// Outgoing edge of a transform or suspend node.
pub enum Edge {
    /// Unconditional step to the named node.
    To(String),

    /// Conditional step: `decide` names a label, `routes` maps it to a node.
    Router {
        /// Chooses the route label from the merged state.
        decide: RouteFn,

        /// Label-to-node table; a label missing here is an engine fault.
        routes: HashMap<String, String>,
    },
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// A validated, immutable workflow graph.
///
/// Construct through [`GraphBuilder`]; share across threads behind an `Arc`.
pub struct Graph {
    start: String,
    fault_route: Option<String>,
    nodes: HashMap<String, NodeKind>,
    edges: HashMap<String, Edge>,
    joins: HashMap<String, String>,
}

impl Graph {
    /// Name of the entry node every new thread starts at.
    pub fn start_node(&self) -> &str {
        &self.start
    }

    /// Terminal that receives threads whose node handler faulted, if declared.
    pub fn fault_node(&self) -> Option<&str> {
        self.fault_route.as_deref()
    }

    /// Whether a node with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Number of registered nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn node(&self, name: &str) -> Option<&NodeKind> {
        self.nodes.get(name)
    }

    pub(crate) fn edge(&self, name: &str) -> Option<&Edge> {
        self.edges.get(name)
    }

    /// Join node inferred for the named fan-out, if `name` is a fan-out.
    pub fn join_of(&self, name: &str) -> Option<&str> {
        self.joins.get(name).map(String::as_str)
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("start", &self.start)
            .field("nodes", &self.nodes.len())
            .field("fault_route", &self.fault_route)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Accumulates nodes and edges, then validates the whole topology in
/// [`GraphBuilder::build`].
///
/// Registration order does not matter; forward references are resolved at
/// build time.
pub struct GraphBuilder {
    start: String,
    fault_route: Option<String>,
    nodes: HashMap<String, NodeKind>,
    edges: HashMap<String, Edge>,
    duplicate_nodes: Vec<String>,
    duplicate_edges: Vec<String>,
}

impl GraphBuilder {
    /// Begin a graph whose walks enter at `start`.
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            fault_route: None,
            nodes: HashMap::new(),
            edges: HashMap::new(),
            duplicate_nodes: Vec::new(),
            duplicate_edges: Vec::new(),
        }
    }

    /// Register a transform node.
    pub fn transform<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(WorkflowState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StateUpdate, NodeFault>> + Send + 'static,
    {
        let handler: TransformFn = Box::new(move |state| Box::pin(handler(state)));
        self.add_node(name.into(), NodeKind::Transform(handler));
        self
    }

    /// Register a terminal node.
    pub fn terminal<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(WorkflowState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StateUpdate, NodeFault>> + Send + 'static,
    {
        let handler: TransformFn = Box::new(move |state| Box::pin(handler(state)));
        self.add_node(name.into(), NodeKind::Terminal(handler));
        self
    }

    /// Register a fan-out node that may dispatch to any of `targets`.
    pub fn fan_out<D>(mut self, name: impl Into<String>, dispatch: D, targets: &[&str]) -> Self
    where
        D: Fn(&WorkflowState) -> Vec<Dispatch> + Send + Sync + 'static,
    {
        self.add_node(
            name.into(),
            NodeKind::FanOut {
                dispatch: Box::new(dispatch),
                targets: targets.iter().map(|t| t.to_string()).collect(),
            },
        );
        self
    }

    /// Register a suspend node with its prompt builder and input absorber.
    pub fn suspend<P, A>(mut self, name: impl Into<String>, prompt: P, absorb: A) -> Self
    where
        P: Fn(&WorkflowState) -> SuspendPrompt + Send + Sync + 'static,
        A: Fn(&WorkflowState, &str) -> StateUpdate + Send + Sync + 'static,
    {
        self.add_node(
            name.into(),
            NodeKind::Suspend {
                prompt: Box::new(prompt),
                absorb: Box::new(absorb),
            },
        );
        self
    }

    /// Declare the unconditional edge `from -> to`.
    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.add_edge(from.into(), Edge::To(to.into()));
        self
    }

    /// Declare a conditional edge: `decide` picks a label, `routes` maps
    /// labels to target nodes.
    pub fn route<F>(mut self, from: impl Into<String>, decide: F, routes: &[(&str, &str)]) -> Self
    where
        F: Fn(&WorkflowState) -> String + Send + Sync + 'static,
    {
        let routes = routes
            .iter()
            .map(|(label, target)| (label.to_string(), target.to_string()))
            .collect();
        self.add_edge(
            from.into(),
            Edge::Router {
                decide: Box::new(decide),
                routes,
            },
        );
        self
    }

    /// Name the terminal that receives threads whose node handler faulted.
    pub fn on_fault(mut self, name: impl Into<String>) -> Self {
        self.fault_route = Some(name.into());
        self
    }

    fn add_node(&mut self, name: String, kind: NodeKind) {
        if self.nodes.contains_key(&name) {
            self.duplicate_nodes.push(name);
        } else {
            self.nodes.insert(name, kind);
        }
    }

    fn add_edge(&mut self, from: String, edge: Edge) {
        if self.edges.contains_key(&from) {
            self.duplicate_edges.push(from);
        } else {
            self.edges.insert(from, edge);
        }
    }

    /// Validate the accumulated topology and freeze it into a [`Graph`].
    pub fn build(self) -> Result<Graph, GraphError> {
        if let Some(name) = self.duplicate_nodes.first() {
            return Err(GraphError::DuplicateNode(name.clone()));
        }
        if let Some(name) = self.duplicate_edges.first() {
            return Err(GraphError::DuplicateEdge(name.clone()));
        }
        if !self.nodes.contains_key(&self.start) {
            return Err(GraphError::MissingStart(self.start.clone()));
        }

        for (from, edge) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(GraphError::UnknownSource(from.clone()));
            }
            match edge {
                Edge::To(to) => self.check_target(from, to)?,
                Edge::Router { routes, .. } => {
                    for to in routes.values() {
                        self.check_target(from, to)?;
                    }
                }
            }
        }

        let mut joins = HashMap::new();
        for (name, kind) in &self.nodes {
            match kind {
                NodeKind::Transform(_) | NodeKind::Suspend { .. } => {
                    if !self.edges.contains_key(name) {
                        return Err(GraphError::MissingEdge(name.clone()));
                    }
                }
                NodeKind::Terminal(_) => {
                    if self.edges.contains_key(name) {
                        return Err(GraphError::TerminalEdge(name.clone()));
                    }
                }
                NodeKind::FanOut { targets, .. } => {
                    if self.edges.contains_key(name) {
                        return Err(GraphError::FanOutEdge(name.clone()));
                    }
                    let join = self.infer_join(name, targets)?;
                    joins.insert(name.clone(), join);
                }
            }
        }

        if let Some(fault) = &self.fault_route {
            match self.nodes.get(fault) {
                None => return Err(GraphError::MissingFaultRoute(fault.clone())),
                Some(NodeKind::Terminal(_)) => {}
                Some(_) => return Err(GraphError::FaultRouteKind(fault.clone())),
            }
        }

        self.check_reachability()?;

        Ok(Graph {
            start: self.start,
            fault_route: self.fault_route,
            nodes: self.nodes,
            edges: self.edges,
            joins,
        })
    }

    fn check_target(&self, from: &str, to: &str) -> Result<(), GraphError> {
        if self.nodes.contains_key(to) {
            Ok(())
        } else {
            Err(GraphError::UnknownTarget {
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }

    /// Every fan-out target must be a transform whose single unconditional
    /// successor is shared by all targets; that successor is the join.
    fn infer_join(&self, name: &str, targets: &[String]) -> Result<String, GraphError> {
        if targets.is_empty() {
            return Err(GraphError::EmptyFanOut(name.to_string()));
        }

        let mut join: Option<&str> = None;
        for target in targets {
            match self.nodes.get(target) {
                Some(NodeKind::Transform(_)) => {}
                Some(_) => {
                    return Err(GraphError::FanOutTarget {
                        node: name.to_string(),
                        target: target.clone(),
                    });
                }
                None => {
                    return Err(GraphError::UnknownTarget {
                        from: name.to_string(),
                        to: target.clone(),
                    });
                }
            }
            let successor = match self.edges.get(target) {
                Some(Edge::To(to)) => to.as_str(),
                _ => {
                    return Err(GraphError::FanOutTargetRoute {
                        node: name.to_string(),
                        target: target.clone(),
                    });
                }
            };
            match join {
                None => join = Some(successor),
                Some(existing) if existing == successor => {}
                Some(_) => return Err(GraphError::FanOutJoin(name.to_string())),
            }
        }

        // targets is non-empty, so a join was recorded above
        match join {
            Some(j) => Ok(j.to_string()),
            None => Err(GraphError::EmptyFanOut(name.to_string())),
        }
    }

    fn check_reachability(&self) -> Result<(), GraphError> {
        let mut dag: DiGraph<&str, ()> = DiGraph::new();
        let mut indices = HashMap::new();
        for name in self.nodes.keys() {
            indices.insert(name.as_str(), dag.add_node(name.as_str()));
        }

        for (from, edge) in &self.edges {
            let from_idx = indices[from.as_str()];
            match edge {
                Edge::To(to) => {
                    dag.add_edge(from_idx, indices[to.as_str()], ());
                }
                Edge::Router { routes, .. } => {
                    for to in routes.values() {
                        dag.add_edge(from_idx, indices[to.as_str()], ());
                    }
                }
            }
        }
        for (name, kind) in &self.nodes {
            if let NodeKind::FanOut { targets, .. } = kind {
                let from_idx = indices[name.as_str()];
                for target in targets {
                    dag.add_edge(from_idx, indices[target.as_str()], ());
                }
            }
        }
        // Any non-terminal node may divert to the fault route, so it counts
        // as an implicit edge for reachability.
        if let Some(fault) = &self.fault_route {
            if let Some(&fault_idx) = indices.get(fault.as_str()) {
                for (name, kind) in &self.nodes {
                    if !matches!(kind, NodeKind::Terminal(_)) {
                        dag.add_edge(indices[name.as_str()], fault_idx, ());
                    }
                }
            }
        }

        let mut visited = std::collections::HashSet::new();
        let mut bfs = Bfs::new(&dag, indices[self.start.as_str()]);
        while let Some(idx) = bfs.next(&dag) {
            visited.insert(idx);
        }

        let mut unreachable: Vec<&str> = indices
            .iter()
            .filter(|(_, idx)| !visited.contains(*idx))
            .map(|(name, _)| *name)
            .collect();
        unreachable.sort_unstable();

        match unreachable.first() {
            Some(name) => Err(GraphError::Unreachable(name.to_string())),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Validation failures reported by [`GraphBuilder::build`].
#[derive(Debug, Error)]
pub enum GraphError {
    /// The same node name was registered more than once.
    #[error("node '{0}' registered more than once")]
    DuplicateNode(String),

    /// More than one outgoing edge was declared for the same node.
    #[error("node '{0}' declares more than one outgoing edge")]
    DuplicateEdge(String),

    /// The declared start node was never registered.
    #[error("start node '{0}' is not registered")]
    MissingStart(String),

    /// An edge was declared from a node that was never registered.
    #[error("edge declared from unknown node '{0}'")]
    UnknownSource(String),

    /// An edge or dispatch target names a node that was never registered.
    #[error("node '{from}' targets unknown node '{to}'")]
    UnknownTarget { from: String, to: String },

    /// Terminal nodes must not have outgoing edges.
    #[error("terminal node '{0}' must not have an outgoing edge")]
    TerminalEdge(String),

    /// Fan-out nodes route through their targets; an explicit edge is
    /// ambiguous.
    #[error("fan-out node '{0}' must not declare its own edge")]
    FanOutEdge(String),

    /// Transform and suspend nodes need exactly one outgoing edge.
    #[error("node '{0}' has no outgoing edge")]
    MissingEdge(String),

    /// A fan-out must declare at least one target.
    #[error("fan-out node '{0}' declares no targets")]
    EmptyFanOut(String),

    /// Fan-out targets must be transform nodes.
    #[error("fan-out '{node}' target '{target}' must be a transform node")]
    FanOutTarget { node: String, target: String },

    /// Fan-out targets must step unconditionally to the join.
    #[error("fan-out '{node}' target '{target}' must route unconditionally to the join")]
    FanOutTargetRoute { node: String, target: String },

    /// All targets of one fan-out must share a single successor.
    #[error("targets of fan-out '{0}' do not converge on a single join node")]
    FanOutJoin(String),

    /// The declared fault route names an unregistered node.
    #[error("fault route '{0}' is not registered")]
    MissingFaultRoute(String),

    /// The fault route must be a terminal node.
    #[error("fault route '{0}' must be a terminal node")]
    FaultRouteKind(String),

    /// Every node must be reachable from the start node.
    #[error("node '{0}' is unreachable from the start node")]
    Unreachable(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
