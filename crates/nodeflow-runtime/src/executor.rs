//! Per-execution scheduler.
//!
//! One `ExecutionRun` task owns the scheduling state of one execution. It
//! dispatches every ready node as its own tokio task, collects completions
//! through `FuturesUnordered`, and interleaves them with control commands so
//! a slow handler never blocks other branches, pause, or cancel.
//!
//! Readiness is tracked per edge: an edge is `Pending` until its source
//! finishes, then `Active` (the source's route selected it) or `Pruned`.
//! A node becomes ready once all its incoming edges are resolved; if none of
//! them is active it is skipped and its own outgoing edges are pruned.

use crate::context::ExecutionContext;
use crate::registry::NodeRegistry;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use nodeflow_core::{
    EventEmitter, EventKind, ExecutionFailure, ExecutionStatus, FlowError, NodeContext, NodeError,
    NodeId, NodeOutput, Route, Value, WorkflowGraph,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    Pause,
    Resume,
    Cancel,
}

pub(crate) struct ControlCommand {
    pub(crate) control: Control,
    pub(crate) reply: oneshot::Sender<Result<(), FlowError>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeState {
    Pending,
    Active,
    Pruned,
}

struct NodeCompletion {
    node_id: NodeId,
    result: Result<NodeOutput, NodeError>,
    duration_ms: u64,
}

/// Edge indices per node, in registration order.
struct Topology {
    incoming: HashMap<NodeId, Vec<usize>>,
    outgoing: HashMap<NodeId, Vec<usize>>,
}

impl Topology {
    fn new(graph: &WorkflowGraph) -> Self {
        let mut incoming: HashMap<NodeId, Vec<usize>> = HashMap::new();
        let mut outgoing: HashMap<NodeId, Vec<usize>> = HashMap::new();
        for (idx, edge) in graph.edges.iter().enumerate() {
            incoming.entry(edge.target.clone()).or_default().push(idx);
            outgoing.entry(edge.source.clone()).or_default().push(idx);
        }
        Self { incoming, outgoing }
    }

    fn incoming(&self, node_id: &str) -> &[usize] {
        self.incoming.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn outgoing(&self, node_id: &str) -> &[usize] {
        self.outgoing.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub(crate) struct ExecutionRun {
    graph: Arc<WorkflowGraph>,
    topology: Topology,
    registry: Arc<NodeRegistry>,
    context: Arc<ExecutionContext>,
    events: EventEmitter,
    commands: mpsc::Receiver<ControlCommand>,
    commands_open: bool,
    cancel: CancellationToken,
    max_parallel: Option<usize>,

    edge_states: Vec<EdgeState>,
    unresolved: HashMap<NodeId, usize>,
    outputs: HashMap<NodeId, Value>,
    ready: VecDeque<NodeId>,
    in_flight: FuturesUnordered<BoxFuture<'static, NodeCompletion>>,
    running: Vec<NodeId>,
    started_at: Instant,
    done: bool,
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

impl ExecutionRun {
    pub(crate) fn new(
        graph: Arc<WorkflowGraph>,
        registry: Arc<NodeRegistry>,
        context: Arc<ExecutionContext>,
        events: EventEmitter,
        commands: mpsc::Receiver<ControlCommand>,
        max_parallel: Option<usize>,
    ) -> Self {
        let topology = Topology::new(&graph);
        let unresolved = graph
            .nodes
            .iter()
            .map(|n| (n.id.clone(), topology.incoming(&n.id).len()))
            .collect();
        let edge_states = vec![EdgeState::Pending; graph.edges.len()];

        Self {
            graph,
            topology,
            registry,
            context,
            events,
            commands,
            commands_open: true,
            cancel: CancellationToken::new(),
            max_parallel: max_parallel.filter(|limit| *limit > 0),
            edge_states,
            unresolved,
            outputs: HashMap::new(),
            ready: VecDeque::new(),
            in_flight: FuturesUnordered::new(),
            running: Vec::new(),
            started_at: Instant::now(),
            done: false,
        }
    }

    /// Drive the execution until it reaches a terminal status.
    #[instrument(
        name = "execution",
        skip(self),
        fields(execution_id = %self.context.execution_id(), workflow_id = %self.graph.id)
    )]
    pub(crate) async fn run(mut self) {
        info!(
            "Starting workflow execution: {} ({} nodes)",
            self.graph.name,
            self.graph.nodes.len()
        );

        for node in &self.graph.nodes {
            if self.topology.incoming(&node.id).is_empty() {
                self.ready.push_back(node.id.clone());
            }
        }

        while !self.done {
            if self.context.status() == ExecutionStatus::Running {
                self.dispatch_ready().await;
                if self.done {
                    break;
                }
                if self.ready.is_empty() && self.in_flight.is_empty() {
                    self.finish(ExecutionStatus::Completed, None).await;
                    break;
                }
            }

            tokio::select! {
                Some(completion) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.on_node_finished(completion).await;
                }
                command = self.commands.recv(), if self.commands_open => match command {
                    Some(command) => self.on_command(command).await,
                    None => self.commands_open = false,
                },
                else => {
                    warn!("Paused execution lost its control channel; cancelling");
                    self.finish(ExecutionStatus::Cancelled, None).await;
                }
            }
        }
    }

    async fn dispatch_ready(&mut self) {
        while let Some(node_id) = self.ready.pop_front() {
            if let Some(limit) = self.max_parallel {
                if self.in_flight.len() >= limit {
                    self.ready.push_front(node_id);
                    break;
                }
            }
            self.dispatch(node_id).await;
            if self.done {
                return;
            }
        }
    }

    async fn dispatch(&mut self, node_id: NodeId) {
        let (node_type, config) = match self.graph.find_node(&node_id) {
            Some(spec) => (spec.node_type.clone(), spec.config.clone()),
            None => {
                warn!("Ready node {} is not part of the graph", node_id);
                return;
            }
        };

        if let Err(e) = self.context.begin_node(&node_id).await {
            warn!("Not dispatching node {}: {}", node_id, e);
            return;
        }
        self.events.emit(EventKind::NodeStarted {
            node_id: node_id.clone(),
            node_type: node_type.clone(),
        });

        let handler = match self.registry.resolve(&node_type) {
            Ok(handler) => handler,
            Err(e) => {
                error!("Node {} cannot be dispatched: {}", node_id, e);
                self.record_node_failure(&node_id, e.to_string()).await;
                let failure = ExecutionFailure::unknown_node_type(node_id, &node_type);
                self.finish(ExecutionStatus::Failed, Some(failure)).await;
                return;
            }
        };

        let ctx = NodeContext {
            execution_id: self.context.execution_id(),
            node_id: node_id.clone(),
            node_type,
            config,
            variables: self.context.variables().clone(),
            inputs: self.gather_inputs(&node_id),
            cancellation: self.cancel.child_token(),
        };

        debug!("Dispatching node {} with {} inputs", node_id, ctx.inputs.len());

        let task = tokio::spawn(async move {
            let start = Instant::now();
            let result = handler.execute(ctx).await;
            (result, elapsed_ms(start))
        });

        let id = node_id.clone();
        self.in_flight.push(Box::pin(async move {
            match task.await {
                Ok((result, duration_ms)) => NodeCompletion {
                    node_id: id,
                    result,
                    duration_ms,
                },
                Err(join_error) => NodeCompletion {
                    node_id: id,
                    result: Err(NodeError::ExecutionFailed(format!(
                        "handler task failed: {}",
                        join_error
                    ))),
                    duration_ms: 0,
                },
            }
        }));
        self.running.push(node_id);
    }

    /// Outputs of the sources of active incoming edges, in edge order.
    fn gather_inputs(&self, node_id: &str) -> Vec<Value> {
        self.topology
            .incoming(node_id)
            .iter()
            .filter(|idx| self.edge_states[**idx] == EdgeState::Active)
            .map(|idx| {
                let source = &self.graph.edges[*idx].source;
                self.outputs.get(source).cloned().unwrap_or_default()
            })
            .collect()
    }

    async fn on_node_finished(&mut self, completion: NodeCompletion) {
        let NodeCompletion {
            node_id,
            result,
            duration_ms,
        } = completion;
        self.running.retain(|id| id != &node_id);

        match result {
            Ok(output) => {
                info!("Node {} completed in {}ms", node_id, duration_ms);
                if let Err(e) = self.context.complete_node(&node_id, output.value.clone()).await {
                    warn!("{}", e);
                }
                self.events.emit(EventKind::NodeCompleted {
                    node_id: node_id.clone(),
                    output: output.value.clone(),
                    duration_ms,
                });
                self.outputs.insert(node_id.clone(), output.value);
                self.route(&node_id, &output.route).await;
            }
            Err(e) => {
                self.record_node_failure(&node_id, e.to_string()).await;
                let err = FlowError::NodeExecution { node_id, source: e };
                error!("{}", err);
                self.finish(ExecutionStatus::Failed, Some(ExecutionFailure::from(err)))
                    .await;
            }
        }
    }

    /// Resolve the outgoing edges of a completed node according to its route.
    async fn route(&mut self, node_id: &str, route: &Route) {
        let decisions: Vec<(usize, EdgeState)> = self
            .topology
            .outgoing(node_id)
            .iter()
            .map(|&idx| {
                let edge = &self.graph.edges[idx];
                let active = match route {
                    Route::All => true,
                    Route::Handle(handle) => edge.handle() == handle,
                    Route::NoPath => false,
                };
                let state = if active {
                    EdgeState::Active
                } else {
                    EdgeState::Pruned
                };
                (idx, state)
            })
            .collect();

        if let Route::Handle(handle) = route {
            let matched = decisions.iter().any(|(_, s)| *s == EdgeState::Active);
            if !matched && !decisions.is_empty() {
                warn!(
                    "Node {} chose handle '{}' but no outgoing edge carries it",
                    node_id, handle
                );
            }
        }

        self.settle(decisions).await;
    }

    /// Apply edge decisions and propagate readiness and skips downstream.
    async fn settle(&mut self, decisions: Vec<(usize, EdgeState)>) {
        let mut pending: VecDeque<(usize, EdgeState)> = decisions.into();

        while let Some((idx, state)) = pending.pop_front() {
            self.edge_states[idx] = state;
            let target = self.graph.edges[idx].target.clone();

            let remaining = match self.unresolved.get_mut(&target) {
                Some(count) => {
                    *count = count.saturating_sub(1);
                    *count
                }
                None => continue,
            };
            if remaining > 0 {
                continue;
            }

            let any_active = self
                .topology
                .incoming(&target)
                .iter()
                .any(|i| self.edge_states[*i] == EdgeState::Active);

            if any_active {
                debug!("Node {} is ready", target);
                self.ready.push_back(target);
            } else {
                debug!("Skipping node {}: every incoming edge was pruned", target);
                if let Err(e) = self.context.skip_node(&target).await {
                    warn!("{}", e);
                }
                self.events.emit(EventKind::NodeSkipped {
                    node_id: target.clone(),
                });
                for &out in self.topology.outgoing(&target) {
                    pending.push_back((out, EdgeState::Pruned));
                }
            }
        }
    }

    async fn on_command(&mut self, command: ControlCommand) {
        let result = match command.control {
            Control::Pause => self.pause(),
            Control::Resume => self.resume(),
            Control::Cancel => {
                info!("Cancelling execution");
                self.finish(ExecutionStatus::Cancelled, None).await;
                Ok(())
            }
        };
        let _ = command.reply.send(result);
    }

    fn pause(&mut self) -> Result<(), FlowError> {
        if self.context.status() == ExecutionStatus::Paused {
            return Ok(());
        }
        self.context.transition(ExecutionStatus::Paused)?;
        info!("Execution paused with {} nodes in flight", self.running.len());
        self.events.emit(EventKind::Paused);
        Ok(())
    }

    fn resume(&mut self) -> Result<(), FlowError> {
        if self.context.status() == ExecutionStatus::Running {
            return Ok(());
        }
        self.context.transition(ExecutionStatus::Running)?;
        info!("Execution resumed with {} nodes ready", self.ready.len());
        self.events.emit(EventKind::Resumed);
        Ok(())
    }

    async fn record_node_failure(&mut self, node_id: &str, error: String) {
        if let Err(e) = self.context.fail_node(node_id, error.clone()).await {
            warn!("{}", e);
        }
        self.events.emit(EventKind::NodeFailed {
            node_id: node_id.to_string(),
            error,
        });
    }

    /// Stop scheduling and move the execution to a terminal status.
    ///
    /// Nodes still in flight are signalled through the cancellation token and
    /// recorded as failed before the terminal event goes out; their handler
    /// tasks are detached and whatever they return later is discarded.
    async fn finish(&mut self, status: ExecutionStatus, failure: Option<ExecutionFailure>) {
        self.cancel.cancel();
        self.ready.clear();

        let reason = match status {
            ExecutionStatus::Cancelled => "cancelled",
            _ => "aborted: execution failed",
        };
        for node_id in std::mem::take(&mut self.running) {
            warn!("Abandoning in-flight node {}", node_id);
            self.record_node_failure(&node_id, reason.to_string()).await;
        }
        self.in_flight = FuturesUnordered::new();

        if let Err(e) = self.context.finish(status, failure.clone()).await {
            error!("Could not finish execution: {}", e);
        }

        let duration_ms = elapsed_ms(self.started_at);
        let kind = match (status, failure) {
            (ExecutionStatus::Failed, Some(error)) => {
                error!("Workflow execution failed after {}ms: {}", duration_ms, error);
                EventKind::Failed { error }
            }
            (ExecutionStatus::Cancelled, _) => {
                info!("Workflow execution cancelled after {}ms", duration_ms);
                EventKind::Cancelled
            }
            _ => {
                info!("Workflow execution completed in {}ms", duration_ms);
                EventKind::Completed { duration_ms }
            }
        };
        self.events.emit(kind);
        self.done = true;
    }
}
