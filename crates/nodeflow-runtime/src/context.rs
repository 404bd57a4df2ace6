//! Mutable state of one workflow run.
//!
//! The scheduler task is the only writer; status queries read concurrently.
//! Node results live behind an async `RwLock`, the status is mirrored into a
//! `watch` channel so waiters can block on terminal states without polling.

use chrono::{DateTime, Utc};
use nodeflow_core::{
    ExecutionFailure, ExecutionId, ExecutionSnapshot, ExecutionStatus, FlowError, NodeId,
    NodeResult, NodeSpec, NodeStatus, Value, Variables, WorkflowId,
};
use std::collections::HashMap;
use tokio::sync::{watch, RwLock};

struct ContextState {
    node_results: HashMap<NodeId, NodeResult>,
    end_time: Option<DateTime<Utc>>,
    last_error: Option<ExecutionFailure>,
}

pub struct ExecutionContext {
    execution_id: ExecutionId,
    workflow_id: WorkflowId,
    start_time: DateTime<Utc>,
    variables: Variables,
    status: watch::Sender<ExecutionStatus>,
    state: RwLock<ContextState>,
}

impl ExecutionContext {
    /// New `pending` context with one pending result per node.
    pub fn new(
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        nodes: &[NodeSpec],
        initial_variables: HashMap<String, Value>,
    ) -> Self {
        let node_results = nodes
            .iter()
            .map(|n| (n.id.clone(), NodeResult::pending(n.id.clone())))
            .collect();
        let (status, _) = watch::channel(ExecutionStatus::Pending);

        Self {
            execution_id,
            workflow_id,
            start_time: Utc::now(),
            variables: Variables::new(initial_variables),
            status,
            state: RwLock::new(ContextState {
                node_results,
                end_time: None,
                last_error: None,
            }),
        }
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    pub fn workflow_id(&self) -> WorkflowId {
        self.workflow_id
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn status(&self) -> ExecutionStatus {
        *self.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ExecutionStatus> {
        self.status.subscribe()
    }

    /// Move the execution to `next`, returning the previous status.
    pub fn transition(&self, next: ExecutionStatus) -> Result<ExecutionStatus, FlowError> {
        let mut result = Ok(next);
        self.status.send_if_modified(|current| {
            if current.can_transition_to(next) {
                result = Ok(*current);
                *current = next;
                true
            } else {
                result = Err(FlowError::InvalidTransition {
                    from: *current,
                    to: next,
                });
                false
            }
        });
        result
    }

    /// Enter a terminal status, stamping the end time and failure first so
    /// that anyone woken by the status change sees a complete record.
    pub async fn finish(
        &self,
        status: ExecutionStatus,
        failure: Option<ExecutionFailure>,
    ) -> Result<(), FlowError> {
        {
            let mut state = self.state.write().await;
            state.end_time = Some(Utc::now());
            if failure.is_some() {
                state.last_error = failure;
            }
        }
        self.transition(status).map(|_| ())
    }

    pub async fn node_status(&self, node_id: &str) -> Option<NodeStatus> {
        self.state
            .read()
            .await
            .node_results
            .get(node_id)
            .map(|r| r.status)
    }

    pub async fn begin_node(&self, node_id: &str) -> Result<(), FlowError> {
        self.update_node(node_id, NodeStatus::Running, |result| {
            result.start_time = Some(Utc::now());
        })
        .await
    }

    pub async fn complete_node(&self, node_id: &str, output: Value) -> Result<(), FlowError> {
        self.update_node(node_id, NodeStatus::Completed, |result| {
            result.output = Some(output);
            result.end_time = Some(Utc::now());
        })
        .await
    }

    pub async fn fail_node(&self, node_id: &str, error: impl Into<String>) -> Result<(), FlowError> {
        let error = error.into();
        self.update_node(node_id, NodeStatus::Failed, |result| {
            result.error = Some(error);
            result.end_time = Some(Utc::now());
        })
        .await
    }

    pub async fn skip_node(&self, node_id: &str) -> Result<(), FlowError> {
        self.update_node(node_id, NodeStatus::Skipped, |result| {
            result.end_time = Some(Utc::now());
        })
        .await
    }

    async fn update_node<F>(&self, node_id: &str, next: NodeStatus, apply: F) -> Result<(), FlowError>
    where
        F: FnOnce(&mut NodeResult),
    {
        let mut state = self.state.write().await;
        let result = state
            .node_results
            .entry(node_id.to_string())
            .or_insert_with(|| NodeResult::pending(node_id));

        if !result.status.can_transition_to(next) {
            return Err(FlowError::InvalidNodeTransition {
                node_id: node_id.to_string(),
                from: result.status,
                to: next,
            });
        }
        result.status = next;
        apply(result);
        Ok(())
    }

    pub async fn snapshot(&self) -> ExecutionSnapshot {
        let variables = self.variables.snapshot().await;
        let state = self.state.read().await;
        ExecutionSnapshot {
            execution_id: self.execution_id,
            workflow_id: self.workflow_id,
            status: self.status(),
            variables,
            node_results: state.node_results.clone(),
            start_time: self.start_time,
            end_time: state.end_time,
            last_error: state.last_error.clone(),
        }
    }
}
