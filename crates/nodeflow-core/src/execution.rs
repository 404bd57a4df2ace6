//! Execution-state data model shared by the runtime, stores and observers.

use crate::{FlowError, NodeId, Value, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

pub type ExecutionId = Uuid;

/// Lifecycle status of one workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }

    /// Statuses only move forward, except for the running/paused toggle.
    pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        matches!(
            (self, next),
            (Pending, Running | Failed | Cancelled)
                | (Running, Paused | Completed | Failed | Cancelled)
                | (Paused, Running | Failed | Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Paused => "paused",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single node within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl NodeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeStatus::Completed | NodeStatus::Failed | NodeStatus::Skipped
        )
    }

    pub fn can_transition_to(self, next: NodeStatus) -> bool {
        use NodeStatus::*;
        matches!(
            (self, next),
            (Pending, Running | Skipped) | (Running, Completed | Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeStatus::Pending => "pending",
            NodeStatus::Running => "running",
            NodeStatus::Completed => "completed",
            NodeStatus::Failed => "failed",
            NodeStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Memoized outcome of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    pub node_id: NodeId,
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl NodeResult {
    pub fn pending(node_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Pending,
            output: None,
            error: None,
            start_time: None,
            end_time: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnknownNodeType,
    NodeExecution,
}

/// Why a run ended in `failed`; kept as `last_error` on the context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionFailure {
    pub kind: FailureKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    pub message: String,
}

impl ExecutionFailure {
    pub fn unknown_node_type(node_id: impl Into<NodeId>, node_type: &str) -> Self {
        Self {
            kind: FailureKind::UnknownNodeType,
            node_id: Some(node_id.into()),
            message: format!("Unknown node type: {}", node_type),
        }
    }

    pub fn node_execution(node_id: impl Into<NodeId>, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::NodeExecution,
            node_id: Some(node_id.into()),
            message: message.into(),
        }
    }
}

/// A handler failure keeps its node and the handler's own message; any other
/// engine error is recorded by its display text.
impl From<FlowError> for ExecutionFailure {
    fn from(err: FlowError) -> Self {
        match err {
            FlowError::NodeExecution { node_id, source } => {
                Self::node_execution(node_id, source.to_string())
            }
            other => Self {
                kind: FailureKind::NodeExecution,
                node_id: None,
                message: other.to_string(),
            },
        }
    }
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node_id {
            Some(node_id) => write!(f, "node '{}': {}", node_id, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Read-only copy of an execution's state at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    pub execution_id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub status: ExecutionStatus,
    pub variables: HashMap<String, Value>,
    pub node_results: HashMap<NodeId, NodeResult>,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<ExecutionFailure>,
}

impl ExecutionSnapshot {
    pub fn node_status(&self, node_id: &str) -> Option<NodeStatus> {
        self.node_results.get(node_id).map(|r| r.status)
    }

    pub fn node_output(&self, node_id: &str) -> Option<&Value> {
        self.node_results.get(node_id).and_then(|r| r.output.as_ref())
    }

    /// Number of nodes whose result reached a terminal status.
    pub fn terminal_nodes(&self) -> usize {
        self.node_results
            .values()
            .filter(|r| r.status.is_terminal())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_status_is_monotonic_except_pause_toggle() {
        use ExecutionStatus::*;
        assert!(Running.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Running));
        assert!(Paused.can_transition_to(Cancelled));
        assert!(!Paused.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Running.can_transition_to(Pending));
        for terminal in [Completed, Failed, Cancelled] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(Running));
        }
    }

    #[test]
    fn node_status_never_leaves_terminal() {
        use NodeStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Skipped));
        assert!(!Pending.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        for terminal in [Completed, Failed, Skipped] {
            assert!(!terminal.can_transition_to(Running));
        }
    }

    #[test]
    fn failure_serializes_kind_in_snake_case() {
        let failure = ExecutionFailure::unknown_node_type("x", "bogus");
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "unknown_node_type");
        assert_eq!(json["node_id"], "x");
    }

    #[test]
    fn node_execution_error_becomes_attributed_failure() {
        use crate::NodeError;
        use std::error::Error;

        let err = FlowError::NodeExecution {
            node_id: "fetch".to_string(),
            source: NodeError::ExecutionFailed("timeout".to_string()),
        };
        assert!(err.source().is_some());

        let failure = ExecutionFailure::from(err);
        assert_eq!(failure.kind, FailureKind::NodeExecution);
        assert_eq!(failure.node_id.as_deref(), Some("fetch"));
        assert_eq!(failure.message, "Execution failed: timeout");
    }
}
