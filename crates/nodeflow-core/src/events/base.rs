use crate::{ExecutionFailure, ExecutionId, NodeId, Value, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle event emitted during a workflow execution.
///
/// Serializes flat: `{"execution_id", "timestamp", "type", ...payload}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub execution_id: ExecutionId,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Started {
        workflow_id: WorkflowId,
    },
    Completed {
        duration_ms: u64,
    },
    Failed {
        error: ExecutionFailure,
    },
    Paused,
    Resumed,
    Cancelled,
    NodeStarted {
        node_id: NodeId,
        node_type: String,
    },
    NodeCompleted {
        node_id: NodeId,
        output: Value,
        duration_ms: u64,
    },
    NodeFailed {
        node_id: NodeId,
        error: String,
    },
    NodeSkipped {
        node_id: NodeId,
    },
}

impl ExecutionEvent {
    pub fn new(execution_id: ExecutionId, kind: EventKind) -> Self {
        Self {
            execution_id,
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn node_id(&self) -> Option<&str> {
        match &self.kind {
            EventKind::NodeStarted { node_id, .. }
            | EventKind::NodeCompleted { node_id, .. }
            | EventKind::NodeFailed { node_id, .. }
            | EventKind::NodeSkipped { node_id } => Some(node_id),
            _ => None,
        }
    }

    /// True for the last event of an execution.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::Completed { .. } | EventKind::Failed { .. } | EventKind::Cancelled
        )
    }

    /// The wire name of this event's type.
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            EventKind::Started { .. } => "started",
            EventKind::Completed { .. } => "completed",
            EventKind::Failed { .. } => "failed",
            EventKind::Paused => "paused",
            EventKind::Resumed => "resumed",
            EventKind::Cancelled => "cancelled",
            EventKind::NodeStarted { .. } => "node_started",
            EventKind::NodeCompleted { .. } => "node_completed",
            EventKind::NodeFailed { .. } => "node_failed",
            EventKind::NodeSkipped { .. } => "node_skipped",
        }
    }
}
