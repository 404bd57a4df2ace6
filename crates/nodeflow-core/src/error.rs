use crate::{ExecutionId, ExecutionStatus, NodeId, NodeStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Invalid workflow graph: {0}")]
    GraphValidation(#[from] GraphValidationError),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Node '{node_id}' failed: {source}")]
    NodeExecution {
        node_id: NodeId,
        #[source]
        source: NodeError,
    },

    #[error("Execution {0} is not active")]
    ExecutionNotActive(ExecutionId),

    #[error("Invalid execution transition from {from} to {to}")]
    InvalidTransition {
        from: ExecutionStatus,
        to: ExecutionStatus,
    },

    #[error("Invalid transition for node '{node_id}' from {from} to {to}")]
    InvalidNodeTransition {
        node_id: NodeId,
        from: NodeStatus,
        to: NodeStatus,
    },

    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Errors raised by node handlers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Missing variable: {0}")]
    MissingVariable(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Cancelled")]
    Cancelled,
}

/// Structural problems found before a graph is allowed to run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphValidationError {
    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(NodeId),

    #[error("Duplicate edge id: {0}")]
    DuplicateEdgeId(String),

    #[error("Edge '{edge_id}' references missing node '{node_id}'")]
    DanglingEdge { edge_id: String, node_id: NodeId },

    #[error("Graph has no start node (every node has an incoming edge)")]
    NoStartNode,

    #[error("Cyclic dependency detected")]
    CyclicDependency,
}
