//! Core abstractions for the nodeflow engine
//!
//! Graph model and validation, the handler contract, the execution-state
//! data model and lifecycle events. Every other crate builds on these types.

mod error;
pub mod events;
mod execution;
mod graph;
mod node;
mod value;
mod variables;

pub use error::{FlowError, GraphValidationError, NodeError};
pub use events::*;
pub use execution::{
    ExecutionFailure, ExecutionId, ExecutionSnapshot, ExecutionStatus, FailureKind, NodeResult,
    NodeStatus,
};
pub use graph::{Edge, NodeId, NodeSpec, WorkflowGraph, WorkflowId, DEFAULT_HANDLE};
pub use node::{FnHandler, HandlerMetadata, NodeContext, NodeHandler, NodeOutput, Route};
pub use value::Value;
pub use variables::Variables;

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
