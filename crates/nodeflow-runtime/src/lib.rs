//! Workflow execution runtime
//!
//! This crate provides the execution engine that runs workflow graphs: the
//! node handler registry, per-execution context and scheduler, the table of
//! active executions, and the `FlowRuntime` control API.

mod context;
mod executions;
mod executor;
mod registry;
mod runtime;
mod store;

pub use context::ExecutionContext;
pub use executions::{ExecutionHandle, ExecutionRegistry};
pub use registry::NodeRegistry;
pub use runtime::{FlowRuntime, RuntimeConfig};
pub use store::{ExecutionStore, InMemoryExecutionStore};
