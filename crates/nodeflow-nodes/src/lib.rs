//! Standard node library
//!
//! Collection of built-in handlers for common operations

mod condition;
mod debug;
mod flow;
mod loop_node;
mod time;
mod trigger;
mod variables;

pub use condition::{ConditionNode, Operator, SwitchNode};
pub use debug::DebugNode;
pub use flow::ParallelNode;
pub use loop_node::LoopNode;
pub use time::DelayNode;
pub use trigger::TriggerNode;
pub use variables::SetVariableNode;
use nodeflow_runtime::NodeRegistry;

use std::sync::Arc;

/// Register all standard nodes with a registry
pub fn register_all(registry: &mut NodeRegistry) {
    registry.register("trigger", Arc::new(TriggerNode));
    registry.register("debug.log", Arc::new(DebugNode));
    registry.register("time.delay", Arc::new(DelayNode));
    registry.register("variable.set", Arc::new(SetVariableNode));
    registry.register("condition", Arc::new(ConditionNode));
    registry.register("switch", Arc::new(SwitchNode));
    registry.register("parallel", Arc::new(ParallelNode));
    registry.register("loop", Arc::new(LoopNode));
}
