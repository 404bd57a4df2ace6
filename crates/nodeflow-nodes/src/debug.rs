use async_trait::async_trait;
use nodeflow_core::{HandlerMetadata, NodeContext, NodeError, NodeHandler, NodeOutput, Value};

/// Simple debug node that logs its inputs
pub struct DebugNode;

#[async_trait]
impl NodeHandler for DebugNode {
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let message = ctx
            .config
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("(no message)");

        tracing::info!("DEBUG [{}]: {}", ctx.node_id, message);

        // Also log all inputs for visibility
        for (index, value) in ctx.inputs.iter().enumerate() {
            tracing::info!("  input {}: {}", index, value);
        }

        Ok(NodeOutput::new(ctx.first_input().cloned().unwrap_or(Value::Null)))
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata {
            description: "Logs input values for debugging".to_string(),
            category: "debug".to_string(),
        }
    }
}
