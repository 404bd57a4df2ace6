use async_trait::async_trait;
use nodeflow_core::{HandlerMetadata, NodeContext, NodeError, NodeHandler, NodeOutput, Value};

/// Start node: emits its configured payload, or the current variables
pub struct TriggerNode;

#[async_trait]
impl NodeHandler for TriggerNode {
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        if let Some(payload) = ctx.config.get("payload") {
            return Ok(NodeOutput::new(payload.clone()));
        }

        let variables = ctx.variables.snapshot().await;
        tracing::debug!("Trigger {} fired with {} variables", ctx.node_id, variables.len());
        Ok(NodeOutput::new(Value::Object(variables)))
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata {
            description: "Start a workflow with a payload or the initial variables".to_string(),
            category: "trigger".to_string(),
        }
    }
}
