use async_trait::async_trait;
use nodeflow_core::{HandlerMetadata, NodeContext, NodeError, NodeHandler, NodeOutput};

/// Writes `config.key` into the execution variables.
///
/// The value comes from `config.value`, or the first input when no value is
/// configured. Outputs the written value.
pub struct SetVariableNode;

#[async_trait]
impl NodeHandler for SetVariableNode {
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let key = ctx.require_config_str("key")?.to_string();
        let value = match ctx.config.get("value") {
            Some(value) => value.clone(),
            None => ctx
                .first_input()
                .cloned()
                .ok_or_else(|| NodeError::MissingInput("value".to_string()))?,
        };

        let previous = ctx.variables.set(key.clone(), value.clone()).await;
        tracing::debug!(
            "Variable {} set to {} (was {})",
            key,
            value,
            previous.map(|v| v.to_string()).unwrap_or_else(|| "unset".to_string())
        );

        Ok(NodeOutput::new(value))
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata {
            description: "Set an execution variable".to_string(),
            category: "data".to_string(),
        }
    }
}
