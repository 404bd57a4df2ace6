use async_trait::async_trait;
use nodeflow_core::{HandlerMetadata, NodeContext, NodeError, NodeHandler, NodeOutput};
use tokio::time::{sleep, Duration};

/// Delay execution for a specified duration
pub struct DelayNode;

#[async_trait]
impl NodeHandler for DelayNode {
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let delay_ms = match ctx.config.get("delay_ms") {
            None => 1000,
            Some(value) => value.as_u64().ok_or_else(|| NodeError::InvalidInputType {
                field: "delay_ms".to_string(),
                expected: "non-negative number".to_string(),
                actual: value.type_name().to_string(),
            })?,
        };

        tracing::debug!("Delaying {} for {}ms", ctx.node_id, delay_ms);

        tokio::select! {
            _ = sleep(Duration::from_millis(delay_ms)) => {}
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
        }

        // Pass through any inputs
        Ok(NodeOutput::new(ctx.merged_inputs()))
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata {
            description: "Delay execution for specified milliseconds".to_string(),
            category: "time".to_string(),
        }
    }
}
