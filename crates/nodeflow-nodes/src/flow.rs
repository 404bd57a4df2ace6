use async_trait::async_trait;
use nodeflow_core::{HandlerMetadata, NodeContext, NodeError, NodeHandler, NodeOutput};

/// Fork point: passes its inputs on to every outgoing branch
pub struct ParallelNode;

#[async_trait]
impl NodeHandler for ParallelNode {
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        Ok(NodeOutput::new(ctx.merged_inputs()))
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata {
            description: "Run all downstream branches concurrently".to_string(),
            category: "flow".to_string(),
        }
    }
}
