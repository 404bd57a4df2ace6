use async_trait::async_trait;
use nodeflow_core::{HandlerMetadata, NodeContext, NodeError, NodeHandler, NodeOutput, Value};

const DEFAULT_MAX_ITERATIONS: u64 = 10_000;

/// Iterates either a fixed number of times or over an array, producing one
/// record per iteration.
///
/// Config:
/// - `mode`: `"iteration"` (default) or `"collection"`
/// - `count`: iterations to run in iteration mode
/// - `variable`: array-valued variable to walk in collection mode; the first
///   input is used when absent
/// - `item_variable`: optional variable updated with the current item (or
///   index) on every iteration
/// - `max_iterations`: upper bound, defaults to 10000
pub struct LoopNode;

impl LoopNode {
    async fn items(ctx: &NodeContext) -> Result<Vec<Value>, NodeError> {
        let source = match ctx.config.get("variable").and_then(|v| v.as_str()) {
            Some(name) => ctx
                .variables
                .get(name)
                .await
                .ok_or_else(|| NodeError::MissingVariable(name.to_string()))?,
            None => ctx
                .first_input()
                .cloned()
                .ok_or_else(|| NodeError::MissingInput("collection".to_string()))?,
        };

        match source {
            Value::Array(items) => Ok(items),
            other => Err(NodeError::InvalidInputType {
                field: "collection".to_string(),
                expected: "array".to_string(),
                actual: other.type_name().to_string(),
            }),
        }
    }
}

#[async_trait]
impl NodeHandler for LoopNode {
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let mode = ctx
            .config
            .get("mode")
            .and_then(|v| v.as_str())
            .unwrap_or("iteration");
        let max_iterations = ctx
            .config
            .get("max_iterations")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_MAX_ITERATIONS);

        let items: Vec<Option<Value>> = match mode {
            "iteration" => {
                let count = ctx.require_config("count")?;
                let count = count.as_u64().ok_or_else(|| NodeError::InvalidInputType {
                    field: "count".to_string(),
                    expected: "non-negative integer".to_string(),
                    actual: count.type_name().to_string(),
                })?;
                if count > max_iterations {
                    return Err(NodeError::Configuration(format!(
                        "count {} exceeds max_iterations {}",
                        count, max_iterations
                    )));
                }
                (0..count).map(|_| None).collect()
            }
            "collection" => {
                let items = Self::items(&ctx).await?;
                if items.len() as u64 > max_iterations {
                    return Err(NodeError::Configuration(format!(
                        "collection of {} items exceeds max_iterations {}",
                        items.len(),
                        max_iterations
                    )));
                }
                items.into_iter().map(Some).collect()
            }
            other => {
                return Err(NodeError::Configuration(format!(
                    "unknown loop mode '{}'",
                    other
                )))
            }
        };

        let item_variable = ctx.config.get("item_variable").and_then(|v| v.as_str());
        let mut records = Vec::with_capacity(items.len());

        for (index, item) in items.into_iter().enumerate() {
            ctx.check_cancelled()?;

            if let Some(name) = item_variable {
                let current = item.clone().unwrap_or(Value::from(index));
                ctx.variables.set(name, current).await;
            }

            let mut record = vec![("index", Value::from(index))];
            if let Some(item) = item {
                record.push(("item", item));
            }
            records.push(Value::object(record));

            tokio::task::yield_now().await;
        }

        tracing::debug!("Loop {} finished {} iterations", ctx.node_id, records.len());
        Ok(NodeOutput::new(Value::Array(records)))
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata {
            description: "Repeat a fixed number of times or over a collection".to_string(),
            category: "flow".to_string(),
        }
    }
}
