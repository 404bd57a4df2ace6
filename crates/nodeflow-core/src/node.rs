use crate::{ExecutionId, NodeError, NodeId, Value, Variables};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Capability bound to a node type tag and invoked by the engine.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    /// Run the node with the given context
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError>;

    /// Optional: description shown by tooling
    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata::default()
    }
}

/// Everything a handler gets to see for one invocation.
#[derive(Clone, Debug)]
pub struct NodeContext {
    pub execution_id: ExecutionId,

    pub node_id: NodeId,

    pub node_type: String,

    /// Static configuration for this node
    pub config: HashMap<String, Value>,

    /// Execution-wide variables; write through `set`/`update` only
    pub variables: Variables,

    /// Outputs of the active upstream edges, in edge registration order
    pub inputs: Vec<Value>,

    /// Signalled when the execution is cancelled or fails elsewhere
    pub cancellation: CancellationToken,
}

impl NodeContext {
    pub fn new(node_id: impl Into<NodeId>, node_type: impl Into<String>) -> Self {
        Self {
            execution_id: ExecutionId::nil(),
            node_id: node_id.into(),
            node_type: node_type.into(),
            config: HashMap::new(),
            variables: Variables::default(),
            inputs: Vec::new(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_input(mut self, value: impl Into<Value>) -> Self {
        self.inputs.push(value.into());
        self
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    /// Get config value or return error
    pub fn require_config(&self, name: &str) -> Result<&Value, NodeError> {
        self.config
            .get(name)
            .ok_or_else(|| NodeError::Configuration(format!("Missing config: {}", name)))
    }

    /// Get a string config value or return error
    pub fn require_config_str(&self, name: &str) -> Result<&str, NodeError> {
        let value = self.require_config(name)?;
        value.as_str().ok_or_else(|| NodeError::InvalidInputType {
            field: name.to_string(),
            expected: "string".to_string(),
            actual: value.type_name().to_string(),
        })
    }

    /// Get config with default
    pub fn get_config_or(&self, name: &str, default: Value) -> Value {
        self.config.get(name).cloned().unwrap_or(default)
    }

    pub fn first_input(&self) -> Option<&Value> {
        self.inputs.first()
    }

    /// Inputs collapsed to one value: null, the single input, or an array.
    pub fn merged_inputs(&self) -> Value {
        match self.inputs.as_slice() {
            [] => Value::Null,
            [single] => single.clone(),
            many => Value::Array(many.to_vec()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Fail fast with `NodeError::Cancelled` once the token fired.
    pub fn check_cancelled(&self) -> Result<(), NodeError> {
        if self.is_cancelled() {
            Err(NodeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Which outgoing edges a finished node activates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Route {
    /// Every outgoing edge.
    #[default]
    All,
    /// Only edges whose handle equals this one.
    Handle(String),
    /// None of them.
    NoPath,
}

/// Output from node execution
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeOutput {
    pub value: Value,
    pub route: Route,
}

impl NodeOutput {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            route: Route::All,
        }
    }

    /// Output that activates only the edges labelled `handle`.
    pub fn routed(value: impl Into<Value>, handle: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            route: Route::Handle(handle.into()),
        }
    }

    /// Output that activates no outgoing edge.
    pub fn no_path(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            route: Route::NoPath,
        }
    }
}

/// Metadata about a handler
#[derive(Debug, Clone)]
pub struct HandlerMetadata {
    pub description: String,
    pub category: String,
}

impl Default for HandlerMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
        }
    }
}

/// Adapts an async closure into a [`NodeHandler`].
pub struct FnHandler<F> {
    f: F,
    metadata: HandlerMetadata,
}

impl<F> FnHandler<F> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            metadata: HandlerMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: HandlerMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

#[async_trait]
impl<F, Fut> NodeHandler for FnHandler<F>
where
    F: Fn(NodeContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<NodeOutput, NodeError>> + Send + 'static,
{
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        (self.f)(ctx).await
    }

    fn metadata(&self) -> HandlerMetadata {
        self.metadata.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fn_handler_runs_closure() {
        let handler = FnHandler::new(|ctx: NodeContext| async move {
            Ok::<_, NodeError>(NodeOutput::new(ctx.inputs.len()))
        });
        let ctx = NodeContext::new("n", "count").with_input(1.0).with_input("x");
        let output = handler.execute(ctx).await.unwrap();
        assert_eq!(output.value, Value::Number(2.0));
        assert_eq!(output.route, Route::All);
    }

    #[test]
    fn merged_inputs_shapes() {
        let ctx = NodeContext::new("n", "t");
        assert_eq!(ctx.merged_inputs(), Value::Null);
        let ctx = ctx.with_input("a");
        assert_eq!(ctx.merged_inputs(), Value::from("a"));
        let ctx = ctx.with_input("b");
        assert_eq!(
            ctx.merged_inputs(),
            Value::Array(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn missing_config_is_a_configuration_error() {
        let ctx = NodeContext::new("n", "t").with_config("count", 3.0);
        assert!(matches!(
            ctx.require_config("absent"),
            Err(NodeError::Configuration(_))
        ));
        assert!(matches!(
            ctx.require_config_str("count"),
            Err(NodeError::InvalidInputType { .. })
        ));
    }
}
