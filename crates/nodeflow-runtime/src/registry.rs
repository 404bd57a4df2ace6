use nodeflow_core::{
    FlowError, FnHandler, HandlerMetadata, NodeContext, NodeError, NodeHandler, NodeOutput,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Registry of available node types
pub struct NodeRegistry {
    handlers: HashMap<String, Arc<dyn NodeHandler>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under a node type tag, replacing any previous one
    pub fn register(&mut self, node_type: impl Into<String>, handler: Arc<dyn NodeHandler>) {
        let node_type = node_type.into();
        tracing::info!("Registering node type: {}", node_type);
        if self.handlers.insert(node_type.clone(), handler).is_some() {
            tracing::warn!("Node type {} was already registered; replaced", node_type);
        }
    }

    /// Register an async closure as a handler
    pub fn register_fn<F, Fut>(&mut self, node_type: impl Into<String>, f: F)
    where
        F: Fn(NodeContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<NodeOutput, NodeError>> + Send + 'static,
    {
        self.register(node_type, Arc::new(FnHandler::new(f)));
    }

    /// Look up the handler for a node type
    pub fn resolve(&self, node_type: &str) -> Result<Arc<dyn NodeHandler>, FlowError> {
        self.handlers
            .get(node_type)
            .cloned()
            .ok_or_else(|| FlowError::UnknownNodeType(node_type.to_string()))
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.handlers.contains_key(node_type)
    }

    /// Get all registered node types, sorted
    pub fn list_node_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Get metadata for a node type
    pub fn metadata(&self, node_type: &str) -> Option<HandlerMetadata> {
        self.handlers.get(node_type).map(|h| h.metadata())
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
