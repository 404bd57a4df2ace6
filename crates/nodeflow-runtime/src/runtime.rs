use crate::context::ExecutionContext;
use crate::executions::{ExecutionHandle, ExecutionRegistry};
use crate::executor::ExecutionRun;
use crate::registry::NodeRegistry;
use crate::store::{ExecutionStore, InMemoryExecutionStore};
use nodeflow_core::{
    EventBus, EventEmitter, EventKind, EventSink, ExecutionEvent, ExecutionId, ExecutionSnapshot,
    ExecutionStatus, FlowError, Value, WorkflowGraph,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Control API of the engine: starts executions and steers them by id.
pub struct FlowRuntime {
    registry: Arc<NodeRegistry>,
    executions: Arc<ExecutionRegistry>,
    event_bus: Arc<EventBus>,
    sinks: Vec<Arc<dyn EventSink>>,
    store: Arc<dyn ExecutionStore>,
    config: RuntimeConfig,
}

impl FlowRuntime {
    /// Create a runtime with default settings
    pub fn new(registry: NodeRegistry) -> Self {
        Self::with_registry(Arc::new(registry), RuntimeConfig::default())
    }

    /// Create a runtime around a pre-configured registry
    pub fn with_registry(registry: Arc<NodeRegistry>, config: RuntimeConfig) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size.max(1)));

        Self {
            registry,
            executions: Arc::new(ExecutionRegistry::new()),
            event_bus,
            sinks: Vec::new(),
            store: Arc::new(InMemoryExecutionStore::new()),
            config,
        }
    }

    /// Use `store` as the persistence collaborator
    pub fn with_store(mut self, store: Arc<dyn ExecutionStore>) -> Self {
        self.store = store;
        self
    }

    /// Also deliver every event to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Share an execution table with other runtimes
    pub fn with_executions(mut self, executions: Arc<ExecutionRegistry>) -> Self {
        self.executions = executions;
        self
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn executions(&self) -> &Arc<ExecutionRegistry> {
        &self.executions
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    /// Validate `graph` and start executing it in the background.
    ///
    /// An invalid graph is rejected before any execution id is issued.
    pub async fn start(
        &self,
        graph: WorkflowGraph,
        initial_variables: HashMap<String, Value>,
    ) -> Result<ExecutionId, FlowError> {
        graph.validate()?;

        let graph = Arc::new(graph);
        let execution_id = ExecutionId::new_v4();
        let context = Arc::new(ExecutionContext::new(
            execution_id,
            graph.id,
            &graph.nodes,
            initial_variables,
        ));

        self.store.record_execution(&context.snapshot().await).await?;

        let (commands_tx, commands_rx) = mpsc::channel(self.config.command_buffer.max(1));
        self.executions
            .insert(ExecutionHandle::new(context.clone(), commands_tx))
            .await;
        context.transition(ExecutionStatus::Running)?;

        let events = EventEmitter::new(execution_id, self.sinks());
        events.emit(EventKind::Started {
            workflow_id: graph.id,
        });
        tracing::info!("Started execution {} of workflow {}", execution_id, graph.id);

        let run = ExecutionRun::new(
            graph,
            self.registry.clone(),
            context.clone(),
            events,
            commands_rx,
            self.config.max_parallel_nodes,
        );
        let store = self.store.clone();
        let executions = self.executions.clone();
        tokio::spawn(async move {
            run.run().await;
            persist_and_evict(context, store, executions).await;
        });

        Ok(execution_id)
    }

    /// Start an execution and wait for its terminal snapshot
    pub async fn run(
        &self,
        graph: WorkflowGraph,
        initial_variables: HashMap<String, Value>,
    ) -> Result<ExecutionSnapshot, FlowError> {
        let execution_id = self.start(graph, initial_variables).await?;
        self.wait(execution_id).await
    }

    pub async fn pause(&self, execution_id: ExecutionId) -> Result<(), FlowError> {
        self.executions.active(execution_id).await?.pause().await
    }

    pub async fn resume(&self, execution_id: ExecutionId) -> Result<(), FlowError> {
        self.executions.active(execution_id).await?.resume().await
    }

    pub async fn cancel(&self, execution_id: ExecutionId) -> Result<(), FlowError> {
        self.executions.active(execution_id).await?.cancel().await
    }

    /// Current snapshot of an execution, falling back to the store once the
    /// execution has left the registry.
    pub async fn get_status(&self, execution_id: ExecutionId) -> Result<ExecutionSnapshot, FlowError> {
        match self.executions.get(execution_id).await {
            Some(handle) => Ok(handle.snapshot().await),
            None => self.recorded(execution_id).await,
        }
    }

    /// Wait until the execution is terminal and return its snapshot.
    pub async fn wait(&self, execution_id: ExecutionId) -> Result<ExecutionSnapshot, FlowError> {
        match self.executions.get(execution_id).await {
            Some(handle) => Ok(handle.wait().await),
            None => self.recorded(execution_id).await,
        }
    }

    /// Ids of executions still held in the registry
    pub async fn active_executions(&self) -> Vec<ExecutionId> {
        self.executions.ids().await
    }

    async fn recorded(&self, execution_id: ExecutionId) -> Result<ExecutionSnapshot, FlowError> {
        self.store
            .load_execution(execution_id)
            .await?
            .ok_or(FlowError::ExecutionNotActive(execution_id))
    }

    fn sinks(&self) -> Vec<Arc<dyn EventSink>> {
        let mut sinks = vec![self.event_bus.clone() as Arc<dyn EventSink>];
        sinks.extend(self.sinks.iter().cloned());
        sinks
    }
}

/// Record the terminal snapshot and drop the execution from the registry
/// once the store acknowledged it.
async fn persist_and_evict(
    context: Arc<ExecutionContext>,
    store: Arc<dyn ExecutionStore>,
    executions: Arc<ExecutionRegistry>,
) {
    let execution_id = context.execution_id();
    let snapshot = context.snapshot().await;

    match store.record_execution(&snapshot).await {
        Ok(()) => {
            executions.remove(execution_id).await;
            tracing::info!(
                "Execution {} finished as {}; evicted from registry",
                execution_id,
                snapshot.status
            );
        }
        Err(e) => {
            tracing::error!(
                "Failed to record final snapshot of execution {}: {}; keeping it registered",
                execution_id,
                e
            );
        }
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Cap on concurrently running handlers per execution; `None` is unbounded
    pub max_parallel_nodes: Option<usize>,
    pub event_buffer_size: usize,
    /// Queue depth for pause/resume/cancel commands per execution
    pub command_buffer: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_parallel_nodes: None,
            event_buffer_size: 1000,
            command_buffer: 16,
        }
    }
}
