use async_trait::async_trait;
use nodeflow_core::{ExecutionId, ExecutionSnapshot, FlowError};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Persistence collaborator for execution snapshots.
///
/// The runtime records a snapshot when an execution is created and again at
/// its terminal transition. While a run is active the in-memory context is
/// the only source of truth; a crash loses whatever was not recorded.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn record_execution(&self, snapshot: &ExecutionSnapshot) -> Result<(), FlowError>;

    /// Last recorded snapshot, used once an execution left the registry.
    async fn load_execution(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Option<ExecutionSnapshot>, FlowError>;
}

/// Keeps the latest snapshot per execution in memory.
#[derive(Default)]
pub struct InMemoryExecutionStore {
    snapshots: RwLock<HashMap<ExecutionId, ExecutionSnapshot>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn record_execution(&self, snapshot: &ExecutionSnapshot) -> Result<(), FlowError> {
        self.snapshots
            .write()
            .await
            .insert(snapshot.execution_id, snapshot.clone());
        Ok(())
    }

    async fn load_execution(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Option<ExecutionSnapshot>, FlowError> {
        Ok(self.snapshots.read().await.get(&execution_id).cloned())
    }
}
