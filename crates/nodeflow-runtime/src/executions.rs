use crate::context::ExecutionContext;
use crate::executor::{Control, ControlCommand};
use nodeflow_core::{ExecutionId, ExecutionSnapshot, ExecutionStatus, FlowError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};

/// Control-side view of one running execution.
///
/// Reads go straight to the shared context; pause/resume/cancel are sent to
/// the execution's scheduler task, which applies them in order.
#[derive(Clone)]
pub struct ExecutionHandle {
    context: Arc<ExecutionContext>,
    commands: mpsc::Sender<ControlCommand>,
}

impl ExecutionHandle {
    pub(crate) fn new(context: Arc<ExecutionContext>, commands: mpsc::Sender<ControlCommand>) -> Self {
        Self { context, commands }
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.context.execution_id()
    }

    pub fn status(&self) -> ExecutionStatus {
        self.context.status()
    }

    pub async fn snapshot(&self) -> ExecutionSnapshot {
        self.context.snapshot().await
    }

    pub async fn pause(&self) -> Result<(), FlowError> {
        self.send(Control::Pause).await
    }

    pub async fn resume(&self) -> Result<(), FlowError> {
        self.send(Control::Resume).await
    }

    pub async fn cancel(&self) -> Result<(), FlowError> {
        self.send(Control::Cancel).await
    }

    /// Wait until the execution reaches a terminal status.
    pub async fn wait(&self) -> ExecutionSnapshot {
        let mut status = self.context.subscribe_status();
        while !status.borrow_and_update().is_terminal() {
            if status.changed().await.is_err() {
                break;
            }
        }
        self.context.snapshot().await
    }

    async fn send(&self, control: Control) -> Result<(), FlowError> {
        let execution_id = self.execution_id();
        if self.status().is_terminal() {
            return Err(FlowError::ExecutionNotActive(execution_id));
        }

        let (reply, response) = oneshot::channel();
        self.commands
            .send(ControlCommand { control, reply })
            .await
            .map_err(|_| FlowError::ExecutionNotActive(execution_id))?;

        // The scheduler drops queued commands once it has finished.
        response
            .await
            .map_err(|_| FlowError::ExecutionNotActive(execution_id))?
    }
}

/// Table of active executions, injected into the runtime.
#[derive(Default)]
pub struct ExecutionRegistry {
    entries: RwLock<HashMap<ExecutionId, ExecutionHandle>>,
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, handle: ExecutionHandle) {
        self.entries
            .write()
            .await
            .insert(handle.execution_id(), handle);
    }

    pub async fn get(&self, execution_id: ExecutionId) -> Option<ExecutionHandle> {
        self.entries.read().await.get(&execution_id).cloned()
    }

    /// Handle for a control command; unknown or finished ids are not active.
    pub async fn active(&self, execution_id: ExecutionId) -> Result<ExecutionHandle, FlowError> {
        match self.get(execution_id).await {
            Some(handle) if !handle.status().is_terminal() => Ok(handle),
            _ => Err(FlowError::ExecutionNotActive(execution_id)),
        }
    }

    pub async fn remove(&self, execution_id: ExecutionId) -> Option<ExecutionHandle> {
        self.entries.write().await.remove(&execution_id)
    }

    pub async fn ids(&self) -> Vec<ExecutionId> {
        self.entries.read().await.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
