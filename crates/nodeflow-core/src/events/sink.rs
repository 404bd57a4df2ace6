use super::base::{EventKind, ExecutionEvent};
use crate::ExecutionId;
use std::sync::Arc;
use tokio::sync::broadcast;

/// External consumer of execution events.
///
/// `emit` is fire-and-forget and must never block the engine.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ExecutionEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: ExecutionEvent) {}
}

/// In-process broadcast bus; slow subscribers lag instead of blocking.
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: ExecutionEvent) {
        let _ = self.sender.send(event);
    }
}

/// Per-execution emitter that stamps events and fans them out to every sink.
#[derive(Clone)]
pub struct EventEmitter {
    execution_id: ExecutionId,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl EventEmitter {
    pub fn new(execution_id: ExecutionId, sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self {
            execution_id,
            sinks,
        }
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    pub fn emit(&self, kind: EventKind) {
        let event = ExecutionEvent::new(self.execution_id, kind);
        tracing::trace!(execution_id = %self.execution_id, event = event.type_name(), "emit");
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.emit(event.clone());
            }
            last.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emitter_fans_out_to_bus() {
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let execution_id = ExecutionId::new_v4();
        let emitter = EventEmitter::new(execution_id, vec![bus.clone(), Arc::new(NoopSink)]);

        emitter.emit(EventKind::Paused);
        emitter.emit(EventKind::Resumed);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.execution_id, execution_id);
        assert_eq!(first.kind, EventKind::Paused);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::Resumed);
    }

    #[test]
    fn emit_without_subscribers_does_not_fail() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit(ExecutionEvent::new(ExecutionId::new_v4(), EventKind::Cancelled));
    }
}
