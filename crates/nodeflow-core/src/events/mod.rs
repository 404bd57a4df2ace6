// crates/nodeflow-core/src/events/mod.rs

mod base;
mod sink;

pub use base::{EventKind, ExecutionEvent};
pub use sink::{EventBus, EventEmitter, EventSink, NoopSink};
