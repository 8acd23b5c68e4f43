//! # Celery Event Stream
//!
//! Typed events and the sources that produce them.

pub mod amqp;
pub mod source;
pub mod types;

pub use amqp::AmqpEventSource;
pub use source::{ChannelEventSource, EventSource};
pub use types::{
    decode_events, CeleryEvent, GenericEvent, TaskEvent, TaskEventType, WorkerEvent,
    WorkerEventKind,
};
