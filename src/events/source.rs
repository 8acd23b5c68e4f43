//! # Event Source
//!
//! The ingestion loop consumes events through the [`EventSource`] trait so the
//! routing engine stays independent of the broker transport.
//!
//! - [`AmqpEventSource`](super::amqp::AmqpEventSource): RabbitMQ monitoring exchange
//! - [`ChannelEventSource`]: in-process tokio channel, used for embedding and tests

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::CeleryEvent;

/// An ordered sequence of decoded Celery events.
///
/// `next_event` waits until an event is available and returns `None` once the
/// underlying channel has closed for good.
#[async_trait]
pub trait EventSource: Send {
    async fn next_event(&mut self) -> Option<CeleryEvent>;

    /// Short transport name used in logs
    fn source_name(&self) -> &'static str;
}

/// Event source backed by a tokio mpsc channel
#[derive(Debug)]
pub struct ChannelEventSource {
    receiver: mpsc::Receiver<CeleryEvent>,
}

impl ChannelEventSource {
    /// Create a bounded channel and return its sending half alongside the source
    pub fn channel(buffer: usize) -> (mpsc::Sender<CeleryEvent>, Self) {
        let (sender, receiver) = mpsc::channel(buffer);
        (sender, Self { receiver })
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn next_event(&mut self) -> Option<CeleryEvent> {
        self.receiver.recv().await
    }

    fn source_name(&self) -> &'static str {
        "channel"
    }
}
