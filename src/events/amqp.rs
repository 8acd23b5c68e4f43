//! # RabbitMQ Event Source
//!
//! Consumes Celery's monitoring exchange over AMQP 0.9.1 using `lapin`.
//!
//! ## Topology
//!
//! ```text
//! celeryev (topic, durable)
//!     |  routing key "#"
//!     v
//! celeryev.<uuid v4> (exclusive, auto-delete)
//!     |  basic_consume (no_ack)
//!     v
//! decode_events() -> CeleryEvent...
//! ```
//!
//! The queue belongs to this process only; events published while the exporter
//! is down are never seen, which is why identity correlation has to tolerate
//! missing `task-received` events.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicConsumeOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::source::EventSource;
use super::types::{decode_events, CeleryEvent};
use crate::error::{ExporterError, ExporterResult};

/// Event source bound to a private queue on the Celery event exchange
pub struct AmqpEventSource {
    /// Held so the connection outlives the consumer
    _connection: Connection,
    _channel: Channel,
    consumer: Consumer,
    queue_name: String,
    /// Events decoded from a grouped message but not yet handed out
    pending: VecDeque<CeleryEvent>,
}

impl std::fmt::Debug for AmqpEventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmqpEventSource")
            .field("queue_name", &self.queue_name)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl AmqpEventSource {
    /// Connect to the broker and start consuming the event exchange.
    ///
    /// Any failure here is a startup failure; there is no retry.
    pub async fn connect(broker_uri: &str, exchange: &str) -> ExporterResult<Self> {
        let connection = Connection::connect(
            broker_uri,
            ConnectionProperties::default().with_connection_name("celery-exporter".into()),
        )
        .await
        .map_err(|e| {
            ExporterError::BrokerError(format!(
                "connection to {} failed: {}",
                redact_uri(broker_uri),
                e
            ))
        })?;

        let channel = connection.create_channel().await.map_err(|e| {
            ExporterError::BrokerError(format!("channel creation failed: {}", e))
        })?;

        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                ExporterError::BrokerError(format!("exchange '{}' declare failed: {}", exchange, e))
            })?;

        let queue_name = format!("{}.{}", exchange, Uuid::new_v4());

        channel
            .queue_declare(
                &queue_name,
                QueueDeclareOptions {
                    exclusive: true,
                    auto_delete: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                ExporterError::BrokerError(format!("queue '{}' declare failed: {}", queue_name, e))
            })?;

        channel
            .queue_bind(
                &queue_name,
                exchange,
                "#",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                ExporterError::BrokerError(format!("queue '{}' bind failed: {}", queue_name, e))
            })?;

        let consumer = channel
            .basic_consume(
                &queue_name,
                "celery-exporter",
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                ExporterError::BrokerError(format!("consume on '{}' failed: {}", queue_name, e))
            })?;

        info!(
            broker = %redact_uri(broker_uri),
            exchange = %exchange,
            queue = %queue_name,
            "Connected to Celery event exchange"
        );

        Ok(Self {
            _connection: connection,
            _channel: channel,
            consumer,
            queue_name,
            pending: VecDeque::new(),
        })
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }
}

#[async_trait]
impl EventSource for AmqpEventSource {
    async fn next_event(&mut self) -> Option<CeleryEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }

            match self.consumer.next().await {
                Some(Ok(delivery)) => match decode_events(&delivery.data) {
                    Ok(events) => {
                        debug!(
                            queue = %self.queue_name,
                            count = events.len(),
                            "Decoded event message"
                        );
                        self.pending.extend(events);
                    }
                    Err(e) => {
                        warn!(
                            queue = %self.queue_name,
                            error = %e,
                            bytes = delivery.data.len(),
                            "Skipping undecodable event message"
                        );
                    }
                },
                Some(Err(e)) => {
                    error!(queue = %self.queue_name, error = %e, "Event consumer failed");
                    return None;
                }
                None => {
                    info!(queue = %self.queue_name, "Event consumer closed");
                    return None;
                }
            }
        }
    }

    fn source_name(&self) -> &'static str {
        "amqp"
    }
}

/// Strip credentials from a broker URI for logging
pub fn redact_uri(uri: &str) -> String {
    match (uri.find("://"), uri.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}***@{}", &uri[..scheme_end + 3], &uri[at + 1..])
        }
        _ => uri.to_string(),
    }
}
