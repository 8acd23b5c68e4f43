//! # Exporter Bootstrap
//!
//! Composition root: builds the registry, cache, router and ingestion loop,
//! connects the event source, and starts the scrape server.
//!
//! ```text
//!                   ┌──────────────┐
//! EventSource ────► │ IngestionLoop│──► EventRouter ──► TaskIdentityCache
//!                   └──────┬───────┘         │
//!                          │                 ▼
//!                          └──────────► MetricRegistry ◄── axum /metrics
//! ```
//!
//! Failing to reach the broker or bind the listener is fatal. Nothing after
//! startup is.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::cache::TaskIdentityCache;
use crate::config::ExporterConfig;
use crate::error::{ExporterError, ExporterResult};
use crate::events::amqp::redact_uri;
use crate::events::{AmqpEventSource, EventSource};
use crate::ingestion::IngestionLoop;
use crate::metrics::MetricRegistry;
use crate::router::EventRouter;
use crate::web::{create_app, ExporterWebState};

/// Running exporter: background ingestion and scrape server tasks
pub struct ExporterHandle {
    pub registry: Arc<MetricRegistry>,
    pub ingestion: Arc<IngestionLoop>,
    pub web_state: Arc<ExporterWebState>,
    /// Address the scrape server actually bound (resolves port 0)
    pub local_addr: SocketAddr,
    ingestion_task: Option<JoinHandle<u64>>,
    ingestion_result: Option<u64>,
    server_task: JoinHandle<()>,
    shutdown_sender: Option<oneshot::Sender<()>>,
}

impl std::fmt::Debug for ExporterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExporterHandle")
            .field("local_addr", &self.local_addr)
            .field("running", &self.is_running())
            .field("ingestion_events", &self.ingestion_result)
            .finish()
    }
}

impl ExporterHandle {
    pub fn is_running(&self) -> bool {
        self.shutdown_sender.is_some()
    }

    /// Wait until the event source closes; returns the number of events handled
    ///
    /// Safe to call again after completion, and safe to cancel (e.g. from
    /// `tokio::select!`) before it.
    pub async fn wait_for_ingestion(&mut self) -> ExporterResult<u64> {
        if let Some(handled) = self.ingestion_result {
            return Ok(handled);
        }

        let Some(task) = self.ingestion_task.as_mut() else {
            return Err(ExporterError::ServerError(
                "Ingestion task was aborted".to_string(),
            ));
        };

        let joined = task.await;
        self.ingestion_task = None;
        let handled = joined
            .map_err(|e| ExporterError::ServerError(format!("Ingestion task failed: {e}")))?;
        self.ingestion_result = Some(handled);
        Ok(handled)
    }

    /// Stop accepting scrapes and abort ingestion
    pub async fn stop(&mut self) -> ExporterResult<()> {
        let Some(sender) = self.shutdown_sender.take() else {
            warn!("Exporter already stopped");
            return Ok(());
        };

        // The server may already have exited on its own
        let _ = sender.send(());
        if let Some(task) = self.ingestion_task.take() {
            task.abort();
        }

        (&mut self.server_task)
            .await
            .map_err(|e| ExporterError::ServerError(format!("Scrape server task failed: {e}")))?;

        info!("Exporter stopped");
        Ok(())
    }
}

pub struct ExporterBootstrap;

impl ExporterBootstrap {
    /// Connect to the configured broker and start everything
    pub async fn bootstrap(config: &ExporterConfig) -> ExporterResult<ExporterHandle> {
        config.validate()?;

        info!(
            broker = %redact_uri(&config.broker_uri),
            exchange = %config.event_exchange,
            "Connecting to broker"
        );

        let source = AmqpEventSource::connect(&config.broker_uri, &config.event_exchange)
            .await
            .inspect_err(|e| error!(error = %e, "Failed to connect to broker"))?;

        info!(queue = %source.queue_name(), "Consuming Celery events");

        Self::bootstrap_with_source(config, source).await
    }

    /// Start the exporter on an already-connected event source
    pub async fn bootstrap_with_source<S>(
        config: &ExporterConfig,
        source: S,
    ) -> ExporterResult<ExporterHandle>
    where
        S: EventSource + 'static,
    {
        config.validate()?;

        let registry = Arc::new(MetricRegistry::new(config.summary_options())?);
        let cache = TaskIdentityCache::new(config.cache_ttl());
        let router = Arc::new(EventRouter::new(cache, registry.clone()));
        let ingestion = Arc::new(IngestionLoop::new(router));

        let web_state = Arc::new(ExporterWebState::new(
            registry.clone(),
            ingestion.clone(),
            config.request_timeout(),
        ));

        let bind_address = config.socket_addr()?;
        let listener = tokio::net::TcpListener::bind(bind_address)
            .await
            .map_err(|e| {
                ExporterError::ServerError(format!("Failed to bind to {bind_address}: {e}"))
            })?;
        let local_addr = listener.local_addr()?;

        let (shutdown_sender, shutdown_receiver) = oneshot::channel::<()>();
        let app = create_app(web_state.clone());
        let server_task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_receiver.await;
            });
            if let Err(e) = server.await {
                error!(error = %e, "Scrape server error");
            }
        });
        info!(address = %local_addr, "Scrape server listening");

        let ingestion_task = {
            let ingestion = ingestion.clone();
            tokio::spawn(async move { ingestion.run(source).await })
        };

        info!(
            cache_ttl_seconds = config.cache_ttl_seconds,
            "Exporter bootstrap completed"
        );

        Ok(ExporterHandle {
            registry,
            ingestion,
            web_state,
            local_addr,
            ingestion_task: Some(ingestion_task),
            ingestion_result: None,
            server_task,
            shutdown_sender: Some(shutdown_sender),
        })
    }
}
