//! # Ingestion Loop
//!
//! Drains an [`EventSource`] and dispatches each event:
//!
//! ```text
//! EventSource ──► IngestionLoop ──┬── Task    ──► EventRouter ──► MetricRegistry
//!                                 ├── Worker  ──► celery_up{host}
//!                                 └── Generic ──► log only
//! ```
//!
//! Events are handled one at a time in arrival order. Nothing inside the loop is
//! fatal: malformed payloads are skipped by the source and unrecognized types
//! are logged. The loop ends when the source reports it is closed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::events::{CeleryEvent, EventSource, GenericEvent, WorkerEvent};
use crate::router::{EventRouter, RouterStats};

#[derive(Debug, Default)]
struct AtomicIngestionStats {
    events_seen: AtomicU64,
    task_events: AtomicU64,
    worker_events: AtomicU64,
    generic_events: AtomicU64,
}

/// Point-in-time ingestion counters, including the router's
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct IngestionStats {
    pub events_seen: u64,
    pub task_events: u64,
    pub worker_events: u64,
    pub generic_events: u64,
    pub routing: RouterStats,
}

/// Single-consumer event dispatch loop
#[derive(Debug)]
pub struct IngestionLoop {
    router: Arc<EventRouter>,
    stats: AtomicIngestionStats,
}

impl IngestionLoop {
    pub fn new(router: Arc<EventRouter>) -> Self {
        Self {
            router,
            stats: AtomicIngestionStats::default(),
        }
    }

    /// Consume `source` until it closes, returning the number of events handled
    pub async fn run<S: EventSource>(&self, mut source: S) -> u64 {
        info!(source = source.source_name(), "Event ingestion started");

        let mut handled = 0u64;
        while let Some(event) = source.next_event().await {
            self.handle(event);
            handled += 1;
        }

        warn!(
            source = source.source_name(),
            events_handled = handled,
            "Event source closed, ingestion stopped"
        );
        handled
    }

    /// Dispatch a single decoded event
    pub fn handle(&self, event: CeleryEvent) {
        self.stats.events_seen.fetch_add(1, Ordering::Relaxed);

        match event {
            CeleryEvent::Task(task) => {
                self.stats.task_events.fetch_add(1, Ordering::Relaxed);
                self.router.route(&task);
            }
            CeleryEvent::Worker(worker) => {
                self.stats.worker_events.fetch_add(1, Ordering::Relaxed);
                self.handle_worker(&worker);
            }
            CeleryEvent::Generic(generic) => {
                self.stats.generic_events.fetch_add(1, Ordering::Relaxed);
                self.handle_generic(&generic);
            }
        }
    }

    fn handle_worker(&self, event: &WorkerEvent) {
        if event.hostname.is_empty() {
            debug!(kind = ?event.kind, "Ignoring worker event without hostname");
            return;
        }

        match event.kind.is_alive() {
            Some(up) => {
                debug!(hostname = %event.hostname, kind = ?event.kind, up, "Worker presence");
                self.router.registry().set_worker_up(&event.hostname, up);
            }
            None => {
                debug!(hostname = %event.hostname, kind = ?event.kind, "Ignoring worker event");
            }
        }
    }

    fn handle_generic(&self, event: &GenericEvent) {
        info!(
            event_type = %event.event_type,
            hostname = ?event.hostname,
            field_count = event.fields.len(),
            "Unrecognized event"
        );
        debug!(event_type = %event.event_type, fields = ?event.fields, "Unrecognized event fields");
    }

    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    pub fn get_statistics(&self) -> IngestionStats {
        IngestionStats {
            events_seen: self.stats.events_seen.load(Ordering::Relaxed),
            task_events: self.stats.task_events.load(Ordering::Relaxed),
            worker_events: self.stats.worker_events.load(Ordering::Relaxed),
            generic_events: self.stats.generic_events.load(Ordering::Relaxed),
            routing: self.router.get_statistics(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TaskIdentityCache;
    use crate::events::{ChannelEventSource, TaskEvent, WorkerEventKind};
    use crate::metrics::{MetricRegistry, SummaryOptions, TASK_RECEIVED, WORKER_UP};
    use serde_json::Map;

    fn ingestion() -> IngestionLoop {
        let registry = Arc::new(MetricRegistry::new(SummaryOptions::default()).unwrap());
        let router = EventRouter::new(TaskIdentityCache::default(), registry);
        IngestionLoop::new(Arc::new(router))
    }

    fn worker(hostname: &str, kind: WorkerEventKind) -> CeleryEvent {
        CeleryEvent::Worker(WorkerEvent {
            hostname: hostname.to_string(),
            kind,
        })
    }

    #[tokio::test]
    async fn test_run_drains_source_until_closed() {
        let ingestion = ingestion();
        let (sender, source) = ChannelEventSource::channel(16);

        sender
            .send(TaskEvent::received("1", "tasks.add", "h1").into())
            .await
            .unwrap();
        sender.send(TaskEvent::started("1", "h1").into()).await.unwrap();
        drop(sender);

        assert_eq!(ingestion.run(source).await, 2);

        let stats = ingestion.get_statistics();
        assert_eq!(stats.events_seen, 2);
        assert_eq!(stats.task_events, 2);
        assert_eq!(stats.routing.applied, 2);
    }

    #[test]
    fn test_worker_presence_updates_gauge() {
        let ingestion = ingestion();
        let registry = ingestion.router().registry().clone();

        ingestion.handle(worker("w1", WorkerEventKind::Online));
        assert_eq!(registry.value(WORKER_UP, &[("host", "w1")]), Some(1.0));

        ingestion.handle(worker("w1", WorkerEventKind::Offline));
        assert_eq!(registry.value(WORKER_UP, &[("host", "w1")]), Some(0.0));

        ingestion.handle(worker("w1", WorkerEventKind::Heartbeat));
        assert_eq!(registry.value(WORKER_UP, &[("host", "w1")]), Some(1.0));
    }

    #[test]
    fn test_other_worker_events_leave_gauge_alone() {
        let ingestion = ingestion();
        ingestion.handle(worker("w1", WorkerEventKind::Other("worker-custom".to_string())));

        assert_eq!(ingestion.router().registry().series_count(), 0);
        assert_eq!(ingestion.get_statistics().worker_events, 1);
    }

    #[test]
    fn test_worker_event_without_hostname_leaves_gauge_alone() {
        let ingestion = ingestion();
        ingestion.handle(worker("", WorkerEventKind::Online));
        ingestion.handle(worker("", WorkerEventKind::Heartbeat));

        assert_eq!(ingestion.router().registry().series_count(), 0);
        assert_eq!(ingestion.router().registry().value(WORKER_UP, &[("host", "")]), None);
        assert_eq!(ingestion.get_statistics().worker_events, 2);
    }

    #[test]
    fn test_generic_events_with_fields_only_count() {
        let ingestion = ingestion();
        let mut fields = Map::new();
        fields.insert("timestamp".to_string(), serde_json::json!(1700000000.5));
        fields.insert("payload".to_string(), serde_json::json!({"k": [1, 2]}));
        ingestion.handle(CeleryEvent::Generic(GenericEvent {
            event_type: "custom-event".to_string(),
            hostname: None,
            fields,
        }));

        assert_eq!(ingestion.get_statistics().generic_events, 1);
        assert_eq!(ingestion.router().registry().series_count(), 0);
    }

    #[test]
    fn test_generic_events_only_count() {
        let ingestion = ingestion();
        ingestion.handle(CeleryEvent::Generic(GenericEvent {
            event_type: "custom-event".to_string(),
            hostname: Some("h1".to_string()),
            fields: Map::new(),
        }));

        let stats = ingestion.get_statistics();
        assert_eq!(stats.generic_events, 1);
        assert_eq!(stats.routing.routed, 0);
        assert_eq!(ingestion.router().registry().series_count(), 0);
    }

    #[test]
    fn test_task_events_reach_registry() {
        let ingestion = ingestion();
        ingestion.handle(TaskEvent::received("1", "tasks.add", "h1").into());

        assert_eq!(
            ingestion
                .router()
                .registry()
                .value(TASK_RECEIVED, &[("name", "tasks.add"), ("hostname", "h1")]),
            Some(1.0)
        );
    }
}
