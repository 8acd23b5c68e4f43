//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use celery_exporter::cache::TaskIdentityCache;
use celery_exporter::events::{TaskEvent, TaskEventType};
use celery_exporter::ingestion::IngestionLoop;
use celery_exporter::metrics::{MetricRegistry, SummaryOptions};
use celery_exporter::router::EventRouter;

/// Registry plus an ingestion loop wired the way bootstrap wires them
pub struct TestExporter {
    pub registry: Arc<MetricRegistry>,
    pub ingestion: Arc<IngestionLoop>,
}

impl TestExporter {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(600))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        let registry = Arc::new(
            MetricRegistry::new(SummaryOptions::default()).expect("Failed to create registry"),
        );
        let router = EventRouter::new(TaskIdentityCache::new(ttl), registry.clone());
        Self {
            registry,
            ingestion: Arc::new(IngestionLoop::new(Arc::new(router))),
        }
    }

    pub fn send(&self, event: TaskEvent) {
        self.ingestion.handle(event.into());
    }

    /// Counter value, treating a never-created series as zero
    pub fn counter(&self, metric: &str, labels: &[(&str, &str)]) -> f64 {
        self.registry.value(metric, labels).unwrap_or(0.0)
    }
}

pub fn name_host<'a>(name: &'a str, hostname: &'a str) -> [(&'static str, &'a str); 2] {
    [("name", name), ("hostname", hostname)]
}

pub fn failed(uuid: &str, hostname: &str) -> TaskEvent {
    TaskEvent::new(uuid, TaskEventType::Failed).with_hostname(hostname)
}

pub fn retried(uuid: &str, hostname: &str) -> TaskEvent {
    TaskEvent::new(uuid, TaskEventType::Retried).with_hostname(hostname)
}

pub fn revoked(uuid: &str) -> TaskEvent {
    TaskEvent::new(uuid, TaskEventType::Revoked)
}

pub fn rejected(uuid: &str) -> TaskEvent {
    TaskEvent::new(uuid, TaskEventType::Rejected)
}
