//! Shared state for the scrape server handlers.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::TaskIdentityCache;
use crate::ingestion::IngestionLoop;
use crate::metrics::MetricRegistry;

/// Read-only handles the HTTP layer needs; the ingestion loop owns all writes
#[derive(Debug)]
pub struct ExporterWebState {
    pub registry: Arc<MetricRegistry>,
    pub ingestion: Arc<IngestionLoop>,
    pub request_timeout: Duration,
    start_time: Instant,
    started_at: DateTime<Utc>,
}

impl ExporterWebState {
    pub fn new(
        registry: Arc<MetricRegistry>,
        ingestion: Arc<IngestionLoop>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            ingestion,
            request_timeout,
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }

    pub fn cache(&self) -> &TaskIdentityCache {
        self.ingestion.router().cache()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
