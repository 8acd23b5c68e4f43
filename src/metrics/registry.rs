//! # Metric Registry
//!
//! The fixed set of task accumulators, created once at startup and shared by
//! `Arc` between the ingestion loop (writer) and the scrape server (reader).
//!
//! Counters, gauges and the histogram are `prometheus` atomics; the summary
//! guards each label set's window with its own mutex. A scrape therefore never
//! sees a torn update, and a concurrent scrape never loses an increment.

use prometheus::proto::{Metric, MetricFamily, MetricType};
use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use tracing::warn;

use super::summary::{RuntimeSummaryVec, SummaryOptions};
use super::*;
use crate::error::{ExporterError, ExporterResult};
use crate::router::MetricUpdate;

/// Task and worker accumulators backed by a private `prometheus::Registry`
pub struct MetricRegistry {
    registry: Registry,
    task_received: CounterVec,
    task_started: CounterVec,
    task_succeeded: CounterVec,
    task_failed: CounterVec,
    task_retried: CounterVec,
    task_revoked: CounterVec,
    task_rejected: CounterVec,
    task_runtime: HistogramVec,
    task_runtime_summary: RuntimeSummaryVec,
    worker_up: IntGaugeVec,
}

impl std::fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("series", &self.series_count())
            .field("task_runtime_summary", &self.task_runtime_summary)
            .finish()
    }
}

impl MetricRegistry {
    /// Build and register every accumulator
    pub fn new(summary_options: SummaryOptions) -> ExporterResult<Self> {
        let registry = Registry::new();

        let counter = |name: &str, help: &str, labels: &[&str]| -> ExporterResult<CounterVec> {
            let vec = CounterVec::new(Opts::new(name, help), labels)?;
            registry.register(Box::new(vec.clone()))?;
            Ok(vec)
        };

        let task_received = counter(TASK_RECEIVED, "Number of received celery tasks.", NAME_HOST_LABELS)?;
        let task_started = counter(TASK_STARTED, "Number of started celery tasks.", NAME_HOST_LABELS)?;
        let task_succeeded = counter(
            TASK_SUCCEEDED,
            "Number of succeeded celery tasks.",
            NAME_HOST_LABELS,
        )?;
        let task_failed = counter(TASK_FAILED, "Number of failed celery tasks.", NAME_HOST_LABELS)?;
        let task_retried = counter(TASK_RETRIED, "Number of retried celery tasks.", NAME_HOST_LABELS)?;
        let task_revoked = counter(TASK_REVOKED, "Number of revoked celery tasks.", NAME_LABELS)?;
        let task_rejected = counter(TASK_REJECTED, "Number of rejected celery tasks.", NAME_LABELS)?;

        let task_runtime = HistogramVec::new(
            HistogramOpts::new(TASK_RUNTIME, "Histogram of task runtime measurements.").buckets(
                prometheus::linear_buckets(
                    RUNTIME_BUCKET_START,
                    RUNTIME_BUCKET_WIDTH,
                    RUNTIME_BUCKET_COUNT,
                )?,
            ),
            NAME_HOST_LABELS,
        )?;
        registry.register(Box::new(task_runtime.clone()))?;

        let task_runtime_summary = RuntimeSummaryVec::new(
            TASK_RUNTIME_SUMMARY,
            "Summary of task runtime measurements.",
            NAME_LABELS,
            summary_options,
        )?;
        registry.register(Box::new(task_runtime_summary.clone()))?;

        let worker_up = IntGaugeVec::new(Opts::new(WORKER_UP, "Is the worker up."), &["host"])?;
        registry.register(Box::new(worker_up.clone()))?;

        Ok(Self {
            registry,
            task_received,
            task_started,
            task_succeeded,
            task_failed,
            task_retried,
            task_revoked,
            task_rejected,
            task_runtime,
            task_runtime_summary,
            worker_up,
        })
    }

    /// Apply one routed update
    pub fn apply(&self, update: &MetricUpdate) {
        match update {
            MetricUpdate::Received { name, hostname } => {
                self.task_received.with_label_values(&[name.as_str(), hostname.as_str()]).inc();
            }
            MetricUpdate::Started { name, hostname } => {
                self.task_started.with_label_values(&[name.as_str(), hostname.as_str()]).inc();
            }
            MetricUpdate::Succeeded {
                name,
                hostname,
                runtime,
            } => {
                self.task_succeeded.with_label_values(&[name.as_str(), hostname.as_str()]).inc();
                if let Some(runtime) = runtime {
                    self.task_runtime
                        .with_label_values(&[name.as_str(), hostname.as_str()])
                        .observe(*runtime);
                    if let Err(e) = self.task_runtime_summary.observe(&[name.as_str()], *runtime) {
                        warn!(task_name = %name, error = %e, "Failed to observe runtime summary");
                    }
                }
            }
            MetricUpdate::Failed { name, hostname } => {
                self.task_failed.with_label_values(&[name.as_str(), hostname.as_str()]).inc();
            }
            MetricUpdate::Retried { name, hostname } => {
                self.task_retried.with_label_values(&[name.as_str(), hostname.as_str()]).inc();
            }
            MetricUpdate::Revoked { name } => {
                self.task_revoked.with_label_values(&[name.as_str()]).inc();
            }
            MetricUpdate::Rejected { name } => {
                self.task_rejected.with_label_values(&[name.as_str()]).inc();
            }
        }
    }

    /// Record worker presence for `host`
    pub fn set_worker_up(&self, host: &str, up: bool) {
        self.worker_up.with_label_values(&[host]).set(i64::from(up));
    }

    /// Point-in-time snapshot of every metric family
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Render the registry in the Prometheus text exposition format
    pub fn render(&self) -> ExporterResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| ExporterError::MetricsError(e.to_string()))
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    /// Current value of a counter or gauge series, `None` if never touched
    pub fn value(&self, metric: &str, labels: &[(&str, &str)]) -> Option<f64> {
        self.find(metric, labels, |family_type, m| match family_type {
            MetricType::COUNTER => Some(m.get_counter().get_value()),
            MetricType::GAUGE => Some(m.get_gauge().get_value()),
            _ => None,
        })
    }

    /// Observation count of a histogram or summary series
    pub fn observation_count(&self, metric: &str, labels: &[(&str, &str)]) -> Option<u64> {
        self.find(metric, labels, |family_type, m| match family_type {
            MetricType::HISTOGRAM => Some(m.get_histogram().get_sample_count()),
            MetricType::SUMMARY => Some(m.get_summary().get_sample_count()),
            _ => None,
        })
    }

    /// Observation sum of a histogram or summary series
    pub fn observation_sum(&self, metric: &str, labels: &[(&str, &str)]) -> Option<f64> {
        self.find(metric, labels, |family_type, m| match family_type {
            MetricType::HISTOGRAM => Some(m.get_histogram().get_sample_sum()),
            MetricType::SUMMARY => Some(m.get_summary().get_sample_sum()),
            _ => None,
        })
    }

    /// Number of distinct series across all families
    pub fn series_count(&self) -> usize {
        self.gather().iter().map(|f| f.get_metric().len()).sum()
    }

    fn find<T>(
        &self,
        metric: &str,
        labels: &[(&str, &str)],
        read: impl Fn(MetricType, &Metric) -> Option<T>,
    ) -> Option<T> {
        let families = self.gather();
        let family = families.iter().find(|f| f.get_name() == metric)?;
        let series = family
            .get_metric()
            .iter()
            .find(|m| labels_match(m, labels))?;
        read(family.get_field_type(), series)
    }
}

fn labels_match(metric: &Metric, labels: &[(&str, &str)]) -> bool {
    let pairs = metric.get_label();
    pairs.len() == labels.len()
        && labels.iter().all(|(name, value)| {
            pairs
                .iter()
                .any(|p| p.get_name() == *name && p.get_value() == *value)
        })
}
