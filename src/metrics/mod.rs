//! # Task Metrics
//!
//! Metric inventory exposed on `/metrics`:
//!
//! | name | type | labels |
//! |------|------|--------|
//! | `celery_task_received` | counter | name, hostname |
//! | `celery_task_started` | counter | name, hostname |
//! | `celery_task_succeeded` | counter | name, hostname |
//! | `celery_task_failed` | counter | name, hostname |
//! | `celery_task_retried` | counter | name, hostname |
//! | `celery_task_revoked` | counter | name |
//! | `celery_task_rejected` | counter | name |
//! | `celery_task_runtime` | histogram | name, hostname |
//! | `celery_task_runtime_summary` | summary | name |
//! | `celery_up` | gauge | host |
//!
//! Revoked and rejected events do not reliably carry a hostname, so those
//! counters are keyed by task name alone.

pub mod registry;
pub mod summary;

pub use registry::MetricRegistry;
pub use summary::{RuntimeSummaryVec, SummaryOptions};

pub const TASK_RECEIVED: &str = "celery_task_received";
pub const TASK_STARTED: &str = "celery_task_started";
pub const TASK_SUCCEEDED: &str = "celery_task_succeeded";
pub const TASK_FAILED: &str = "celery_task_failed";
pub const TASK_RETRIED: &str = "celery_task_retried";
pub const TASK_REVOKED: &str = "celery_task_revoked";
pub const TASK_REJECTED: &str = "celery_task_rejected";
pub const TASK_RUNTIME: &str = "celery_task_runtime";
pub const TASK_RUNTIME_SUMMARY: &str = "celery_task_runtime_summary";
pub const WORKER_UP: &str = "celery_up";

pub const NAME_HOST_LABELS: &[&str] = &["name", "hostname"];
pub const NAME_LABELS: &[&str] = &["name"];

/// Runtime histogram: 50 linear buckets of 0.10s starting at 0.05s
pub const RUNTIME_BUCKET_START: f64 = 0.05;
pub const RUNTIME_BUCKET_WIDTH: f64 = 0.10;
pub const RUNTIME_BUCKET_COUNT: usize = 50;
