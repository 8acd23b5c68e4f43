#![allow(clippy::doc_markdown)] // Allow technical terms like RabbitMQ, Prometheus in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Celery Exporter
//!
//! Turns the Celery task lifecycle event stream into Prometheus metrics.
//!
//! ## Overview
//!
//! Celery workers publish an event for every task state change, but only
//! `task-received` carries the task's name. The exporter remembers
//! `uuid → name` for a bounded time and uses it to label every later event for
//! the same task, so per-task-name counters and runtime distributions can be
//! scraped from `/metrics`.
//!
//! ## Module Organization
//!
//! - [`events`] - Typed Celery events, JSON decoding and event sources (AMQP, channel)
//! - [`cache`] - TTL identity cache (`uuid → task name`)
//! - [`router`] - Pure routing decisions and the stateful event router
//! - [`metrics`] - Prometheus registry, metric inventory and the runtime summary
//! - [`ingestion`] - Single-consumer loop draining an event source
//! - [`web`] - Axum scrape server (`/metrics`, `/health`)
//! - [`config`] - Layered configuration and command-line flags
//! - [`bootstrap`] - Composition root wiring everything together
//! - [`logging`] - Console `tracing` subscriber
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use celery_exporter::bootstrap::ExporterBootstrap;
//! use celery_exporter::config::ExporterConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExporterConfig::default();
//! let mut handle = ExporterBootstrap::bootstrap(&config).await?;
//! println!("Serving metrics on {}", handle.local_addr);
//! handle.wait_for_ingestion().await?;
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod ingestion;
pub mod logging;
pub mod metrics;
pub mod router;
pub mod web;

pub use bootstrap::{ExporterBootstrap, ExporterHandle};
pub use cache::TaskIdentityCache;
pub use config::ExporterConfig;
pub use error::{ExporterError, ExporterResult};
pub use events::{CeleryEvent, EventSource, TaskEvent, TaskEventType};
pub use ingestion::{IngestionLoop, IngestionStats};
pub use metrics::MetricRegistry;
pub use router::{decide, EventRouter, MetricUpdate, RouteDecision};
