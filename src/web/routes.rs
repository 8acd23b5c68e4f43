//! Route definitions for the scrape server.

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::web::{handlers, state::ExporterWebState};

/// Liveness and ingestion statistics
pub fn health_routes() -> Router<Arc<ExporterWebState>> {
    Router::new().route("/health", get(handlers::health::health_check))
}

/// Prometheus scrape endpoint
pub fn metrics_routes() -> Router<Arc<ExporterWebState>> {
    Router::new().route("/metrics", get(handlers::metrics::prometheus_metrics))
}
