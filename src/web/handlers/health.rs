//! # Health Handler
//!
//! Liveness plus a view of what the ingestion loop has been doing, useful when
//! `/metrics` looks suspiciously empty (cache misses, unrecognized events).

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::ingestion::IngestionStats;
use crate::web::state::ExporterWebState;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub cached_tasks: u64,
    pub ingestion: IngestionStats,
}

/// Health endpoint: GET /health
pub async fn health_check(State(state): State<Arc<ExporterWebState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at(),
        uptime_seconds: state.uptime_seconds(),
        cached_tasks: state.cache().entry_count(),
        ingestion: state.ingestion.get_statistics(),
    })
}
