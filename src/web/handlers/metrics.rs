//! # Metrics Handler
//!
//! Serves the metric registry in the Prometheus text exposition format.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::{debug, error};

use crate::web::state::ExporterWebState;

/// Prometheus metrics endpoint: GET /metrics
///
/// Every scrape gathers a fresh snapshot; counters read here are never ahead of
/// or behind what the ingestion loop has applied.
pub async fn prometheus_metrics(State(state): State<Arc<ExporterWebState>>) -> Response {
    debug!("Serving Prometheus metrics");

    match state.registry.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, state.registry.content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
