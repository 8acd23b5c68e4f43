//! # Scrape Server
//!
//! Axum application exposing `/metrics` for Prometheus and `/health` for
//! liveness checks. Handlers only read shared state; they never block the ingestion loop.

use axum::http::StatusCode;
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

pub mod handlers;
pub mod routes;
pub mod state;

pub use state::ExporterWebState;

/// Create the scrape server application with all routes and middleware
pub fn create_app(state: Arc<ExporterWebState>) -> Router {
    let common_middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.request_timeout,
        ));

    let app = Router::new()
        .merge(routes::health_routes())
        .merge(routes::metrics_routes())
        .layer(common_middleware)
        .with_state(state);

    info!("Scrape server application created");
    app
}
