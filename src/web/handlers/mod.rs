//! HTTP handlers for the scrape server.

pub mod health;
pub mod metrics;
