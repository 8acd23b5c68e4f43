//! # Logging
//!
//! Console logging through `tracing-subscriber`, written to stdout for
//! containerized deployments.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the configured
//! `log_level`. ANSI colors are enabled only when stdout is a terminal.

use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Filter directive to use: `RUST_LOG` wins over the configured level
pub fn resolve_filter(configured_level: &str, rust_log: Option<&str>) -> String {
    match rust_log.map(str::trim) {
        Some(directive) if !directive.is_empty() => directive.to_string(),
        _ => configured_level.to_string(),
    }
}

/// Install the global subscriber; later calls are no-ops
pub fn init_tracing(log_level: &str) {
    TRACING_INITIALIZED.get_or_init(|| {
        let rust_log = std::env::var("RUST_LOG").ok();
        let directive = resolve_filter(log_level, rust_log.as_deref());
        let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

        let use_ansi = IsTerminal::is_terminal(&std::io::stdout());

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(use_ansi)
            .with_filter(filter);

        let subscriber = tracing_subscriber::registry().with(console_layer);

        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        } else {
            tracing::info!(
                filter = %directive,
                ansi_colors = use_ansi,
                "Console logging initialized"
            );
        }
    });
}
