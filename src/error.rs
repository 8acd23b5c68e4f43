//! Error types for the exporter.
//!
//! Only startup paths (configuration, broker connection, registry construction,
//! listener binding) surface errors. Once the ingestion loop is running, nothing
//! it does is fatal: unroutable events are dropped and undecodable messages are
//! logged by the event source.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidConfigValue {
        field: String,
        value: String,
        context: String,
    },
    #[error("Broker error: {0}")]
    BrokerError(String),
    #[error("Event decode error: {0}")]
    DecodeError(String),
    #[error("Metrics error: {0}")]
    MetricsError(String),
    #[error("Server error: {0}")]
    ServerError(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExporterError {
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl ToString,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            value: value.to_string(),
            context: context.into(),
        }
    }

    /// Whether this error was raised while decoding a single broker message.
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::DecodeError(_))
    }
}

impl From<config::ConfigError> for ExporterError {
    fn from(error: config::ConfigError) -> Self {
        ExporterError::ConfigurationError(error.to_string())
    }
}

impl From<prometheus::Error> for ExporterError {
    fn from(error: prometheus::Error) -> Self {
        ExporterError::MetricsError(error.to_string())
    }
}

impl From<lapin::Error> for ExporterError {
    fn from(error: lapin::Error) -> Self {
        ExporterError::BrokerError(error.to_string())
    }
}

impl From<serde_json::Error> for ExporterError {
    fn from(error: serde_json::Error) -> Self {
        ExporterError::DecodeError(format!("JSON deserialization error: {error}"))
    }
}

pub type ExporterResult<T> = Result<T, ExporterError>;
