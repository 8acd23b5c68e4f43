//! Layered configuration loading on top of the `config` crate.

use config::{Config, Environment, File, FileFormat, Map};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::ExporterConfig;
use crate::error::{ExporterError, ExporterResult};

/// Environment variable prefix, joined to field names with `_`
pub const ENV_PREFIX: &str = "CELERY_EXPORTER";

/// Values supplied on the command line; `None` leaves lower layers in effect
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub broker_uri: Option<String>,
    pub listen_addr: Option<String>,
    pub cache_ttl_seconds: Option<u64>,
    pub log_level: Option<String>,
}

/// Builder for an [`ExporterConfig`]
#[derive(Debug, Default)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env_source: Option<Map<String, String>>,
    overrides: ConfigOverrides,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a TOML file; it must exist
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Read the environment layer from `vars` instead of the process environment
    pub fn with_env_source(mut self, vars: Map<String, String>) -> Self {
        self.env_source = Some(vars);
        self
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Merge all layers and validate the result
    pub fn load(self) -> ExporterResult<ExporterConfig> {
        let defaults = ExporterConfig::default();

        let mut builder = Config::builder()
            .set_default("broker_uri", defaults.broker_uri)?
            .set_default("listen_addr", defaults.listen_addr)?
            .set_default("cache_ttl_seconds", defaults.cache_ttl_seconds as i64)?
            .set_default("log_level", defaults.log_level)?
            .set_default("event_exchange", defaults.event_exchange)?
            .set_default(
                "summary_max_age_seconds",
                defaults.summary_max_age_seconds as i64,
            )?
            .set_default("summary_max_samples", defaults.summary_max_samples as i64)?
            .set_default("request_timeout_ms", defaults.request_timeout_ms as i64)?;

        if let Some(path) = &self.file {
            if !path.is_file() {
                return Err(ExporterError::ConfigurationError(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(self.env_source),
        );

        let ConfigOverrides {
            broker_uri,
            listen_addr,
            cache_ttl_seconds,
            log_level,
        } = self.overrides;

        builder = builder
            .set_override_option("broker_uri", broker_uri)?
            .set_override_option("listen_addr", listen_addr)?
            .set_override_option("cache_ttl_seconds", cache_ttl_seconds.map(|v| v as i64))?
            .set_override_option("log_level", log_level)?;

        let config: ExporterConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(config = ?config, "Configuration loaded");
        Ok(config)
    }
}
