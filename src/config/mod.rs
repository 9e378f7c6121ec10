//! Monitoring configuration.
//!
//! Options can be loaded from YAML files or environment variables, or
//! built in code and handed to [`crate::Monitoring`].

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "docstore-monitoring.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "DOCSTORE_MONITORING_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "DOCSTORE_MONITORING";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "DOCSTORE_MONITORING_LOG";

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
}

/// Monitoring options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Emit a trace line for every intercepted read before it is issued.
    pub show_logs: bool,
}

impl Options {
    pub fn with_logs() -> Self {
        Self { show_logs: true }
    }

    /// Load options from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `docstore-monitoring.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    ///    (e.g. `DOCSTORE_MONITORING__SHOW_LOGS=true`)
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
