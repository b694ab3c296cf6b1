//! Log output setup for the kiln CLI.
//!
//! Everything the tool reports goes through `tracing`; this module wires
//! a `tracing-subscriber` registry with an `EnvFilter` and either a plain
//! text or a JSON formatting layer.

use std::io;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration for the kiln tool
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "warn")
    pub level: String,
    /// Enable JSON structured logging (vs plain text)
    pub json_format: bool,
    /// Include the event target (module path) in each line
    pub include_target: bool,
    /// Environment filter (supports filters like "kiln=debug,sqlx=warn")
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_target: false,
            env_filter: Some("kiln=info,kiln_migrate=info,kiln_core=info,sqlx=warn".to_string()),
        }
    }
}

impl LoggingConfig {
    /// Verbose output for troubleshooting a run
    pub fn verbose() -> Self {
        Self {
            level: "debug".to_string(),
            json_format: false,
            include_target: true,
            env_filter: Some(
                "kiln=debug,kiln_migrate=debug,kiln_core=debug,sqlx=info".to_string(),
            ),
        }
    }

    /// Machine-readable output
    pub fn json(mut self) -> Self {
        self.json_format = true;
        self
    }

    /// Set environment filter
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    fn filter_directive(&self) -> &str {
        self.env_filter.as_deref().unwrap_or(&self.level)
    }
}

/// Initialize logging for the process. `RUST_LOG` wins over the configured filter.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.filter_directive()))?;

    if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stderr).json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                Layer::new()
                    .with_writer(io::stderr)
                    .with_target(config.include_target),
            )
            .try_init()?;
    }

    Ok(())
}
