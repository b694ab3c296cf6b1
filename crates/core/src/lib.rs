pub mod config;
pub mod errors;
pub mod logging;

pub use config::{ConfigError, DatabaseConfig, Environment, ProjectConfig, Settings};
pub use errors::CoreError;
pub use logging::{init_logging, LoggingConfig};

pub use errors::CoreError as KilnError;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Tool name
pub const TOOL_NAME: &str = "kiln";

/// Get tool version
pub fn version() -> &'static str {
    VERSION
}

/// Get tool name
pub fn name() -> &'static str {
    TOOL_NAME
}
