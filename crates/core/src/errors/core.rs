use thiserror::Error;

/// Core error type for the kiln tool
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("System error: {message}")]
    SystemError {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Command '{command}' failed: {message}")]
    Process { command: String, message: String },
}

impl CoreError {
    /// Create a new configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new system error
    pub fn system_error(message: impl Into<String>) -> Self {
        Self::SystemError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new system error with source
    pub fn system_error_with_source(
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::SystemError {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a new database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Create a new process error for an external command
    pub fn process(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Process {
            command: command.into(),
            message: message.into(),
        }
    }
}

impl From<crate::config::ConfigError> for CoreError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::configuration("db_port must be a number");
        assert_eq!(err.to_string(), "Configuration error: db_port must be a number");

        let err = CoreError::process("psql", "exit status 2");
        assert_eq!(err.to_string(), "Command 'psql' failed: exit status 2");

        let err = CoreError::system_error("no project");
        assert_eq!(err.to_string(), "System error: no project");
    }

    #[test]
    fn test_system_error_keeps_source() {
        use std::error::Error;

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = CoreError::system_error_with_source("Failed to start server", Box::new(io));
        assert_eq!(err.to_string(), "System error: Failed to start server");
        assert!(err.source().is_some_and(|s| s.to_string() == "no such file"));
    }

    #[test]
    fn test_config_error_conversion() {
        let config_err = crate::config::ConfigError::missing_required("db", "set it in secrets/kiln.json");
        let err: CoreError = config_err.into();
        assert!(matches!(err, CoreError::Configuration { .. }));
        assert!(err.to_string().contains("Missing required field: db"));
    }
}
