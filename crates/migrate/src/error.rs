//! Error types for the migration runner
//!
//! Only discovery failures abort a run outright. Connection and ledger
//! failures are recoverable and are logged by the executor; execution
//! failures halt the remaining sequence.

use std::fmt;

/// Result type alias for migration operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Error types for migration operations
#[derive(Debug, Clone)]
pub enum MigrationError {
    /// Migration directory could not be listed
    Discovery(String),
    /// Target database missing or unreachable
    ConnectionUnavailable(String),
    /// Ledger query failed
    LedgerRead(String),
    /// Ledger insert failed for one migration
    LedgerWrite { version: String, message: String },
    /// Migration SQL failed (non-zero exit or failure signature in output)
    Execution { name: String, detail: String },
    /// Unsupported adapter or malformed connection settings
    Configuration(String),
    /// Filesystem error outside discovery (e.g. writing a new migration)
    Io(String),
}

impl fmt::Display for MigrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationError::Discovery(msg) => {
                write!(f, "Failed to read migrations directory: {}", msg)
            }
            MigrationError::ConnectionUnavailable(msg) => {
                write!(f, "Database unavailable: {}", msg)
            }
            MigrationError::LedgerRead(msg) => write!(f, "Failed to read ledger: {}", msg),
            MigrationError::LedgerWrite { version, message } => {
                write!(f, "Failed to record migration {}: {}", version, message)
            }
            MigrationError::Execution { name, detail } => {
                write!(f, "Migration {} failed: {}", name, detail)
            }
            MigrationError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            MigrationError::Io(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for MigrationError {}

impl From<sqlx::Error> for MigrationError {
    fn from(err: sqlx::Error) -> Self {
        MigrationError::LedgerRead(err.to_string())
    }
}

impl From<kiln_core::ConfigError> for MigrationError {
    fn from(err: kiln_core::ConfigError) -> Self {
        MigrationError::Configuration(err.to_string())
    }
}

impl From<MigrationError> for kiln_core::CoreError {
    fn from(err: MigrationError) -> Self {
        match err {
            MigrationError::Configuration(msg) => kiln_core::CoreError::configuration(msg),
            MigrationError::Io(msg) => kiln_core::CoreError::system_error(msg),
            other => kiln_core::CoreError::database(other.to_string()),
        }
    }
}
