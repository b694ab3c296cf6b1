//! Migration Definitions - Core types shared by the runner components

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use crate::error::MigrationError;

/// Ledger status code written for a successfully applied migration
pub const STATUS_APPLIED: i32 = 100;

/// A discovered migration file. Its identity is the file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// Base file name, including ordering prefix and extension
    pub name: String,
    /// Location on disk
    pub path: PathBuf,
    /// True when this migration creates the database itself
    pub is_creation_migration: bool,
}

impl MigrationFile {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, creation_marker: &str) -> Self {
        let name = name.into();
        let is_creation_migration = !creation_marker.is_empty() && name.contains(creation_marker);
        Self {
            name,
            path: path.into(),
            is_creation_migration,
        }
    }
}

/// One row of the applied-migrations ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub migration_version: String,
    pub applied_at: DateTime<Utc>,
    pub tool_version: String,
    pub status: i32,
}

impl LedgerEntry {
    /// Entry for a migration that just completed
    pub fn applied(migration_version: impl Into<String>, tool_version: impl Into<String>) -> Self {
        Self {
            migration_version: migration_version.into(),
            applied_at: Utc::now(),
            tool_version: tool_version.into(),
            status: STATUS_APPLIED,
        }
    }
}

/// Configuration for the migration runner
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Directory where migration files are stored
    pub migrations_dir: PathBuf,
    /// Extension a file must have to count as a migration
    pub extension: String,
    /// Table name for the applied-migrations ledger
    pub ledger_table: String,
    /// Substring marking the database creation migration
    pub creation_marker: String,
    /// SQL client program used to execute migration files
    pub sql_client: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("db/migrate"),
            extension: "sql".to_string(),
            ledger_table: "kiln_metadata".to_string(),
            creation_marker: "create_db".to_string(),
            sql_client: "psql".to_string(),
        }
    }
}

impl MigrationConfig {
    /// Default configuration rooted at a project directory
    pub fn for_project(project_root: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.migrations_dir = project_root.into().join(&config.migrations_dir);
        config
    }
}

/// Result of running migrations
#[derive(Debug, Clone, Default)]
pub struct MigrationRunResult {
    /// Names applied during this run, in execution order
    pub applied: Vec<String>,
    /// The execution error that halted the run, if any
    pub failed: Option<MigrationError>,
    /// Pending migrations not attempted because of the halt
    pub cancelled: Vec<String>,
    /// Number of discovered migrations already in the ledger
    pub already_applied: usize,
    /// Ledger rows written at the end of the run
    pub recorded: usize,
    /// Whether the database could be opened before executing
    pub database_available: bool,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl MigrationRunResult {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_none()
    }

    /// Name of the migration that halted the run
    pub fn failed_migration(&self) -> Option<&str> {
        match &self.failed {
            Some(MigrationError::Execution { name, .. }) => Some(name),
            _ => None,
        }
    }

    /// Last migration completed in this run
    pub fn last_applied(&self) -> Option<&str> {
        self.applied.last().map(String::as_str)
    }
}

/// Migration status in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStatus {
    /// Migration is pending (not yet applied)
    Pending,
    /// Migration has been applied
    Applied,
}

/// Applied/pending view of the migrations directory against the ledger
#[derive(Debug, Clone, Default)]
pub struct MigrationStatusReport {
    pub migrations: Vec<(MigrationFile, MigrationStatus)>,
    /// Ledger versions with no matching file on disk
    pub orphaned: Vec<String>,
    pub database_available: bool,
}

impl MigrationStatusReport {
    pub fn pending(&self) -> impl Iterator<Item = &MigrationFile> {
        self.migrations
            .iter()
            .filter(|(_, status)| *status == MigrationStatus::Pending)
            .map(|(file, _)| file)
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_marker_detection() {
        let file = MigrationFile::new("001_create_db.sql", "db/migrate/001_create_db.sql", "create_db");
        assert!(file.is_creation_migration);

        let file = MigrationFile::new("002_create_users.sql", "db/migrate/002_create_users.sql", "create_db");
        assert!(!file.is_creation_migration);

        let file = MigrationFile::new("001_create_db.sql", "x", "");
        assert!(!file.is_creation_migration);
    }

    #[test]
    fn test_ledger_entry_applied() {
        let entry = LedgerEntry::applied("003_add_email.sql", "0.3.0");
        assert_eq!(entry.status, STATUS_APPLIED);
        assert_eq!(entry.migration_version, "003_add_email.sql");
        assert_eq!(entry.tool_version, "0.3.0");
    }

    #[test]
    fn test_config_for_project() {
        let config = MigrationConfig::for_project("/srv/app");
        assert_eq!(config.migrations_dir, PathBuf::from("/srv/app/db/migrate"));
        assert_eq!(config.ledger_table, "kiln_metadata");
    }
}
