//! Migration Executor - runs pending migrations in order
//!
//! A run discovers the migration files, opens the database if it exists,
//! subtracts the ledger's applied set and executes what is left one file at
//! a time. The first failure halts the run. Whatever completed before it is
//! still recorded in the ledger.

use kiln_core::DatabaseConfig;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::classifier::{default_classifier, Outcome, OutcomeClassifier};
use crate::connector::{DatabaseConnector, PgConnector};
use crate::definitions::{
    MigrationConfig, MigrationFile, MigrationRunResult, MigrationStatus,
    MigrationStatusReport,
};
use crate::error::{MigrationError, MigrationResult};
use crate::files::MigrationFileSet;
use crate::ledger::AppliedLedger;
use crate::runner::{ExecutionTarget, PsqlRunner, SqlRunner};

const DIVIDER: &str = "------";

/// Orchestrates discovery, ledger lookup, execution and recording
pub struct MigrationExecutor {
    config: MigrationConfig,
    files: MigrationFileSet,
    connector: Box<dyn DatabaseConnector>,
    runner: Box<dyn SqlRunner>,
    classifier: Box<dyn OutcomeClassifier>,
    tool_version: String,
}

impl MigrationExecutor {
    /// Create an executor from its collaborators, using the default output classifier
    pub fn new(
        config: MigrationConfig,
        connector: Box<dyn DatabaseConnector>,
        runner: Box<dyn SqlRunner>,
    ) -> Self {
        Self {
            files: MigrationFileSet::new(&config),
            config,
            connector,
            runner,
            classifier: Box::new(default_classifier()),
            tool_version: kiln_core::VERSION.to_string(),
        }
    }

    /// Executor talking to Postgres through `sqlx` and the configured SQL client
    pub fn postgres(config: MigrationConfig) -> Self {
        let connector = PgConnector::new(config.ledger_table.clone());
        let runner = PsqlRunner::new(config.sql_client.clone());
        Self::new(config, Box::new(connector), Box::new(runner))
    }

    pub fn with_classifier(mut self, classifier: Box<dyn OutcomeClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_tool_version(mut self, version: impl Into<String>) -> Self {
        self.tool_version = version.into();
        self
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn file_set(&self) -> &MigrationFileSet {
        &self.files
    }

    /// Discover migrations and log naming problems
    fn discover(&self) -> MigrationResult<Vec<MigrationFile>> {
        let files = self.files.discover()?;
        for issue in MigrationFileSet::check_names(&files) {
            warn!("Migration naming: {}", issue);
        }
        Ok(files)
    }

    /// Open the database and load the ledger; no session if the database is unavailable
    async fn open_ledger(&self, db_config: &DatabaseConfig) -> (AppliedLedger, HashSet<String>) {
        match self.connector.open(db_config).await {
            Ok(store) => {
                let ledger = AppliedLedger::new(Some(store), self.tool_version.clone());
                let applied = ledger.read_applied().await;
                (ledger, applied)
            }
            Err(e) => {
                info!("No database found ({}), proceeding with no applied migrations", e);
                (AppliedLedger::new(None, self.tool_version.clone()), HashSet::new())
            }
        }
    }

    /// Run all pending migrations.
    ///
    /// Only a discovery failure is returned as an error; every other problem
    /// is logged and reflected in the result.
    pub async fn run(&self, db_config: &DatabaseConfig) -> MigrationResult<MigrationRunResult> {
        let start_time = Instant::now();

        let files = self.discover()?;
        let (mut ledger, applied) = self.open_ledger(db_config).await;

        let mut result = MigrationRunResult {
            database_available: ledger.is_connected(),
            ..MigrationRunResult::default()
        };

        let pending: Vec<&MigrationFile> = files
            .iter()
            .filter(|f| !applied.contains(&f.name))
            .collect();
        result.already_applied = files.len() - pending.len();

        let mut remaining = pending.into_iter();
        for file in remaining.by_ref() {
            info!(migration = %file.name, "Running migration {}", file.name);

            match self.execute(file, db_config).await {
                Ok(output) => {
                    info!(
                        migration = %file.name,
                        "Completed migration {}\n{}\n{}",
                        file.name,
                        output,
                        DIVIDER
                    );
                    result.applied.push(file.name.clone());
                }
                Err(e) => {
                    error!(migration = %file.name, "ERROR loading sql migration: {}", e);
                    error!("All further migrations cancelled");
                    result.failed = Some(e);
                    break;
                }
            }
        }
        result.cancelled = remaining.map(|f| f.name.clone()).collect();

        if let Some(last) = result.applied.last().cloned() {
            result.recorded = ledger
                .record_applied(self.connector.as_ref(), db_config, &result.applied)
                .await;
            info!(
                "Migrations complete up to migration {} on db {}",
                last, db_config.database
            );
        } else {
            info!(
                "No migrations to perform at path {}",
                self.files.directory().display()
            );
        }

        result.execution_time_ms = start_time.elapsed().as_millis();
        Ok(result)
    }

    /// Execute one file and classify the result
    async fn execute(&self, file: &MigrationFile, db_config: &DatabaseConfig) -> MigrationResult<String> {
        let target = ExecutionTarget::for_migration(file, db_config);
        if target == ExecutionTarget::Server {
            info!(migration = %file.name, "Running database creation migration: {}", file.path.display());
        }

        let output = self
            .runner
            .execute(file, &target, db_config)
            .await
            .map_err(|e| MigrationError::Execution {
                name: file.name.clone(),
                detail: format!("failed to run {}: {}", self.config.sql_client, e),
            })?;

        match self.classifier.classify(&output) {
            Outcome::Succeeded => Ok(output.text),
            Outcome::Failed(detail) => Err(MigrationError::Execution {
                name: file.name.clone(),
                detail,
            }),
        }
    }

    /// Applied/pending status of every migration file, without executing anything
    pub async fn status(&self, db_config: &DatabaseConfig) -> MigrationResult<MigrationStatusReport> {
        let files = self.discover()?;
        let (ledger, applied) = self.open_ledger(db_config).await;

        let known: HashSet<&str> = files.iter().map(|f| f.name.as_str()).collect();
        let mut orphaned: Vec<String> = applied
            .iter()
            .filter(|v| !known.contains(v.as_str()))
            .cloned()
            .collect();
        orphaned.sort();

        let migrations = files
            .into_iter()
            .map(|file| {
                let status = if applied.contains(&file.name) {
                    MigrationStatus::Applied
                } else {
                    MigrationStatus::Pending
                };
                (file, status)
            })
            .collect();

        Ok(MigrationStatusReport {
            migrations,
            orphaned,
            database_available: ledger.is_connected(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerStore, MemoryLedgerStore};
    use crate::runner::CommandOutput;
    use async_trait::async_trait;
    use std::fs;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Connector that only succeeds once `exists` is set
    #[derive(Clone)]
    struct FakeConnector {
        store: MemoryLedgerStore,
        exists: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl DatabaseConnector for FakeConnector {
        async fn open(&self, config: &DatabaseConfig) -> MigrationResult<Box<dyn LedgerStore>> {
            if *self.exists.lock().unwrap() {
                Ok(Box::new(self.store.clone()))
            } else {
                Err(MigrationError::ConnectionUnavailable(format!(
                    "database \"{}\" does not exist",
                    config.database
                )))
            }
        }
    }

    /// Runner that records invocations and fails files whose name contains `fail_on`.
    /// Files matching `spawn_error_on` fail before the client starts.
    #[derive(Clone, Default)]
    struct FakeRunner {
        calls: Arc<Mutex<Vec<(String, ExecutionTarget)>>>,
        fail_on: Option<String>,
        spawn_error_on: Option<String>,
        creates_database: Option<Arc<Mutex<bool>>>,
    }

    #[async_trait]
    impl SqlRunner for FakeRunner {
        async fn execute(
            &self,
            file: &MigrationFile,
            target: &ExecutionTarget,
            _config: &DatabaseConfig,
        ) -> io::Result<CommandOutput> {
            self.calls.lock().unwrap().push((file.name.clone(), target.clone()));
            if self.spawn_error_on.as_deref().map_or(false, |f| file.name.contains(f)) {
                return Err(io::Error::new(io::ErrorKind::NotFound, "psql not found"));
            }
            if self.fail_on.as_deref().map_or(false, |f| file.name.contains(f)) {
                return Ok(CommandOutput::new(Some(0), "ERROR:  syntax error at or near \"TABEL\""));
            }
            if file.is_creation_migration {
                if let Some(flag) = &self.creates_database {
                    *flag.lock().unwrap() = true;
                }
            }
            Ok(CommandOutput::new(Some(0), "CREATE TABLE"))
        }
    }

    fn write_migrations(dir: &TempDir, names: &[&str]) -> MigrationConfig {
        let migrations_dir = dir.path().join("db/migrate");
        fs::create_dir_all(&migrations_dir).unwrap();
        for name in names {
            fs::write(migrations_dir.join(name), "SELECT 1;").unwrap();
        }
        MigrationConfig {
            migrations_dir,
            ..MigrationConfig::default()
        }
    }

    fn executor(config: MigrationConfig, connector: &FakeConnector, runner: &FakeRunner) -> MigrationExecutor {
        MigrationExecutor::new(config, Box::new(connector.clone()), Box::new(runner.clone()))
            .with_tool_version("0.3.0-test")
    }

    fn connected(store: MemoryLedgerStore) -> FakeConnector {
        FakeConnector {
            store,
            exists: Arc::new(Mutex::new(true)),
        }
    }

    fn called(runner: &FakeRunner) -> Vec<String> {
        runner.calls.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    #[tokio::test]
    async fn test_all_applied_runs_nothing() {
        let dir = TempDir::new().unwrap();
        let config = write_migrations(&dir, &["001_a.sql", "002_b.sql"]);
        let store = MemoryLedgerStore::with_applied(["001_a.sql", "002_b.sql"]);
        let connector = connected(store.clone());
        let runner = FakeRunner::default();

        let result = executor(config, &connector, &runner)
            .run(&DatabaseConfig::new("app"))
            .await
            .unwrap();

        assert!(called(&runner).is_empty());
        assert_eq!(result.applied_count(), 0);
        assert_eq!(result.already_applied, 2);
        assert_eq!(result.recorded, 0);
        assert_eq!(store.versions().len(), 2);
    }

    #[tokio::test]
    async fn test_halts_on_first_failure() {
        let dir = TempDir::new().unwrap();
        let config = write_migrations(&dir, &["001_a.sql", "002_b.sql", "003_c.sql"]);
        let store = MemoryLedgerStore::with_applied(Vec::<String>::new());
        let connector = connected(store.clone());
        let runner = FakeRunner {
            fail_on: Some("002_b".to_string()),
            ..FakeRunner::default()
        };

        let result = executor(config, &connector, &runner)
            .run(&DatabaseConfig::new("app"))
            .await
            .unwrap();

        assert_eq!(called(&runner), vec!["001_a.sql", "002_b.sql"]);
        assert_eq!(result.applied, vec!["001_a.sql"]);
        assert_eq!(result.cancelled, vec!["003_c.sql"]);
        assert_eq!(result.failed_migration(), Some("002_b.sql"));
        match result.failed {
            Some(MigrationError::Execution { name, detail }) => {
                assert_eq!(name, "002_b.sql");
                assert!(detail.contains("ERROR"));
            }
            other => panic!("expected execution error, got {:?}", other),
        }
        assert_eq!(store.versions(), vec!["001_a.sql"]);
    }

    #[tokio::test]
    async fn test_sql_client_spawn_error_halts_run() {
        let dir = TempDir::new().unwrap();
        let config = write_migrations(&dir, &["001_a.sql", "002_b.sql", "003_c.sql"]);
        let store = MemoryLedgerStore::with_applied(Vec::<String>::new());
        let connector = connected(store.clone());
        let runner = FakeRunner {
            spawn_error_on: Some("002_b".to_string()),
            ..FakeRunner::default()
        };

        let result = executor(config, &connector, &runner)
            .run(&DatabaseConfig::new("app"))
            .await
            .unwrap();

        assert_eq!(result.applied, vec!["001_a.sql"]);
        assert_eq!(result.cancelled, vec!["003_c.sql"]);
        match result.failed {
            Some(MigrationError::Execution { name, detail }) => {
                assert_eq!(name, "002_b.sql");
                assert!(detail.contains("failed to run psql"));
                assert!(detail.contains("psql not found"));
            }
            other => panic!("expected execution error, got {:?}", other),
        }
        assert_eq!(store.versions(), vec!["001_a.sql"]);
    }

    #[tokio::test]
    async fn test_failure_on_first_file_records_nothing() {
        let dir = TempDir::new().unwrap();
        let config = write_migrations(&dir, &["001_a.sql", "002_b.sql"]);
        let store = MemoryLedgerStore::with_applied(Vec::<String>::new());
        let connector = connected(store.clone());
        let runner = FakeRunner {
            fail_on: Some("001_a".to_string()),
            ..FakeRunner::default()
        };

        let result = executor(config, &connector, &runner)
            .run(&DatabaseConfig::new("app"))
            .await
            .unwrap();

        assert!(!result.is_success());
        assert_eq!(result.recorded, 0);
        assert!(store.versions().is_empty());
    }

    #[tokio::test]
    async fn test_creation_migration_runs_at_server_scope() {
        let dir = TempDir::new().unwrap();
        let config = write_migrations(&dir, &["001_create_db.sql", "002_users.sql"]);
        let connector = FakeConnector {
            store: MemoryLedgerStore::new(),
            exists: Arc::new(Mutex::new(false)),
        };
        let runner = FakeRunner {
            creates_database: Some(connector.exists.clone()),
            ..FakeRunner::default()
        };

        let result = executor(config, &connector, &runner)
            .run(&DatabaseConfig::new("app"))
            .await
            .unwrap();

        assert!(!result.database_available);
        let calls = runner.calls.lock().unwrap().clone();
        assert_eq!(calls[0], ("001_create_db.sql".to_string(), ExecutionTarget::Server));
        assert_eq!(
            calls[1],
            ("002_users.sql".to_string(), ExecutionTarget::Database("app".to_string()))
        );
        assert_eq!(result.recorded, 2);
        assert_eq!(connector.store.versions(), vec!["001_create_db.sql", "002_users.sql"]);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let config = write_migrations(&dir, &["001_a.sql", "002_b.sql"]);
        let connector = connected(MemoryLedgerStore::with_applied(Vec::<String>::new()));
        let runner = FakeRunner::default();
        let executor = executor(config, &connector, &runner);

        let first = executor.run(&DatabaseConfig::new("app")).await.unwrap();
        assert_eq!(first.applied_count(), 2);

        let second = executor.run(&DatabaseConfig::new("app")).await.unwrap();
        assert_eq!(second.applied_count(), 0);
        assert_eq!(second.already_applied, 2);
        assert_eq!(called(&runner).len(), 2);
    }

    #[tokio::test]
    async fn test_missing_directory_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let config = MigrationConfig {
            migrations_dir: dir.path().join("db/migrate"),
            ..MigrationConfig::default()
        };
        let connector = connected(MemoryLedgerStore::new());
        let runner = FakeRunner::default();

        let result = executor(config, &connector, &runner)
            .run(&DatabaseConfig::new("app"))
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.applied_count(), 0);
    }

    #[tokio::test]
    async fn test_discovery_error_aborts_before_database() {
        let dir = TempDir::new().unwrap();
        let not_a_dir = dir.path().join("migrate");
        fs::write(&not_a_dir, "").unwrap();
        let config = MigrationConfig {
            migrations_dir: not_a_dir,
            ..MigrationConfig::default()
        };
        let connector = connected(MemoryLedgerStore::new());
        let runner = FakeRunner::default();

        let err = executor(config, &connector, &runner)
            .run(&DatabaseConfig::new("app"))
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::Discovery(_)));
        assert!(called(&runner).is_empty());
    }

    #[tokio::test]
    async fn test_custom_classifier() {
        struct NeverFails;
        impl OutcomeClassifier for NeverFails {
            fn classify(&self, _output: &CommandOutput) -> Outcome {
                Outcome::Succeeded
            }
        }

        let dir = TempDir::new().unwrap();
        let config = write_migrations(&dir, &["001_a.sql", "002_b.sql"]);
        let connector = connected(MemoryLedgerStore::with_applied(Vec::<String>::new()));
        let runner = FakeRunner {
            fail_on: Some("001_a".to_string()),
            ..FakeRunner::default()
        };

        let result = executor(config, &connector, &runner)
            .with_classifier(Box::new(NeverFails))
            .run(&DatabaseConfig::new("app"))
            .await
            .unwrap();
        assert_eq!(result.applied_count(), 2);
    }

    #[tokio::test]
    async fn test_status_report() {
        let dir = TempDir::new().unwrap();
        let config = write_migrations(&dir, &["001_a.sql", "002_b.sql", "003_c.sql"]);
        let connector = connected(MemoryLedgerStore::with_applied(["001_a.sql", "000_removed.sql"]));
        let runner = FakeRunner::default();

        let report = executor(config, &connector, &runner)
            .status(&DatabaseConfig::new("app"))
            .await
            .unwrap();

        assert!(report.database_available);
        assert_eq!(report.migrations[0].1, MigrationStatus::Applied);
        assert_eq!(report.pending_count(), 2);
        assert_eq!(report.orphaned, vec!["000_removed.sql"]);
        assert!(called(&runner).is_empty());
    }
}
