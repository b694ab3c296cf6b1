use kiln_core::{Environment, KilnError, ProjectConfig};
use kiln_migrate::{
    MigrationConfig, MigrationExecutor, MigrationFileSet, MigrationRunResult, MigrationStatus,
};
use tracing::{error, info, warn};

use crate::project::Project;

/// Run pending migrations for the selected mode.
///
/// Migration problems are logged; they never fail the command.
pub async fn run(project: &Project, config: &ProjectConfig, mode: Option<&str>) -> Result<(), KilnError> {
    let environment = Environment::from_arg(mode);
    let db_config = match config.database(environment) {
        Ok(db_config) => db_config,
        Err(e) => {
            error!("Cannot migrate {} database: {}", environment, e);
            return Ok(());
        }
    };

    info!(mode = %environment, "Running migrations for db {}", db_config.database);

    let executor = MigrationExecutor::postgres(MigrationConfig::for_project(project.root()));
    match executor.run(&db_config).await {
        Ok(result) => report(&result),
        Err(e) => error!("Migration run aborted: {}", e),
    }

    Ok(())
}

fn report(result: &MigrationRunResult) {
    if let Some(failed) = result.failed_migration() {
        error!(
            "Migration {} failed after applying {} migration(s); {} cancelled",
            failed,
            result.applied_count(),
            result.cancelled.len()
        );
    }
    if result.recorded < result.applied_count() {
        warn!(
            "Only {} of {} applied migration(s) were recorded in the ledger",
            result.recorded,
            result.applied_count()
        );
    }
    info!(
        applied = result.applied_count(),
        already_applied = result.already_applied,
        elapsed_ms = result.execution_time_ms as u64,
        "Migration run finished"
    );
}

/// Print applied, pending and orphaned migrations without running anything
pub async fn status(project: &Project, config: &ProjectConfig, mode: Option<&str>) -> Result<(), KilnError> {
    let environment = Environment::from_arg(mode);
    let db_config = match config.database(environment) {
        Ok(db_config) => db_config,
        Err(e) => {
            error!("Cannot read {} database settings: {}", environment, e);
            return Ok(());
        }
    };

    let executor = MigrationExecutor::postgres(MigrationConfig::for_project(project.root()));
    let report = match executor.status(&db_config).await {
        Ok(report) => report,
        Err(e) => {
            error!("Could not read migrations: {}", e);
            return Ok(());
        }
    };

    println!("Migration status for {} ({})", db_config.database, environment);
    if !report.database_available {
        println!("Database is not available; every migration is shown as pending");
    }
    if report.migrations.is_empty() {
        println!("No migrations found");
    }
    for (file, status) in &report.migrations {
        let marker = match status {
            MigrationStatus::Applied => "applied",
            MigrationStatus::Pending => "pending",
        };
        println!("  [{:>7}] {}", marker, file.name);
    }
    for version in &report.orphaned {
        println!("  [orphan ] {}", version);
    }
    println!("{} pending", report.pending_count());

    Ok(())
}

/// Create a new timestamped migration file
pub async fn create(project: &Project, name: &str) -> Result<(), KilnError> {
    let files = MigrationFileSet::new(&MigrationConfig::for_project(project.root()));
    match files.create(name) {
        Ok(path) => info!("Created new migration at {}", path.display()),
        Err(e) => error!("Error creating migration: {}", e),
    }
    Ok(())
}
