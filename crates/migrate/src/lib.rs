//! Forward-only SQL migrations for kiln projects.
//!
//! Migration files live in `db/migrate` and run in file-name order. Applied
//! migrations are recorded in a ledger table inside the target database, so
//! running the tool again only executes files it has not seen before.
//!
//! ```rust,no_run
//! use kiln_core::DatabaseConfig;
//! use kiln_migrate::{MigrationConfig, MigrationExecutor};
//!
//! # async fn example() -> Result<(), kiln_migrate::MigrationError> {
//! let executor = MigrationExecutor::postgres(MigrationConfig::for_project("."));
//! let result = executor.run(&DatabaseConfig::new("blog_dev")).await?;
//! println!("applied {} migrations", result.applied_count());
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod connector;
pub mod definitions;
pub mod error;
pub mod executor;
pub mod files;
pub mod ledger;
pub mod runner;

pub use classifier::{default_classifier, AnyFailure, ExitStatus, Outcome, OutcomeClassifier, OutputSignature};
pub use connector::{DatabaseConnector, PgConnector};
pub use definitions::{
    LedgerEntry, MigrationConfig, MigrationFile, MigrationRunResult,
    MigrationStatus, MigrationStatusReport, STATUS_APPLIED,
};
pub use error::{MigrationError, MigrationResult};
pub use executor::MigrationExecutor;
pub use files::{MigrationFileSet, NamingIssue};
pub use ledger::{AppliedLedger, LedgerStore, MemoryLedgerStore, PgLedgerStore};
pub use runner::{CommandOutput, ExecutionTarget, PsqlRunner, SqlRunner};
