//! Applied-migrations ledger
//!
//! The ledger is a table inside the target database with one row per
//! applied migration. Reading and writing it are independent of running the
//! migration SQL: a crash after a migration succeeds but before its row is
//! written means that migration runs again on the next invocation.

use async_trait::async_trait;
use kiln_core::DatabaseConfig;
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, warn};

use crate::connector::DatabaseConnector;
use crate::definitions::LedgerEntry;
use crate::error::{MigrationError, MigrationResult};

/// An open session on the ledger table
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Create the ledger table if it is missing
    async fn ensure_table(&self) -> MigrationResult<()>;

    /// Applied migration versions, newest first
    async fn applied_versions(&self) -> MigrationResult<Vec<String>>;

    /// Append one row
    async fn insert(&self, entry: &LedgerEntry) -> MigrationResult<()>;
}

/// Check that a ledger table name is a plain SQL identifier
pub fn validate_table_name(table: &str) -> MigrationResult<()> {
    let mut chars = table.chars();
    let valid_start = chars
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(MigrationError::Configuration(format!(
            "invalid ledger table name '{}'",
            table
        )))
    }
}

/// SQL to create the ledger table
pub fn create_ledger_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    \
            id SERIAL PRIMARY KEY,\n    \
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),\n    \
            kiln_version TEXT NOT NULL,\n    \
            migration_version TEXT NOT NULL,\n    \
            status INTEGER NOT NULL\n\
        );",
        table
    )
}

/// SQL to read applied migration versions
pub fn applied_versions_sql(table: &str) -> String {
    format!("SELECT migration_version FROM {} ORDER BY id DESC;", table)
}

/// SQL to record an applied migration
pub fn record_migration_sql(table: &str) -> String {
    format!(
        "INSERT INTO {} (updated_at, kiln_version, migration_version, status) VALUES ($1, $2, $3, $4);",
        table
    )
}

/// Ledger stored in a Postgres table
pub struct PgLedgerStore {
    pool: PgPool,
    table: String,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool, table: impl Into<String>) -> MigrationResult<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self { pool, table })
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn ensure_table(&self) -> MigrationResult<()> {
        sqlx::query(&create_ledger_table_sql(&self.table))
            .execute(&self.pool)
            .await
            .map_err(|e| MigrationError::LedgerWrite {
                version: self.table.clone(),
                message: format!("failed to create ledger table: {}", e),
            })?;
        Ok(())
    }

    async fn applied_versions(&self) -> MigrationResult<Vec<String>> {
        let versions = sqlx::query_scalar::<_, String>(&applied_versions_sql(&self.table))
            .fetch_all(&self.pool)
            .await?;
        Ok(versions)
    }

    async fn insert(&self, entry: &LedgerEntry) -> MigrationResult<()> {
        sqlx::query(&record_migration_sql(&self.table))
            .bind(entry.applied_at)
            .bind(&entry.tool_version)
            .bind(&entry.migration_version)
            .bind(entry.status)
            .execute(&self.pool)
            .await
            .map_err(|e| MigrationError::LedgerWrite {
                version: entry.migration_version.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryLedgerState {
    table_exists: bool,
    entries: Vec<LedgerEntry>,
}

/// In-process ledger. Clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<MemoryLedgerState>>,
}

impl MemoryLedgerStore {
    /// Store without a ledger table, like a freshly created database
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose table already holds the given versions, oldest first
    pub fn with_applied<I, S>(versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = versions
            .into_iter()
            .map(|v| LedgerEntry::applied(v, kiln_core::VERSION))
            .collect();
        Self {
            state: Arc::new(Mutex::new(MemoryLedgerState {
                table_exists: true,
                entries,
            })),
        }
    }

    fn state(&self) -> MigrationResult<MutexGuard<'_, MemoryLedgerState>> {
        self.state
            .lock()
            .map_err(|_| MigrationError::LedgerRead("ledger lock poisoned".into()))
    }

    /// All rows in insertion order
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.state().map(|s| s.entries.clone()).unwrap_or_default()
    }

    /// Recorded versions in insertion order
    pub fn versions(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .map(|e| e.migration_version)
            .collect()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn ensure_table(&self) -> MigrationResult<()> {
        self.state()?.table_exists = true;
        Ok(())
    }

    async fn applied_versions(&self) -> MigrationResult<Vec<String>> {
        let state = self.state()?;
        if !state.table_exists {
            return Err(MigrationError::LedgerRead(
                "ledger table does not exist".to_string(),
            ));
        }
        Ok(state
            .entries
            .iter()
            .rev()
            .map(|e| e.migration_version.clone())
            .collect())
    }

    async fn insert(&self, entry: &LedgerEntry) -> MigrationResult<()> {
        let mut state = self.state()?;
        if !state.table_exists {
            return Err(MigrationError::LedgerWrite {
                version: entry.migration_version.clone(),
                message: "ledger table does not exist".to_string(),
            });
        }
        state.entries.push(entry.clone());
        Ok(())
    }
}

/// Read and append access to the ledger for one run
pub struct AppliedLedger {
    store: Option<Box<dyn LedgerStore>>,
    tool_version: String,
}

impl AppliedLedger {
    /// `store` is `None` when the database could not be opened
    pub fn new(store: Option<Box<dyn LedgerStore>>, tool_version: impl Into<String>) -> Self {
        Self {
            store,
            tool_version: tool_version.into(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_some()
    }

    /// Applied versions. Empty when there is no session or the query fails.
    pub async fn read_applied(&self) -> HashSet<String> {
        let Some(store) = &self.store else {
            return HashSet::new();
        };

        match store.applied_versions().await {
            Ok(versions) => versions.into_iter().collect(),
            Err(e) => {
                warn!("Could not read migration ledger, assuming nothing applied: {}", e);
                HashSet::new()
            }
        }
    }

    /// Insert one row per name, in order, and return how many were written.
    ///
    /// Opens a session first if none is held (the run may have created the
    /// database). A failed insert is logged and the remaining names are
    /// still attempted.
    pub async fn record_applied(
        &mut self,
        connector: &dyn DatabaseConnector,
        db_config: &DatabaseConfig,
        names: &[String],
    ) -> usize {
        if self.store.is_none() {
            match connector.open(db_config).await {
                Ok(store) => self.store = Some(store),
                Err(e) => {
                    for name in names {
                        error!(migration = %name, "Database ERROR recording migration: {}", e);
                    }
                    return 0;
                }
            }
        }

        let Some(store) = &self.store else {
            return 0;
        };

        if let Err(e) = store.ensure_table().await {
            warn!("Could not ensure ledger table exists: {}", e);
        }

        let mut recorded = 0;
        for name in names {
            let entry = LedgerEntry::applied(name.as_str(), self.tool_version.as_str());
            match store.insert(&entry).await {
                Ok(()) => {
                    debug!(migration = %name, "Recorded migration in ledger");
                    recorded += 1;
                }
                Err(e) => error!(migration = %name, "Database ERROR {}", e),
            }
        }
        recorded
    }
}
