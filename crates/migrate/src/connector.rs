//! Database connector
//!
//! Opening the target database can legitimately fail before the creation
//! migration has run, so callers treat `ConnectionUnavailable` as a normal
//! outcome rather than a fatal error.

use async_trait::async_trait;
use kiln_core::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing::info;
use url::Url;

use crate::error::{MigrationError, MigrationResult};
use crate::ledger::{LedgerStore, PgLedgerStore};

/// Opens a ledger session on the configured database
#[async_trait]
pub trait DatabaseConnector: Send + Sync {
    async fn open(&self, config: &DatabaseConfig) -> MigrationResult<Box<dyn LedgerStore>>;
}

/// Connector for Postgres databases
pub struct PgConnector {
    ledger_table: String,
    acquire_timeout: Duration,
}

impl PgConnector {
    pub fn new(ledger_table: impl Into<String>) -> Self {
        Self {
            ledger_table: ledger_table.into(),
            acquire_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

/// Build a `postgres://` URL for the configured database
pub fn database_url(config: &DatabaseConfig) -> MigrationResult<String> {
    match config.adapter.as_str() {
        "postgres" | "postgresql" => {}
        other => {
            return Err(MigrationError::Configuration(format!(
                "unsupported database adapter '{}'",
                other
            )))
        }
    }

    let mut url = Url::parse("postgres://localhost")
        .map_err(|e| MigrationError::Configuration(e.to_string()))?;

    let host = config.host_or_default();
    url.set_host(Some(host))
        .map_err(|e| MigrationError::Configuration(format!("invalid host '{}': {}", host, e)))?;
    url.set_port(config.port)
        .map_err(|_| MigrationError::Configuration("cannot set database port".to_string()))?;
    if !config.user.is_empty() {
        url.set_username(&config.user)
            .map_err(|_| MigrationError::Configuration("cannot set database user".to_string()))?;
    }
    if !config.password.is_empty() {
        url.set_password(Some(&config.password))
            .map_err(|_| MigrationError::Configuration("cannot set database password".to_string()))?;
    }
    url.set_path(&format!("/{}", config.database));

    Ok(url.into())
}

/// Database URL with the password hidden, for log lines
pub fn mask_database_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.into()
        }
        Ok(parsed) => parsed.into(),
        Err(_) => "<invalid url>".to_string(),
    }
}

#[async_trait]
impl DatabaseConnector for PgConnector {
    async fn open(&self, config: &DatabaseConfig) -> MigrationResult<Box<dyn LedgerStore>> {
        let url = database_url(config)?;

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(self.acquire_timeout)
            .connect(&url)
            .await
            .map_err(|e| {
                MigrationError::ConnectionUnavailable(format!("{}: {}", mask_database_url(&url), e))
            })?;

        info!("Opened database at {} for user {}", config.database, config.user);

        Ok(Box::new(PgLedgerStore::new(pool, self.ledger_table.clone())?))
    }
}
