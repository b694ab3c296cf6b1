use crate::config::{ConfigError, Settings};

pub const DEFAULT_ADAPTER: &str = "postgres";
/// Host used for connection URLs when `db_host` is not set
pub const DEFAULT_HOST: &str = "localhost";

/// Connection settings for the target database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub adapter: String,
    pub database: String,
    pub user: String,
    pub password: String,
    /// Empty when `db_host` is not set; clients then use their local default
    pub host: String,
    pub port: Option<u16>,
}

impl DatabaseConfig {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            adapter: DEFAULT_ADAPTER.to_string(),
            database: database.into(),
            user: String::new(),
            password: String::new(),
            host: String::new(),
            port: None,
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    /// Build from an environment's settings (`db`, `db_adapter`, `db_user`,
    /// `db_pass`, `db_host`, `db_port`)
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let value = |key: &str| settings.get(key).cloned().unwrap_or_default();

        let database = value("db");
        if database.is_empty() {
            return Err(ConfigError::missing_required(
                "db",
                "Add the database name to secrets/kiln.json",
            ));
        }

        let port = match settings.get("db_port") {
            Some(raw) if !raw.is_empty() => Some(raw.parse::<u16>().map_err(|_| {
                ConfigError::invalid_value("db_port", raw, "valid port number (0-65535)")
            })?),
            _ => None,
        };

        let adapter = settings
            .get("db_adapter")
            .filter(|a| !a.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_ADAPTER.to_string());
        Ok(Self {
            adapter,
            database,
            user: value("db_user"),
            password: value("db_pass"),
            host: value("db_host"),
            port,
        })
    }

    /// Configured host, or `localhost` when none is set
    pub fn host_or_default(&self) -> &str {
        if self.host.is_empty() {
            DEFAULT_HOST
        } else {
            &self.host
        }
    }
}
