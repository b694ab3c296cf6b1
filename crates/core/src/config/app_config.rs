use crate::config::{ConfigError, DatabaseConfig};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

/// Named settings for one environment, e.g. `{"db": "app_dev", "db_user": "app"}`
pub type Settings = BTreeMap<String, String>;

/// Environment (mode) selecting which settings block is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" | "testing" => Ok(Environment::Test),
            _ => Err(ConfigError::invalid_value(
                "environment",
                s,
                "development, production, or test",
            )),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Environment {
    /// Resolve the mode argument given on the command line.
    ///
    /// Missing or unrecognised values select development.
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            Some(value) => value.parse().unwrap_or_else(|_| {
                tracing::warn!("Unknown mode '{}', using development", value);
                Environment::Development
            }),
            None => Environment::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }
}

/// Project configuration read from `secrets/kiln.json`.
///
/// Built once at process start and handed to each command; nothing
/// mutates it afterwards.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub development: Settings,
    #[serde(default)]
    pub production: Settings,
    #[serde(default)]
    pub test: Settings,
}

impl ProjectConfig {
    /// Load the configuration file at `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::file_system(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    /// Parse configuration from JSON text
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Settings for the given environment
    pub fn settings(&self, environment: Environment) -> &Settings {
        match environment {
            Environment::Development => &self.development,
            Environment::Production => &self.production,
            Environment::Test => &self.test,
        }
    }

    /// Look up a single setting for the given environment
    pub fn get(&self, environment: Environment, key: &str) -> Option<&str> {
        self.settings(environment).get(key).map(String::as_str)
    }

    /// Database settings for the given environment
    pub fn database(&self, environment: Environment) -> Result<DatabaseConfig, ConfigError> {
        DatabaseConfig::from_settings(self.settings(environment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "development": {"db": "shop_dev", "db_adapter": "postgres", "db_user": "shop", "db_pass": "secret"},
        "production": {"db": "shop", "db_adapter": "postgres", "db_user": "deploy", "db_pass": "hunter2", "db_host": "db.internal", "db_port": "6432"},
        "test": {"db": "shop_test", "db_adapter": "postgres", "db_user": "shop", "db_pass": ""}
    }"#;

    #[test]
    fn test_environment_from_arg_defaults_to_development() {
        assert_eq!(Environment::from_arg(None), Environment::Development);
        assert_eq!(Environment::from_arg(Some("staging")), Environment::Development);
        assert_eq!(Environment::from_arg(Some("production")), Environment::Production);
        assert_eq!(Environment::from_arg(Some("TEST")), Environment::Test);
    }

    #[test]
    fn test_environment_parse_rejects_unknown() {
        let err = "qa".parse::<Environment>().unwrap_err();
        assert!(err.to_string().contains("development, production, or test"));
        assert_eq!(Environment::Production.to_string(), "production");
    }

    #[test]
    fn test_settings_per_environment() {
        let config = ProjectConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.get(Environment::Development, "db"), Some("shop_dev"));
        assert_eq!(config.get(Environment::Test, "db"), Some("shop_test"));
        assert_eq!(config.get(Environment::Production, "missing"), None);

        let db = config.database(Environment::Production).unwrap();
        assert_eq!(db.database, "shop");
        assert_eq!(db.host, "db.internal");
        assert_eq!(db.port, Some(6432));
    }

    #[test]
    fn test_missing_sections_are_empty() {
        let config = ProjectConfig::from_json(r#"{"development": {"db": "a"}}"#).unwrap();
        assert!(config.settings(Environment::Production).is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = ProjectConfig::load(file.path()).unwrap();
        assert_eq!(config.get(Environment::Development, "db_user"), Some("shop"));

        let missing = ProjectConfig::load(Path::new("/nonexistent/kiln.json"));
        assert!(matches!(missing, Err(ConfigError::FileSystemError { .. })));
    }
}
