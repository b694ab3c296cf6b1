use kiln_core::{Environment, KilnError, ProjectConfig};
use std::path::{Path, PathBuf};
use tracing::{error, warn};

/// Server binary name used when the config does not set `server_name`
pub const DEFAULT_SERVER_NAME: &str = "kiln-server";

/// Paths of a kiln project rooted at one directory
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
}

impl Project {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Project rooted at the current working directory
    pub fn current() -> Result<Self, KilnError> {
        let root = std::env::current_dir()?;
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A project is valid when it has a `Cargo.toml` at its root
    pub fn is_valid(&self) -> bool {
        self.root.join("Cargo.toml").is_file()
    }

    /// Log an error and return false if this is not a valid project
    pub fn require_valid(&self) -> bool {
        if self.is_valid() {
            return true;
        }
        error!(
            "No kiln project found at {} (missing Cargo.toml)",
            self.root.display()
        );
        false
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("secrets").join("kiln.json")
    }

    /// Read the project configuration, falling back to empty settings.
    ///
    /// Commands like `build` and `server` still work without a config file.
    pub fn load_config(&self) -> ProjectConfig {
        let path = self.config_path();
        match ProjectConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Could not read config at {}: {}", path.display(), e);
                ProjectConfig::default()
            }
        }
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn deploy_script(&self) -> PathBuf {
        self.bin_dir().join("deploy")
    }

    /// Name of the server binary for `environment`
    pub fn server_name(config: &ProjectConfig, environment: Environment) -> String {
        config
            .get(environment, "server_name")
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_SERVER_NAME)
            .to_string()
    }

    /// Debug build output for the server binary
    pub fn local_server_path(&self, server_name: &str) -> PathBuf {
        self.root.join("target").join("debug").join(server_name)
    }

    /// Release build output for the server binary
    pub fn release_server_path(&self, server_name: &str) -> PathBuf {
        self.root.join("target").join("release").join(server_name)
    }

    /// Installed server binary, as shipped by `deploy`
    pub fn server_path(&self, server_name: &str) -> PathBuf {
        self.bin_dir().join(server_name)
    }
}
