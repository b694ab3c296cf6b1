//! Migration file discovery
//!
//! Migrations run in lexicographic order of their file names. Authors must
//! pick names whose byte order is the intended execution order (zero padded
//! sequence numbers or `YYYYMMDDHHMMSS` timestamps); nothing else is used to
//! resolve ordering.

use chrono::Utc;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::definitions::{MigrationConfig, MigrationFile};
use crate::error::{MigrationError, MigrationResult};

/// Problems with migration names that make ordering ambiguous
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamingIssue {
    /// Name does not start with a numeric ordering prefix
    MissingPrefix { name: String },
    /// More than one file shares the same ordering prefix
    DuplicatePrefix { prefix: String, names: Vec<String> },
}

impl std::fmt::Display for NamingIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NamingIssue::MissingPrefix { name } => {
                write!(f, "migration {} has no numeric ordering prefix", name)
            }
            NamingIssue::DuplicatePrefix { prefix, names } => write!(
                f,
                "ordering prefix {} is shared by {}",
                prefix,
                names.join(", ")
            ),
        }
    }
}

/// The set of migration files in one directory
#[derive(Debug, Clone)]
pub struct MigrationFileSet {
    directory: PathBuf,
    extension: String,
    creation_marker: String,
}

impl MigrationFileSet {
    pub fn new(config: &MigrationConfig) -> Self {
        Self {
            directory: config.migrations_dir.clone(),
            extension: config.extension.clone(),
            creation_marker: config.creation_marker.clone(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// List migration files sorted by name.
    ///
    /// A missing directory is an empty set. Any other read failure is a
    /// `Discovery` error.
    pub fn discover(&self) -> MigrationResult<Vec<MigrationFile>> {
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(MigrationError::Discovery(format!(
                    "{}: {}",
                    self.directory.display(),
                    e
                )))
            }
        };

        let mut migrations = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                MigrationError::Discovery(format!("{}: {}", self.directory.display(), e))
            })?;

            let path = entry.path();
            if !path.is_file() || !self.has_migration_extension(&path) {
                continue;
            }

            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                tracing::warn!("Skipping migration with non UTF-8 name: {}", path.display());
                continue;
            };

            migrations.push(MigrationFile::new(name, path.clone(), &self.creation_marker));
        }

        migrations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(migrations)
    }

    fn has_migration_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext == self.extension)
    }

    /// Report names without an ordering prefix and prefixes used more than once
    pub fn check_names(files: &[MigrationFile]) -> Vec<NamingIssue> {
        let prefix_re = match Regex::new(r"^(\d+)") {
            Ok(re) => re,
            Err(e) => {
                tracing::error!("Invalid ordering prefix pattern: {}", e);
                return Vec::new();
            }
        };

        let mut issues = Vec::new();
        let mut by_prefix: BTreeMap<&str, Vec<String>> = BTreeMap::new();

        for file in files {
            match prefix_re.captures(&file.name).and_then(|c| c.get(1)) {
                Some(prefix) => by_prefix
                    .entry(prefix.as_str())
                    .or_default()
                    .push(file.name.clone()),
                None => issues.push(NamingIssue::MissingPrefix {
                    name: file.name.clone(),
                }),
            }
        }

        for (prefix, names) in by_prefix {
            if names.len() > 1 {
                issues.push(NamingIssue::DuplicatePrefix {
                    prefix: prefix.to_string(),
                    names,
                });
            }
        }

        issues
    }

    /// Write a new timestamped migration file and return its path
    pub fn create(&self, name: &str) -> MigrationResult<PathBuf> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(MigrationError::Configuration(format!(
                "invalid migration name '{}'",
                name
            )));
        }

        fs::create_dir_all(&self.directory).map_err(|e| {
            MigrationError::Io(format!(
                "Failed to create migrations directory {}: {}",
                self.directory.display(),
                e
            ))
        })?;

        let now = Utc::now();
        let filename = format!("{}_{}.{}", now.format("%Y%m%d%H%M%S"), slug, self.extension);
        let path = self.directory.join(&filename);
        if path.exists() {
            return Err(MigrationError::Io(format!(
                "Migration {} already exists",
                path.display()
            )));
        }

        let template = format!(
            "-- Migration: {}\n\
             -- Created: {}\n\
             -- Runs once, forward only. Keep statements safe to re-run.\n\n",
            name,
            now.format("%Y-%m-%d %H:%M:%S UTC")
        );

        fs::write(&path, template).map_err(|e| {
            MigrationError::Io(format!("Failed to write migration file {}: {}", path.display(), e))
        })?;

        Ok(path)
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if (c.is_whitespace() || c == '-' || c == '_') && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}
