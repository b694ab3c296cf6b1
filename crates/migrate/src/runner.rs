//! External SQL client invocation

use async_trait::async_trait;
use kiln_core::DatabaseConfig;
use std::ffi::OsString;
use std::io;
use tokio::process::Command;

use crate::definitions::MigrationFile;

/// Where a migration file is executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionTarget {
    /// The database server itself, without selecting a database
    Server,
    /// A named database
    Database(String),
}

impl ExecutionTarget {
    /// Creation migrations run at server scope; everything else against the configured database
    pub fn for_migration(file: &MigrationFile, config: &DatabaseConfig) -> Self {
        if file.is_creation_migration {
            ExecutionTarget::Server
        } else {
            ExecutionTarget::Database(config.database.clone())
        }
    }
}

/// Captured result of one SQL client invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub exit_code: Option<i32>,
    /// Standard output followed by standard error
    pub text: String,
}

impl CommandOutput {
    pub fn new(exit_code: Option<i32>, text: impl Into<String>) -> Self {
        Self {
            exit_code,
            text: text.into(),
        }
    }
}

/// Executes one migration file
#[async_trait]
pub trait SqlRunner: Send + Sync {
    async fn execute(
        &self,
        file: &MigrationFile,
        target: &ExecutionTarget,
        config: &DatabaseConfig,
    ) -> io::Result<CommandOutput>;
}

/// Runs migration files through `psql`
#[derive(Debug, Clone)]
pub struct PsqlRunner {
    program: String,
}

impl PsqlRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Command line arguments for one invocation.
    ///
    /// `-h` is only passed for a configured host so that psql can use the
    /// local socket. `-w` stops psql from prompting for a password.
    pub fn arguments(
        file: &MigrationFile,
        target: &ExecutionTarget,
        config: &DatabaseConfig,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-w".into()];

        if !config.host.is_empty() {
            args.push("-h".into());
            args.push(config.host.clone().into());
        }
        if let Some(port) = config.port {
            args.push("-p".into());
            args.push(port.to_string().into());
        }
        if !config.user.is_empty() {
            args.push("-U".into());
            args.push(config.user.clone().into());
        }
        if let ExecutionTarget::Database(name) = target {
            args.push("-d".into());
            args.push(name.clone().into());
        }
        args.push("-f".into());
        args.push(file.path.clone().into_os_string());
        args
    }
}

impl Default for PsqlRunner {
    fn default() -> Self {
        Self::new("psql")
    }
}

#[async_trait]
impl SqlRunner for PsqlRunner {
    async fn execute(
        &self,
        file: &MigrationFile,
        target: &ExecutionTarget,
        config: &DatabaseConfig,
    ) -> io::Result<CommandOutput> {
        let mut command = Command::new(&self.program);
        command.args(Self::arguments(file, target, config));
        if !config.password.is_empty() {
            command.env("PGPASSWORD", &config.password);
        }

        let output = command.output().await?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput::new(output.status.code(), text))
    }
}
