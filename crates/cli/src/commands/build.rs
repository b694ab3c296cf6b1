use kiln_core::{Environment, KilnError, ProjectConfig};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::info;

use crate::project::Project;

/// Compile the server binary with cargo, in debug or release profile
pub async fn compile_server(project: &Project, server_name: &str, release: bool) -> Result<(), KilnError> {
    let mut args = vec!["build", "--bin", server_name];
    if release {
        args.push("--release");
    }

    let status = Command::new("cargo")
        .args(&args)
        .current_dir(project.root())
        .status()
        .await
        .map_err(|e| KilnError::process("cargo build", e.to_string()))?;

    if !status.success() {
        return Err(KilnError::process("cargo build", format!("exited with {}", status)));
    }
    Ok(())
}

/// Release-build the server and install it into `bin/`
pub async fn run(project: &Project, config: &ProjectConfig, environment: Environment) -> Result<PathBuf, KilnError> {
    let server_name = Project::server_name(config, environment);
    info!("Building {} for {}...", server_name, environment);

    compile_server(project, &server_name, true).await?;

    let installed = project.server_path(&server_name);
    tokio::fs::create_dir_all(project.bin_dir()).await?;
    tokio::fs::copy(project.release_server_path(&server_name), &installed).await?;

    info!("Built server at {}", installed.display());
    Ok(installed)
}
