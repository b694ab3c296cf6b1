use kiln_core::{Environment, KilnError, ProjectConfig};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{error, info, warn};

use super::{build, version};
use crate::project::Project;

/// Build the server binary and run it in the foreground, piping its output
pub async fn run(project: &Project, config: &ProjectConfig) -> Result<(), KilnError> {
    version::show();

    let environment = Environment::Development;
    let server_name = Project::server_name(config, environment);

    info!("Building server...");
    if let Err(e) = build::compile_server(project, &server_name, false).await {
        error!("Error building server: {}", e);
        return Ok(());
    }

    info!("Launching server...");
    let mut child = Command::new(project.local_server_path(&server_name))
        .current_dir(project.root())
        .env("KILN_ENV", environment.as_str())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| KilnError::system_error_with_source("Failed to start server", Box::new(e)))?;

    tokio::select! {
        result = child.wait() => {
            match result {
                Ok(status) if status.success() => info!("Server exited"),
                Ok(status) => warn!("Server exited with {}", status),
                Err(e) => error!("Server process error: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down server...");
            if let Err(e) = child.kill().await {
                warn!("Failed to stop server: {}", e);
            }
        }
    }

    Ok(())
}
