use kiln_core::{Environment, KilnError, ProjectConfig};
use tokio::process::Command;
use tracing::{error, info};

use super::build;
use crate::project::Project;

/// Release-build the server, then hand over to `bin/deploy <mode>`
pub async fn run(project: &Project, config: &ProjectConfig, mode: Option<&str>) -> Result<(), KilnError> {
    let environment = Environment::from_arg(mode);

    if let Err(e) = build::run(project, config, environment).await {
        error!("Error building server for deploy: {}", e);
        return Ok(());
    }

    let script = project.deploy_script();
    if !script.is_file() {
        error!("Could not find deploy script at {}", script.display());
        return Ok(());
    }

    info!("Running deploy from {}", script.display());
    let output = Command::new(&script)
        .arg(environment.as_str())
        .current_dir(project.root())
        .output()
        .await
        .map_err(|e| KilnError::process(script.display().to_string(), e.to_string()))?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    if output.status.success() {
        info!("{}", text);
    } else {
        error!("Error running deploy ({}):\n{}", output.status, text);
    }

    Ok(())
}
