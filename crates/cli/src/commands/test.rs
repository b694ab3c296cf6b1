use kiln_core::{Environment, KilnError};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{error, info};

use crate::project::Project;

/// `cargo test` arguments; extra arguments are passed through unchanged
pub fn cargo_test_args(extra: &[String]) -> Vec<String> {
    let mut args = vec!["test".to_string()];
    args.extend(extra.iter().cloned());
    args
}

/// Run the project's tests in test mode
pub async fn run(project: &Project, extra: &[String]) -> Result<(), KilnError> {
    info!("Running tests...");

    let status = Command::new("cargo")
        .args(cargo_test_args(extra))
        .current_dir(project.root())
        .env("KILN_ENV", Environment::Test.as_str())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|e| KilnError::process("cargo test", e.to_string()))?;

    if status.success() {
        info!("Tests passed");
    } else {
        error!("Tests failed ({})", status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cargo_test_args() {
        assert_eq!(cargo_test_args(&[]), vec!["test"]);
        assert_eq!(
            cargo_test_args(&["ledger".to_string(), "--".to_string(), "--nocapture".to_string()]),
            vec!["test", "ledger", "--", "--nocapture"]
        );
    }
}
