mod commands;
mod project;

use clap::{Parser, Subcommand};
use commands::*;
use kiln_core::{init_logging, Environment, KilnError, LoggingConfig, ProjectConfig};
use project::Project;

#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(about = "Build, serve, deploy and migrate kiln web applications")]
struct Cli {
    /// Show debug output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Defaults to `server` when omitted
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(flatten)]
    Project(ProjectCommands),

    /// Display the kiln version
    #[command(alias = "v")]
    Version,
}

/// Commands that run inside a kiln project
#[derive(Subcommand, Debug)]
enum ProjectCommands {
    /// Run new SQL migrations in db/migrate
    #[command(alias = "m")]
    Migrate {
        /// Mode: development, production or test
        mode: Option<String>,
    },

    /// Show applied and pending migrations
    Status {
        /// Mode: development, production or test
        mode: Option<String>,
    },

    /// Generate project files
    #[command(alias = "g")]
    Generate {
        #[command(subcommand)]
        generate_command: GenerateCommands,
    },

    /// Build and run the server
    #[command(alias = "s")]
    Server,

    /// Run the project's tests
    #[command(alias = "t")]
    Test {
        /// Arguments passed through to cargo test
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Release-build the server into bin/
    #[command(alias = "B")]
    Build,

    /// Build, then run bin/deploy
    #[command(alias = "d")]
    Deploy {
        /// Mode: development, production or test
        mode: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum GenerateCommands {
    /// Create a new named SQL migration in db/migrate
    Migration {
        /// Migration name (e.g., create_users)
        name: String,
    },
}

impl Cli {
    fn command(self) -> Commands {
        self.command
            .unwrap_or(Commands::Project(ProjectCommands::Server))
    }
}

#[tokio::main]
async fn main() -> Result<(), KilnError> {
    let cli = Cli::parse();

    let logging = if cli.verbose {
        LoggingConfig::verbose()
    } else {
        LoggingConfig::default()
    };
    if let Err(e) = init_logging(&logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match cli.command() {
        Commands::Version => version::show(),
        Commands::Project(command) => {
            let project = Project::current()?;
            if !project.require_valid() {
                return Ok(());
            }
            let config = project.load_config();
            run_project_command(command, &project, &config).await?;
        }
    }

    Ok(())
}

async fn run_project_command(
    command: ProjectCommands,
    project: &Project,
    config: &ProjectConfig,
) -> Result<(), KilnError> {
    match command {
        ProjectCommands::Migrate { mode } => {
            migrate::run(project, config, mode.as_deref()).await?;
        }
        ProjectCommands::Status { mode } => {
            migrate::status(project, config, mode.as_deref()).await?;
        }
        ProjectCommands::Generate { generate_command } => match generate_command {
            GenerateCommands::Migration { name } => {
                migrate::create(project, &name).await?;
            }
        },
        ProjectCommands::Server => {
            serve::run(project, config).await?;
        }
        ProjectCommands::Test { args } => {
            test::run(project, &args).await?;
        }
        ProjectCommands::Build => {
            build::run(project, config, Environment::Development).await?;
        }
        ProjectCommands::Deploy { mode } => {
            deploy::run(project, config, mode.as_deref()).await?;
        }
    }

    Ok(())
}
