mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pctl", about = "Deploy Docker Compose stacks to Portainer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a pctl.yml configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
    /// Deploy a new stack to Portainer
    Deploy,
    /// Rebuild changed services and update the existing stack
    Redeploy {
        /// Rebuild every service even when unchanged (no-cache)
        #[arg(long)]
        force_build: bool,
    },
    /// Show the stack's containers
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => commands::init(force)?,
        Commands::Deploy => commands::deploy().await?,
        Commands::Redeploy { force_build } => commands::redeploy(force_build).await?,
        Commands::Status => commands::status().await?,
    }

    Ok(())
}
