mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "infra")]
#[command(about = "Provision database infrastructure with automatic rollback", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the virtual machines of a database infrastructure
    Provision {
        /// Environment name (dev, stg, prod)
        #[arg(short, long, env = "INFRAFLOW_ENV")]
        env: String,
        /// Plan id from the settings file
        #[arg(short, long)]
        plan: String,
        /// Database infrastructure name (created if it does not exist)
        #[arg(short, long)]
        infra: String,
        /// Virtual machine names, in creation order
        #[arg(required = true)]
        vms: Vec<String>,
        /// Write the final workflow context as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Check cloud provider authentication for an environment
    Auth {
        /// Environment name (dev, stg, prod)
        #[arg(short, long, env = "INFRAFLOW_ENV")]
        env: String,
    },
    /// Show the infrastructures recorded in the local state file
    Status,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Version => {
            println!("infraflow {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Auth { env } => {
            commands::auth::handle(&env).await?;
        }
        Commands::Status => {
            commands::status::handle().await?;
        }
        Commands::Provision {
            env,
            plan,
            infra,
            vms,
            report,
        } => {
            let completed =
                commands::provision::handle(&env, &plan, &infra, vms, report.as_deref()).await?;
            if !completed {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
