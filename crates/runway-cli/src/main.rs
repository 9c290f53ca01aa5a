mod commands;

use clap::{Parser, Subcommand};
use runway_core::PublishStrategy;

#[derive(Parser)]
#[command(name = "runway", about = "Deploy containerized web apps to AWS App Runner")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, publish, and deploy an environment
    Deploy {
        /// Environment name (default: preview-$USER)
        environment: Option<String>,
        /// Where the image is built: local (Docker) or remote (CodeBuild)
        #[arg(long)]
        strategy: Option<PublishStrategy>,
        /// Secrets Manager ARN holding the database credentials
        #[arg(long, env = "SECRETS_ARN")]
        secrets_arn: Option<String>,
    },
    /// Show stack status and service URL
    Status {
        /// Environment name (default: preview-$USER)
        environment: Option<String>,
        /// Also request <url>/health and report the answer
        #[arg(long)]
        probe: bool,
    },
    /// Delete an environment's stack, service, and image repository
    Destroy {
        /// Environment name (default: preview-$USER)
        environment: Option<String>,
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Check local tooling and AWS access
    Doctor,
    /// Print the CloudFormation template
    Template {
        /// Render the secrets bindings for this Secrets Manager ARN
        #[arg(long)]
        secrets_arn: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        // stdout carries command output, e.g. `runway template > template.json`
        .with_writer(std::io::stderr)
        .init();

    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => tracing::debug!("no .env file"),
        Err(e) => tracing::warn!(error = %e, "failed to load .env"),
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Deploy {
            environment,
            strategy,
            secrets_arn,
        } => commands::deploy(environment.as_deref(), strategy, secrets_arn.as_deref()).await?,
        Commands::Status { environment, probe } => {
            commands::status(environment.as_deref(), probe).await?
        }
        Commands::Destroy { environment, yes } => {
            commands::destroy(environment.as_deref(), yes).await?
        }
        Commands::Doctor => commands::doctor().await?,
        Commands::Template { secrets_arn } => commands::template(secrets_arn.as_deref())?,
    }

    Ok(())
}
