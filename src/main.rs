use std::{future::Future, io};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use recipe_app::{
    actions::users::{create_superuser, UserExtra},
    api,
    config::Config,
    state::{connect, migrate, State},
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Create a staff account with every permission
    CreateSuperuser {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, env = "SUPERUSER_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("Failed to load configuration")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Migrate => {
            let pool = connect(&config).await?;
            migrate(&pool).await?;
            Ok(())
        }
        Commands::CreateSuperuser {
            email,
            name,
            password,
        } => {
            let pool = connect(&config).await?;
            migrate(&pool).await?;

            let user = create_superuser(Some(&email), &password, UserExtra::named(&name), &pool)
                .await
                .context("Failed to create superuser")?;
            info!("Superuser {} created", user.email);
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let address = config.bind_address;
    tokio::fs::create_dir_all(&config.media_root)
        .await
        .with_context(|| format!("Failed to create {}", config.media_root.display()))?;

    let state = State::new(config).await?;

    let (address, server) = warp::serve(api(state))
        .try_bind_with_graceful_shutdown(address, shutdown_on(tokio::signal::ctrl_c()))
        .with_context(|| format!("Failed to bind {address}"))?;

    info!("Listening on http://{address}");
    server.await;

    Ok(())
}

/// Resolves once `signal` fires. A signal that cannot be installed still
/// stops the server, but says so.
async fn shutdown_on(signal: impl Future<Output = io::Result<()>>) {
    match signal.await {
        Ok(()) => info!("Shutting down"),
        Err(e) => warn!("Failed to listen for Ctrl-C, shutting down: {e}"),
    }
}
