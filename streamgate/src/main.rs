mod migrations;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use streamgate_core::{
    bootstrap::{init_database, init_services, load_config},
    logging,
};

use server::StreamGateServer;

#[derive(Parser, Debug)]
#[command(name = "streamgate")]
#[command(about = "Stream key authentication and broadcast lifecycle for MediaMTX", long_about = None)]
struct Args {
    /// Config file (defaults to STREAMGATE_CONFIG_PATH, ./config.yaml, /config/config.yaml)
    #[arg(long, short)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load and validate configuration
    let config = load_config(args.config.as_deref())?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("StreamGate starting...");

    // 3. Initialize database
    let pool = init_database(&config).await?;

    // 4. Run migrations
    migrations::run_migrations(&pool).await?;
    if args.command == Some(Command::Migrate) {
        pool.close().await;
        return Ok(());
    }

    // 5. Initialize services
    let services = init_services(pool.clone(), &config, None)?;

    // 6. Serve until shutdown
    info!("HTTP address: {}", config.http_address());
    StreamGateServer::new(config, services, pool).start().await
}
