//! backline-api - Main entry point
//!
//! Resolves configuration once at startup (arguments over environment,
//! failing fast on anything missing), initializes the database, and serves
//! the HTTP API.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use backline_api::{server, state::AppContext};
use backline_common::{db, Config};

/// Command-line arguments for backline-api
#[derive(Parser, Debug)]
#[command(name = "backline-api")]
#[command(about = "HTTP API service for backline")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5780", env = "BACKLINE_PORT")]
    port: u16,

    /// Database connection URL (e.g. sqlite://backline.db?mode=rwc)
    #[arg(short, long, env = "BACKLINE_DATABASE_URL")]
    database_url: String,

    /// Service key for bearer authentication (empty disables auth)
    #[arg(short, long, default_value = "", env = "BACKLINE_SERVICE_KEY")]
    service_key: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "backline_api=debug,backline_common=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse and validate configuration up front
    let args = Args::parse();
    let config = Config::new(args.port, args.database_url, args.service_key)
        .context("Invalid configuration")?;

    info!("Starting backline-api on port {}", config.port);

    let pool = db::init_database(&config.database_url)
        .await
        .context("Failed to initialize database")?;

    let ctx = AppContext::new(pool, config);

    server::run(ctx).await.context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}
