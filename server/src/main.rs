use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chat_dev_server::config::{self, AppConfig};
use chat_dev_server::{router, AppState};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONFIG_FILE: &str = "configurations.json";

/// Development backend for the adaptive chat client.
#[derive(Debug, Parser)]
#[command(name = "chat-dev-server", version)]
struct Args {
    /// Seed configurations. Built-in Friendly/Formal seeds when the file is missing.
    #[arg(long, short = 'c', default_value = CONFIG_FILE)]
    config: PathBuf,

    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    host: IpAddr,

    #[arg(long, short = 'p', default_value_t = 8000)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_dev_server=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Load Config
    let config = if tokio::fs::try_exists(&args.config).await.unwrap_or(false) {
        config::load_config(&args.config).await?
    } else {
        tracing::warn!(
            "Configuration file {} not found. Using built-in personalities.",
            args.config.display()
        );
        AppConfig::default()
    };

    let state = AppState::load(&config).await?;
    let app = router(state);

    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
