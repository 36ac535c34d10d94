use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use todo_auth::{config::Config, init_tracing, start_server_with_config};
use tracing::info;

/// Todo backend with stateless token authentication and social login
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to a TOML configuration file (default: ./todo-auth.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listening port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_tracing(&config.logging);
    info!("Starting with configuration: {:?}", config);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let port = start_server_with_config(config, shutdown_rx).await?;
    info!("server ready on port {}", port);

    // Wait for Ctrl-C
    tokio::signal::ctrl_c().await?;
    info!("shutdown requested, stopping server...");

    let _ = shutdown_tx.send(());
    // Give in-flight requests a short grace period
    tokio::time::sleep(Duration::from_millis(200)).await;

    Ok(())
}
