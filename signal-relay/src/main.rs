//! signal-relay binary entry point.
//!
//! Usage:
//! ```bash
//! signal-relay --config relay.toml
//! signal-relay --bind 0.0.0.0:9000
//! signal-relay --help
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use peerlink_signal_relay::cleanup::spawn_cleanup_task;
use peerlink_signal_relay::config::{Config, LoggingConfig, DEFAULT_CONFIG_FILE};
use peerlink_signal_relay::traffic::TRAFFIC_TARGET;
use peerlink_signal_relay::{http, SignalingRelay};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "signal-relay")]
#[command(author, version, about = "Rendezvous signaling relay", long_about = None)]
struct Args {
    /// Configuration file (defaults to ./relay.toml when present)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Address to listen on, overrides `server.bind_address`
    #[arg(short, long, value_name = "ADDR")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_file_or_default(Path::new(DEFAULT_CONFIG_FILE))?,
    };
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }

    let _traffic_guard = init_logging(&config.logging)?;
    tracing::info!("signal-relay v{} starting", env!("CARGO_PKG_VERSION"));

    let bind_address = config.server.bind_address.clone();
    let ws_path = config.server.ws_path.clone();
    let cleanup = config.cleanup.clone();

    let relay = Arc::new(SignalingRelay::new(config));
    let cleanup_task = spawn_cleanup_task(relay.clone(), cleanup);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    tracing::info!("Listening on ws://{}{}", listener.local_addr()?, ws_path);

    http::serve(listener, relay, shutdown_signal()).await?;

    cleanup_task.abort();
    tracing::info!("signal-relay stopped");
    Ok(())
}

/// Install the global subscriber.
///
/// Everything goes to stderr under `RUST_LOG` (default `info`). With a
/// traffic log directory configured, traffic records are also written to
/// `<dir>/<YYYY-MM-DD-HH-MM-SS>.log`; the returned guard flushes that file.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter);

    let (traffic_layer, guard) = match &config.traffic_log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            let file_name = format!("{}.log", chrono::Local::now().format("%Y-%m-%d-%H-%M-%S"));
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .with_filter(Targets::new().with_target(TRAFFIC_TARGET, Level::INFO));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr)
        .with(traffic_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal, exiting gracefully");
}
