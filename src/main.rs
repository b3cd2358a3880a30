use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures::FutureExt;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use windowguard::config::{CleanupStrategy, GuardConfig};
use windowguard::http::HttpServer;
use windowguard::ratelimit::{spawn_sweeper, SlidingWindowLimiter};

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "windowguard")]
#[command(about = "Per-client sliding-window rate limiting gateway", version)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "WINDOWGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides the configuration file
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Listen port, overrides the port of the listen address
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Maximum admitted requests per client per window
    #[arg(long)]
    max_requests: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => GuardConfig::from_file(path)?,
        None => GuardConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.server.listen_addr = listen;
    }
    if let Some(port) = args.port {
        config.server.listen_addr.set_port(port);
    }
    if let Some(max_requests) = args.max_requests {
        config.rate_limiting.max_requests = max_requests;
    }
    config.validate()?;

    init_tracing(config.logging.json);

    info!("Starting Windowguard");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        listen_addr = %config.server.listen_addr,
        window_ms = config.rate_limiting.window_ms,
        max_requests = config.rate_limiting.max_requests,
        cleanup = ?config.rate_limiting.cleanup,
        environment = ?config.server.environment,
        "Configuration loaded"
    );

    let rate_limiter = Arc::new(SlidingWindowLimiter::from_config(&config.rate_limiting));
    info!("Rate limiter initialized");

    let shutdown = shutdown_signal().shared();

    let sweeper = match config.rate_limiting.cleanup {
        CleanupStrategy::Periodic => Some(spawn_sweeper(
            rate_limiter.clone(),
            Duration::from_secs(config.rate_limiting.sweep_interval_secs),
            shutdown.clone(),
        )),
        CleanupStrategy::Probabilistic => None,
    };

    let server = HttpServer::new(&config.server, rate_limiter);

    server.serve_with_shutdown(shutdown).await?;

    if let Some(sweeper) = sweeper {
        sweeper.await?;
    }

    info!("Windowguard stopped");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the default level.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
