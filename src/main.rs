use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use bodymetrics::config::AppConfig;
use bodymetrics::http::{AppState, HttpServer};
use bodymetrics::ratelimit::spawn_sweeper;

#[derive(Debug, Parser)]
#[command(name = "bodymetrics", version, about = "Body metrics tracking API")]
struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, env = "BODYMETRICS_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    info!("Starting BodyMetrics API");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(args.config.as_deref())?;
    info!(
        bind_addr = %config.server.bind_addr,
        login_capacity = config.rate_limiting.login.capacity,
        forgot_password_capacity = config.rate_limiting.forgot_password.capacity,
        "Configuration loaded"
    );

    let bind_addr = config.server.bind_addr;
    let sweep_interval = config.rate_limiting.sweep_interval_secs;
    let state = AppState::in_memory(config);

    let sweeper = match sweep_interval {
        Some(0) => {
            warn!("Ignoring zero sweep interval");
            None
        }
        Some(secs) => Some(spawn_sweeper(state.limiters(), Duration::from_secs(secs))),
        None => None,
    };

    let server = HttpServer::bind(bind_addr, state).await?;
    info!("Listening on {}", server.local_addr()?);

    server.serve_with_shutdown(shutdown_signal()).await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }

    info!("BodyMetrics API stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bodymetrics=info,tower_http=info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false).with_thread_ids(true))
            .init();
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
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
