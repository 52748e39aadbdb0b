//! Parley HTTP server entry point.
//!
//! Binary name: `parley`
//!
//! Parses CLI arguments, initializes tracing, database and services, starts
//! the rate-limiter sweep and serves the router until Ctrl+C or SIGTERM.
//! Streamed turns still being persisted are given time to finish on the way
//! out.

mod http;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use parley_infra::config::resolve_data_dir;
use parley_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
use state::AppState;

/// Authenticated chat service backed by an OpenAI-compatible provider.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
struct Cli {
    /// Address to bind.
    #[arg(long, env = "PARLEY_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Data directory holding `parley.db` and `config.toml`.
    #[arg(long, env = "PARLEY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log one JSON object per line.
    #[arg(long, env = "PARLEY_LOG_JSON")]
    log_json: bool,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long)]
    otel: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let directive = match cli.verbose {
        0 => "info",
        1 => "info,parley=debug,parley_core=debug,parley_infra=debug,parley_api=debug",
        _ => "trace",
    };
    init_tracing(&TracingOptions {
        directive: directive.to_string(),
        json: cli.log_json,
        otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("tracing init failed: {e}"))?;

    let data_dir = cli.data_dir.unwrap_or_else(resolve_data_dir);
    let state = AppState::init(&data_dir).await?;

    if !state.chat_service.is_configured() {
        tracing::warn!("no completion provider configured; POST /chat will fail");
    }

    let cancel = CancellationToken::new();
    let sweeper = state.rate_limiter.spawn_sweeper(
        Duration::from_secs(state.config.rate_limit.sweep_interval_secs),
        cancel.clone(),
    );

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, data_dir = %data_dir.display(), "parley listening");

    let chat_service = state.chat_service.clone();
    let drain_timeout = Duration::from_secs(state.config.chat.drain_timeout_secs);
    let router = http::router::build_router(state);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    chat_service.drain(drain_timeout).await;
    cancel.cancel();
    let _ = sweeper.await;
    tracing::info!("server stopped");
    shutdown_tracing();

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
