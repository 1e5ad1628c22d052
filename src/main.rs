//! Duel arena match server.
//!
//! Players authenticate with a session token, queue for a solo or duel match
//! over HTTP and then stay on a WebSocket. Every running match is one tokio
//! task owning the authoritative coordinator; it ticks at a fixed rate and
//! replicates its state to the seated players.

mod app;
mod config;
mod game;
mod http;
mod matchmaking;
mod util;
mod ws;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::http::build_router;
use crate::util::time::{init_server_time, SIMULATION_TPS};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    init_tracing(&config.log_level);
    init_server_time();

    let defaults = &config.match_defaults;
    info!(
        addr = %config.server_addr,
        tick_rate = SIMULATION_TPS,
        match_duration_secs = defaults.match_duration.as_secs(),
        countdown_secs = defaults.countdown.as_secs(),
        score_to_win = defaults.score_to_win,
        "Starting duel arena server"
    );

    let state = AppState::new(config);

    // Queues are drained for the lifetime of the process
    let matchmaking = state.matchmaking.clone();
    tokio::spawn(async move { matchmaking.run().await });

    serve(state).await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Bind the listener and serve HTTP and WebSocket traffic until shutdown
async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = state.config.server_addr;
    let router = build_router(state);
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, health = "/health", websocket = "/ws", "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
