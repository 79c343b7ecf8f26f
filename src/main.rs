//! lastwave - Main entry point
//!
//! Wires the pieces together: configuration, the Last.fm client, the
//! configured player source, the application actor, and the poll scheduler.
//! Runs until Ctrl+C or SIGTERM, then finalizes any still-armed track.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lastwave::app::{spawn_scheduler, App, AppMsg};
use lastwave::config::{Args, Settings};
use lastwave::lastfm::LastfmClient;
use lastwave::player::create_player;
use lastwave::prefs::PrefStore;
use lastwave::state::SharedState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lastwave=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let settings = Settings::from_args(args).context("Invalid configuration")?;

    info!(
        "Starting lastwave (poll interval {:?}, player {:?})",
        settings.poll_interval, settings.player
    );

    let prefs =
        PrefStore::load(&settings.prefs_path).context("Failed to load preferences")?;

    let service = Arc::new(
        LastfmClient::new(
            settings.api_key.clone(),
            settings.session_key.clone(),
            settings.username.clone(),
        )
        .context("Failed to build Last.fm client")?,
    );

    let player = create_player(&settings)
        .await
        .context("Failed to connect to media player")?;
    info!("Polling player source: {}", player.name());

    let shared = Arc::new(SharedState::new());
    let has_username = !settings.username.is_empty();
    let poll_interval = settings.poll_interval;
    let (mut app, handle) = App::new(settings, shared, service, prefs);

    app.start_initial_history();
    if has_username {
        handle.send(AppMsg::RefreshRoster).await;
    }

    let scheduler = spawn_scheduler(player, handle.sender(), poll_interval);

    tokio::select! {
        _ = app.run() => {
            info!("Message channel closed");
        },
        _ = shutdown_signal() => {},
    }

    scheduler.abort();
    app.finalize_on_shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
