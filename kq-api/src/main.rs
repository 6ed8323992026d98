//! Karaoke queue service (kq-api) - Main entry point

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use kq_api::config::{Args, Config};
use kq_api::db::settings;
use kq_api::{build_router, AppState};
use kq_common::config::load_default_config;
use kq_common::db::{init_database, init_database_with_busy_timeout, BOOTSTRAP_BUSY_TIMEOUT_MS};
use kq_common::events::EventBus;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::resolve(args, load_default_config());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting karaoke queue service (kq-api) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Root folder: {}", config.root_folder.display());

    let mut db = init_database(&config.db_path)
        .await
        .context("Failed to open database")?;

    let busy_timeout_ms = settings::get_busy_timeout_ms(&db).await?;
    if busy_timeout_ms != BOOTSTRAP_BUSY_TIMEOUT_MS {
        db.close().await;
        db = init_database_with_busy_timeout(&config.db_path, Duration::from_millis(busy_timeout_ms))
            .await
            .context("Failed to reopen database")?;
        info!("Database busy timeout set to {} ms", busy_timeout_ms);
    }

    let bus = EventBus::new(settings::get_event_bus_capacity(&db).await?);
    let keepalive = Duration::from_secs(settings::get_sse_keepalive_secs(&db).await?);
    info!(
        "Event bus capacity {}, SSE keep-alive {}s",
        bus.capacity(),
        keepalive.as_secs()
    );
    let app = build_router(AppState::new(db, bus, keepalive));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("kq-api listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
