//! # VetConnect Worker
//!
//! Runs scheduled database maintenance next to the API server. Today that
//! is the hourly sweep of expired token revocations.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p vetconnect-worker
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vetconnect_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
use vetconnect_worker::{config::WorkerConfig, sweeper::BlacklistSweeper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vetconnect_worker=debug,vetconnect_shared=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "VetConnect Worker v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = WorkerConfig::from_env()?;

    let pool = create_pool(DatabaseConfig {
        url: config.database_url.clone(),
        max_connections: config.max_connections,
        ..Default::default()
    })
    .await?;

    let sweeper = BlacklistSweeper::new(pool.clone(), config.sweep_interval);
    let shutdown = sweeper.shutdown_token();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received, stopping worker..."),
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C, stopping worker"),
        }
        shutdown.cancel();
    });

    sweeper.run().await;

    close_pool(pool).await;
    tracing::info!("Worker stopped");

    Ok(())
}
