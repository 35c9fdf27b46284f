// src/main.rs
use std::sync::Arc;
use chrono::Utc;
use tokio::signal::ctrl_c;
use tokio::time::Duration;

use trade_ingest::adapter::IngestionCoordinator;
use trade_ingest::config::Config;
use trade_ingest::domain::errors::AppResult;
use trade_ingest::infrastructure::persistence::InMemoryTradeRepository;

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    config.init_logging()?;

    log::info!("Starting trade_ingest v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Feed: {}", config.feed.url);

    let repository = Arc::new(InMemoryTradeRepository::new());
    let mut coordinator = IngestionCoordinator::new(config, repository);

    let monitor = coordinator.start().await?;

    // Periodic stats
    if let Some(query) = coordinator.query_service() {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));

            loop {
                interval.tick().await;

                let metrics = monitor.snapshot();
                log::info!(
                    "Feed {} | queue {}/{} | persisted {} | dropped {} | failed {}",
                    metrics.connection_state,
                    metrics.queue_size,
                    metrics.queue_capacity,
                    metrics.persisted_events,
                    metrics.dropped_events,
                    metrics.failed_events
                );

                match query.stats(Utc::now()).await {
                    Ok(stats) => log::info!(
                        "{} trades in the last hour: {}, total stored: {}",
                        stats.symbol,
                        stats.trades_last_hour,
                        stats.total_records
                    ),
                    Err(e) => log::error!("Failed to compute stats: {}", e),
                }
            }
        });
    }

    // Wait for shutdown signal
    log::info!("Ingesting trades. Press Ctrl+C to stop.");
    ctrl_c().await?;

    // Shutdown
    log::info!("Shutting down...");
    let outcome = coordinator.stop().await?;

    log::info!("Shutdown complete ({:?}). Goodbye!", outcome);
    Ok(())
}
