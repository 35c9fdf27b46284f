// src/adapter/coordinator.rs
// Ingestion pipeline coordinator

use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use tokio::task::JoinHandle;

use crate::application::service::{
    EventQueue, PipelineMonitor, ShutdownOutcome, WorkerPool, WorkerStats,
};
use crate::application::usecase::{MarketQueryService, TradeRecorder};
use crate::config::Config;
use crate::domain::errors::{AppResult, PipelineError};
use crate::domain::repository::TradeRepository;
use crate::infrastructure::market::{FeedConnectionManager, FeedSettings};

struct RunningPipeline {
    feed: Arc<FeedConnectionManager>,
    workers: WorkerPool,
    monitor: PipelineMonitor,
    retention: Option<JoinHandle<()>>,
}

/// Wires feed, queue, workers and storage together and owns their lifecycle
pub struct IngestionCoordinator {
    config: Config,
    repository: Arc<dyn TradeRepository>,
    running: Option<RunningPipeline>,
}

impl IngestionCoordinator {
    pub fn new(config: Config, repository: Arc<dyn TradeRepository>) -> Self {
        Self {
            config,
            repository,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn monitor(&self) -> Option<PipelineMonitor> {
        self.running.as_ref().map(|running| running.monitor.clone())
    }

    /// Query surface bound to the running pipeline
    pub fn query_service(&self) -> Option<MarketQueryService> {
        self.monitor().map(|monitor| {
            MarketQueryService::new(
                self.repository.clone(),
                monitor,
                self.config.storage.stats_symbol.clone(),
            )
        })
    }

    /// Start workers, then connect to the feed.
    ///
    /// Fails if already running or if the first connection cannot be made;
    /// in the latter case the workers are stopped again before returning.
    pub async fn start(&mut self) -> AppResult<PipelineMonitor> {
        if self.running.is_some() {
            return Err(PipelineError::AlreadyRunning.into());
        }

        log::info!("Starting ingestion pipeline...");

        let pipeline = &self.config.pipeline;
        let queue = Arc::new(EventQueue::new(pipeline.queue_capacity));
        let stats = Arc::new(WorkerStats::default());
        let recorder = Arc::new(TradeRecorder::new(self.repository.clone()));
        let workers =
            WorkerPool::start(pipeline.worker_count, queue.clone(), recorder, stats.clone());
        log::info!(
            "Started {} workers (queue capacity {})",
            workers.size(),
            queue.capacity()
        );

        let settings = FeedSettings {
            url: self.config.feed.url.clone(),
            reconnect_delay: self.config.feed.reconnect_delay(),
            handshake_timeout: self.config.feed.handshake_timeout(),
        };
        let feed = Arc::new(FeedConnectionManager::new(settings, queue.clone()));

        if let Err(e) = feed.connect().await {
            log::error!("Initial feed connection failed: {}", e);
            feed.disconnect().await;
            workers.shutdown(pipeline.shutdown_grace()).await;
            return Err(e.into());
        }

        let monitor = PipelineMonitor::new(queue, stats, feed.status());

        let retention = self.config.storage.retention().map(|retention| {
            let service = MarketQueryService::new(
                self.repository.clone(),
                monitor.clone(),
                self.config.storage.stats_symbol.clone(),
            );
            spawn_retention(service, retention, self.config.storage.retention_sweep())
        });

        self.running = Some(RunningPipeline {
            feed,
            workers,
            monitor: monitor.clone(),
            retention,
        });

        log::info!("Ingestion pipeline started");
        Ok(monitor)
    }

    /// Disconnect the feed, then drain the queue within the configured grace period
    pub async fn stop(&mut self) -> AppResult<ShutdownOutcome> {
        let running = self.running.take().ok_or(PipelineError::NotRunning)?;

        log::info!("Stopping ingestion pipeline...");

        running.feed.disconnect().await;

        if let Some(retention) = running.retention {
            retention.abort();
        }

        let outcome = running
            .workers
            .shutdown(self.config.pipeline.shutdown_grace())
            .await;

        let metrics = running.monitor.snapshot();
        log::info!(
            "Ingestion pipeline stopped: {} persisted, {} failed, {} dropped",
            metrics.persisted_events,
            metrics.failed_events,
            metrics.dropped_events
        );

        Ok(outcome)
    }
}

fn spawn_retention(
    service: MarketQueryService,
    retention: chrono::Duration,
    sweep: Duration,
) -> JoinHandle<()> {
    log::info!("Retention enabled: keeping {} hours of trades", retention.num_hours());

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep);
        loop {
            interval.tick().await;
            let cutoff = Utc::now() - retention;
            if let Err(e) = service.purge_older_than(cutoff).await {
                log::error!("Retention sweep failed: {}", e);
            }
        }
    })
}
