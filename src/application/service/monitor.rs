// src/application/service/monitor.rs
// Read-only views over the running pipeline

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use super::event_queue::EventQueue;
use super::worker_pool::WorkerStats;
use crate::application::dto::PipelineMetrics;
use crate::domain::model::ConnectionState;

/// Counters maintained by the feed connection
#[derive(Debug, Default)]
pub struct FeedStats {
    frames_received: AtomicU64,
    trades_submitted: AtomicU64,
    parse_failures: AtomicU64,
    reconnect_attempts: AtomicU64,
}

impl FeedStats {
    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    /// Trades accepted by the queue (drops excluded)
    pub fn trades_submitted(&self) -> u64 {
        self.trades_submitted.load(Ordering::Relaxed)
    }

    pub fn parse_failures(&self) -> u64 {
        self.parse_failures.load(Ordering::Relaxed)
    }

    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    pub(crate) fn record_frame(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_submitted(&self) {
        self.trades_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_parse_failure(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reconnect_attempt(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }
}

/// Connection state plus counters, as published by the feed connection
#[derive(Debug, Clone)]
pub struct FeedStatus {
    state: watch::Receiver<ConnectionState>,
    stats: Arc<FeedStats>,
}

impl FeedStatus {
    pub fn new(state: watch::Receiver<ConnectionState>, stats: Arc<FeedStats>) -> Self {
        Self { state, stats }
    }

    /// A status that is permanently `Disconnected` with zeroed counters
    pub fn detached() -> Self {
        let (_, state) = watch::channel(ConnectionState::Disconnected);
        Self::new(state, Arc::new(FeedStats::default()))
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn stats(&self) -> &FeedStats {
        &self.stats
    }
}

/// Cheap, cloneable view over a running pipeline
#[derive(Debug, Clone)]
pub struct PipelineMonitor {
    queue: Arc<EventQueue>,
    workers: Arc<WorkerStats>,
    feed: FeedStatus,
}

impl PipelineMonitor {
    pub fn new(queue: Arc<EventQueue>, workers: Arc<WorkerStats>, feed: FeedStatus) -> Self {
        Self { queue, workers, feed }
    }

    pub fn queue_size(&self) -> usize {
        self.queue.size()
    }

    pub fn is_queue_full(&self) -> bool {
        self.queue.is_full()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.feed.state()
    }

    pub fn snapshot(&self) -> PipelineMetrics {
        let feed = self.feed.stats();

        PipelineMetrics {
            queue_size: self.queue.size(),
            queue_capacity: self.queue.capacity(),
            is_queue_full: self.queue.is_full(),
            dropped_events: self.queue.dropped_count(),
            persisted_events: self.workers.persisted(),
            failed_events: self.workers.failed(),
            connection_state: self.feed.state(),
            reconnect_attempts: feed.reconnect_attempts(),
            frames_received: feed.frames_received(),
            parse_failures: feed.parse_failures(),
        }
    }
}
