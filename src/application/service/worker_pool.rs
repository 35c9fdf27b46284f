// src/application/service/worker_pool.rs
// Fixed set of consumers persisting queued trades

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use futures_util::FutureExt;
use tokio::task::JoinHandle;

use super::event_queue::EventQueue;
use crate::application::usecase::TradePersistenceUseCase;
use crate::domain::errors::PipelineError;

/// Counters shared by every worker
#[derive(Debug, Default)]
pub struct WorkerStats {
    persisted: AtomicU64,
    failed: AtomicU64,
}

impl WorkerStats {
    pub fn persisted(&self) -> u64 {
        self.persisted.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// How the pool came down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every worker drained the queue and exited within the grace period
    Graceful,
    /// The grace period elapsed and the listed number of workers were aborted
    Forced { aborted: usize },
}

pub struct WorkerPool {
    queue: Arc<EventQueue>,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<WorkerStats>,
}

impl WorkerPool {
    /// Spawn `size` long-lived workers draining `queue`
    pub fn start(
        size: usize,
        queue: Arc<EventQueue>,
        persistence: Arc<dyn TradePersistenceUseCase>,
        stats: Arc<WorkerStats>,
    ) -> Self {
        let workers = (0..size.max(1))
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    queue.clone(),
                    persistence.clone(),
                    stats.clone(),
                ))
            })
            .collect();

        Self {
            queue,
            workers,
            stats,
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        self.stats.clone()
    }

    /// Close the queue, let workers drain it, and abort whoever is still
    /// running once `grace` has elapsed.
    pub async fn shutdown(mut self, grace: Duration) -> ShutdownOutcome {
        log::info!("Shutting down {} workers...", self.workers.len());
        self.queue.close();

        let deadline = tokio::time::Instant::now() + grace;
        let mut aborted = 0;

        for mut handle in self.workers.drain(..) {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::error!("Worker task ended abnormally: {}", e),
                Err(_) => {
                    handle.abort();
                    // Wait for the cancellation to land so nothing polls the queue afterwards
                    let _ = handle.await;
                    aborted += 1;
                }
            }
        }

        if aborted == 0 {
            log::info!("Worker pool shutdown complete");
            ShutdownOutcome::Graceful
        } else {
            log::warn!(
                "{}; aborted {} workers, {} events left unpersisted",
                PipelineError::ShutdownTimeout(grace),
                aborted,
                self.queue.size()
            );
            ShutdownOutcome::Forced { aborted }
        }
    }
}

async fn run_worker(
    worker_id: usize,
    queue: Arc<EventQueue>,
    persistence: Arc<dyn TradePersistenceUseCase>,
    stats: Arc<WorkerStats>,
) {
    log::info!("Starting worker {}", worker_id);

    while let Some(event) = queue.take_next().await {
        let label = format!("{}@{}", event.symbol(), event.event_time().timestamp_millis());

        // A panic inside the storage call must not take the worker down with it
        match AssertUnwindSafe(persistence.persist(event)).catch_unwind().await {
            Ok(Ok(record_id)) => {
                stats.persisted.fetch_add(1, Ordering::Relaxed);
                log::debug!("Worker {} saved trade {} as record {}", worker_id, label, record_id);
            }
            Ok(Err(e)) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                log::error!("Worker {} failed to persist trade {}: {}", worker_id, label, e);
            }
            Err(_) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                log::error!("Worker {} panicked while persisting trade {}", worker_id, label);
            }
        }
    }

    log::info!("Worker {} stopped", worker_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::service::SubmitOutcome;
    use crate::domain::errors::{StorageError, StorageResult};
    use crate::domain::model::{RecordId, TradeEvent};
    use async_trait::async_trait;
    use chrono::DateTime;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    fn event(symbol: &str, n: i64) -> TradeEvent {
        TradeEvent::new(
            symbol,
            dec!(100) + Decimal::from(n),
            dec!(0.5),
            DateTime::from_timestamp_millis(1_700_000_000_000 + n).unwrap(),
        )
        .unwrap()
    }

    /// Records what it is given; fails on "FAIL", panics on "PANIC", hangs on "HANG"
    #[derive(Default)]
    struct ScriptedPersistence {
        saved: Mutex<Vec<TradeEvent>>,
    }

    #[async_trait]
    impl TradePersistenceUseCase for ScriptedPersistence {
        async fn persist(&self, event: TradeEvent) -> StorageResult<RecordId> {
            match event.symbol() {
                "FAIL" => Err(StorageError::Rejected("scripted failure".into())),
                "PANIC" => panic!("scripted panic"),
                "HANG" => std::future::pending().await,
                _ => {
                    let mut saved = self.saved.lock().unwrap();
                    saved.push(event);
                    Ok(RecordId(saved.len() as u64))
                }
            }
        }
    }

    fn pool(
        size: usize,
        capacity: usize,
    ) -> (WorkerPool, Arc<EventQueue>, Arc<ScriptedPersistence>) {
        let queue = Arc::new(EventQueue::new(capacity));
        let persistence = Arc::new(ScriptedPersistence::default());
        let pool = WorkerPool::start(
            size,
            queue.clone(),
            persistence.clone(),
            Arc::new(WorkerStats::default()),
        );
        (pool, queue, persistence)
    }

    #[tokio::test]
    async fn persists_every_queued_event() {
        let (pool, queue, persistence) = pool(4, 100);
        for n in 0..50 {
            assert_eq!(queue.submit(event("BTCUSDT", n)), SubmitOutcome::Enqueued);
        }

        let stats = pool.stats();
        assert_eq!(pool.shutdown(Duration::from_secs(5)).await, ShutdownOutcome::Graceful);

        let mut saved = persistence.saved.lock().unwrap().clone();
        saved.sort_by_key(|e| e.event_time());
        let expected: Vec<_> = (0..50).map(|n| event("BTCUSDT", n)).collect();
        assert_eq!(saved, expected);
        assert_eq!(stats.persisted(), 50);
        assert_eq!(stats.failed(), 0);
    }

    #[tokio::test]
    async fn failures_do_not_stop_workers() {
        let (pool, queue, persistence) = pool(1, 10);
        queue.submit(event("BTCUSDT", 1));
        queue.submit(event("FAIL", 2));
        queue.submit(event("PANIC", 3));
        queue.submit(event("BTCUSDT", 4));

        let stats = pool.stats();
        assert_eq!(pool.shutdown(Duration::from_secs(5)).await, ShutdownOutcome::Graceful);

        let saved = persistence.saved.lock().unwrap().clone();
        assert_eq!(saved, vec![event("BTCUSDT", 1), event("BTCUSDT", 4)]);
        assert_eq!(stats.persisted(), 2);
        assert_eq!(stats.failed(), 2);
    }

    #[tokio::test]
    async fn idle_workers_exit_on_shutdown() {
        let (pool, queue, _) = pool(4, 10);
        assert_eq!(pool.size(), 4);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(pool.shutdown(Duration::from_secs(1)).await, ShutdownOutcome::Graceful);
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn stuck_workers_are_aborted_after_grace() {
        let (pool, queue, _) = pool(2, 10);
        queue.submit(event("HANG", 1));
        queue.submit(event("HANG", 2));
        tokio::time::sleep(Duration::from_millis(20)).await;

        let outcome = pool.shutdown(Duration::from_millis(50)).await;
        assert_eq!(outcome, ShutdownOutcome::Forced { aborted: 2 });
    }
}
