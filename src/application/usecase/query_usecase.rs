// src/application/usecase/query_usecase.rs
// Read-side queries over stored trades and pipeline metrics

use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};

use crate::application::dto::MarketStats;
use crate::application::service::PipelineMonitor;
use crate::domain::errors::StorageResult;
use crate::domain::model::StoredTrade;
use crate::domain::repository::TradeRepository;

/// Query surface consumed by an API layer.
///
/// Never mutates pipeline state; `purge_older_than` only touches storage.
#[derive(Clone)]
pub struct MarketQueryService {
    repository: Arc<dyn TradeRepository>,
    monitor: PipelineMonitor,
    stats_symbol: String,
}

impl MarketQueryService {
    pub fn new(
        repository: Arc<dyn TradeRepository>,
        monitor: PipelineMonitor,
        stats_symbol: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            monitor,
            stats_symbol: stats_symbol.into(),
        }
    }

    /// All trades for a symbol, newest first
    pub async fn recent_trades(&self, symbol: &str) -> StorageResult<Vec<StoredTrade>> {
        self.repository.find_by_symbol_order_by_time_desc(symbol).await
    }

    /// Trades for a symbol at or after `since`, newest first
    pub async fn trades_since(
        &self,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<StoredTrade>> {
        self.repository.find_by_symbol_since(symbol, since).await
    }

    pub async fn stats(&self, now: DateTime<Utc>) -> StorageResult<MarketStats> {
        let one_hour_ago = now - Duration::hours(1);
        let trades_last_hour = self
            .repository
            .count_since(&self.stats_symbol, one_hour_ago)
            .await?;
        let total_records = self.repository.count().await?;

        Ok(MarketStats {
            queue_size: self.monitor.queue_size(),
            is_queue_full: self.monitor.is_queue_full(),
            symbol: self.stats_symbol.clone(),
            trades_last_hour,
            total_records,
        })
    }

    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        let removed = self.repository.delete_older_than(cutoff).await?;
        if removed > 0 {
            log::info!("Purged {} trades older than {}", removed, cutoff);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::service::{EventQueue, FeedStatus, WorkerStats};
    use crate::domain::model::{TradeEvent, TradeRecord};
    use crate::infrastructure::persistence::InMemoryTradeRepository;
    use rust_decimal_macros::dec;

    async fn seeded() -> (MarketQueryService, Arc<InMemoryTradeRepository>, DateTime<Utc>) {
        let repository = Arc::new(InMemoryTradeRepository::new());
        let now = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();

        let seeds = [("BTCUSDT", 90), ("BTCUSDT", 30), ("BTCUSDT", 5), ("ETHUSDT", 10)];
        for (symbol, minutes_ago) in seeds {
            let event_time = now - Duration::minutes(minutes_ago);
            let event = TradeEvent::new(symbol, dec!(10), dec!(1), event_time).unwrap();
            repository.save(TradeRecord::from_event(event, now)).await.unwrap();
        }

        let queue = Arc::new(EventQueue::new(2));
        let workers = Arc::new(WorkerStats::default());
        let monitor = PipelineMonitor::new(queue, workers, FeedStatus::detached());
        let service = MarketQueryService::new(repository.clone(), monitor, "BTCUSDT");
        (service, repository, now)
    }

    #[tokio::test]
    async fn stats_count_last_hour_for_symbol() {
        let (service, _, now) = seeded().await;
        let stats = service.stats(now).await.unwrap();

        assert_eq!(stats.symbol, "BTCUSDT");
        assert_eq!(stats.trades_last_hour, 2);
        assert_eq!(stats.total_records, 4);
        assert_eq!(stats.queue_size, 0);
        assert!(!stats.is_queue_full);
    }

    #[tokio::test]
    async fn trades_since_is_newest_first() {
        let (service, _, now) = seeded().await;
        let trades = service
            .trades_since("BTCUSDT", now - Duration::minutes(60))
            .await
            .unwrap();

        assert_eq!(trades.len(), 2);
        assert!(trades[0].record.event_time > trades[1].record.event_time);
    }

    #[tokio::test]
    async fn purge_removes_old_trades() {
        let (service, repository, now) = seeded().await;
        let removed = service.purge_older_than(now - Duration::minutes(60)).await.unwrap();

        assert_eq!(removed, 1);
        assert_eq!(repository.count().await.unwrap(), 3);
        assert_eq!(service.recent_trades("BTCUSDT").await.unwrap().len(), 2);
    }
}
