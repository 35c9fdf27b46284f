// src/infrastructure/persistence/mod.rs
// In-process trade store

use std::sync::atomic::{AtomicU64, Ordering};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::errors::StorageResult;
use crate::domain::model::{RecordId, StoredTrade, TradeRecord};
use crate::domain::repository::TradeRepository;

/// Volatile repository backed by a vector behind an async RwLock.
///
/// Ids are assigned from a monotonic counter starting at 1.
#[derive(Debug)]
pub struct InMemoryTradeRepository {
    trades: RwLock<Vec<StoredTrade>>,
    next_id: AtomicU64,
}

impl InMemoryTradeRepository {
    pub fn new() -> Self {
        Self {
            trades: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    async fn select<F>(&self, predicate: F) -> Vec<StoredTrade>
    where
        F: Fn(&TradeRecord) -> bool,
    {
        let trades = self.trades.read().await;
        let mut selected: Vec<StoredTrade> = trades
            .iter()
            .filter(|trade| predicate(&trade.record))
            .cloned()
            .collect();

        // Newest event first; ties broken by id for a stable order
        selected.sort_by(|a, b| {
            b.record
                .event_time
                .cmp(&a.record.event_time)
                .then_with(|| b.id.cmp(&a.id))
        });
        selected
    }
}

impl Default for InMemoryTradeRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TradeRepository for InMemoryTradeRepository {
    async fn save(&self, record: TradeRecord) -> StorageResult<RecordId> {
        let id = RecordId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.trades.write().await.push(StoredTrade { id, record });
        Ok(id)
    }

    async fn find_by_symbol_order_by_time_desc(
        &self,
        symbol: &str,
    ) -> StorageResult<Vec<StoredTrade>> {
        Ok(self.select(|record| record.symbol == symbol).await)
    }

    async fn find_by_symbol_since(
        &self,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<StoredTrade>> {
        Ok(self
            .select(|record| record.symbol == symbol && record.event_time >= since)
            .await)
    }

    async fn count_since(&self, symbol: &str, since: DateTime<Utc>) -> StorageResult<u64> {
        let trades = self.trades.read().await;
        let count = trades
            .iter()
            .filter(|trade| trade.record.symbol == symbol && trade.record.event_time >= since)
            .count();
        Ok(count as u64)
    }

    async fn count(&self) -> StorageResult<u64> {
        Ok(self.trades.read().await.len() as u64)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        let mut trades = self.trades.write().await;
        let before = trades.len();
        trades.retain(|trade| trade.record.event_time >= cutoff);
        Ok((before - trades.len()) as u64)
    }
}
