// src/domain/repository/mod.rs
// Repository interfaces for domain entities

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::StorageResult;
use crate::domain::model::{RecordId, StoredTrade, TradeRecord};

/// Storage engine for persisted trades.
///
/// Implementations must tolerate concurrent `save` calls from every worker;
/// the pipeline takes no lock around persistence.
#[async_trait]
pub trait TradeRepository: Send + Sync {
    async fn save(&self, record: TradeRecord) -> StorageResult<RecordId>;

    /// All trades for a symbol, newest event first
    async fn find_by_symbol_order_by_time_desc(
        &self,
        symbol: &str,
    ) -> StorageResult<Vec<StoredTrade>>;

    /// Trades for a symbol with `event_time >= since`, newest event first
    async fn find_by_symbol_since(
        &self,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<StoredTrade>>;

    async fn count_since(&self, symbol: &str, since: DateTime<Utc>) -> StorageResult<u64>;

    async fn count(&self) -> StorageResult<u64>;

    /// Remove trades with `event_time < cutoff`, returning how many went
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> StorageResult<u64>;
}
