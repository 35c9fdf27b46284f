// src/application/usecase/persist_usecase.rs
// Trade persistence use case

use std::sync::Arc;
use async_trait::async_trait;
use chrono::Utc;

use crate::domain::errors::StorageResult;
use crate::domain::model::{RecordId, TradeEvent, TradeRecord};
use crate::domain::repository::TradeRepository;

/// Persist a single dequeued trade
#[async_trait]
pub trait TradePersistenceUseCase: Send + Sync {
    async fn persist(&self, event: TradeEvent) -> StorageResult<RecordId>;
}

pub struct TradeRecorder {
    repository: Arc<dyn TradeRepository>,
}

impl TradeRecorder {
    pub fn new(repository: Arc<dyn TradeRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl TradePersistenceUseCase for TradeRecorder {
    async fn persist(&self, event: TradeEvent) -> StorageResult<RecordId> {
        // created_at follows processing order, not feed order
        let record = TradeRecord::from_event(event, Utc::now());
        self.repository.save(record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::InMemoryTradeRepository;
    use chrono::DateTime;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn stamps_creation_time_on_save() {
        let repository = Arc::new(InMemoryTradeRepository::new());
        let recorder = TradeRecorder::new(repository.clone());
        let event_time = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let before = Utc::now();

        let event = TradeEvent::new("BTCUSDT", dec!(65000.5), dec!(0.0123), event_time).unwrap();
        let id = recorder.persist(event).await.unwrap();

        let stored = repository.find_by_symbol_order_by_time_desc("BTCUSDT").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, id);
        assert_eq!(stored[0].record.event_time, event_time);
        assert!(stored[0].record.created_at >= before);
    }
}
