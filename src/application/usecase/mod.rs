pub mod persist_usecase;
pub mod query_usecase;

// Re-export public API
pub use persist_usecase::{TradePersistenceUseCase, TradeRecorder};
pub use query_usecase::MarketQueryService;
