// src/domain/mod.rs
pub mod errors;
pub mod model;
pub mod repository;

// Re-export common types for convenience
pub use errors::{
    AppError, AppResult, ConnectionError, ConnectionResult, ParseError, ParseResult, PipelineError,
    StorageError, StorageResult,
};
pub use model::{ConnectionState, DomainError, RecordId, StoredTrade, TradeEvent, TradeRecord};
pub use repository::TradeRepository;
