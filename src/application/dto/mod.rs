// src/application/dto/mod.rs
// Wire frames and read-side views

pub mod parser;

use serde::{Deserialize, Serialize};

use crate::domain::model::ConnectionState;

/// Binance trade stream payload.
///
/// The event type (`e`) is checked by the parser before deserializing;
/// other unknown keys (`E`, `t`, `m`, ...) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeFrame {
    /// Symbol
    #[serde(rename = "s")]
    pub symbol: String,

    /// Price, decimal as string
    #[serde(rename = "p")]
    pub price: String,

    /// Quantity, decimal as string
    #[serde(rename = "q")]
    pub quantity: String,

    /// Trade time, epoch milliseconds
    #[serde(rename = "T")]
    pub trade_time: i64,
}

/// Point-in-time view of the ingestion pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineMetrics {
    pub queue_size: usize,
    pub queue_capacity: usize,
    pub is_queue_full: bool,
    pub dropped_events: u64,
    pub persisted_events: u64,
    pub failed_events: u64,
    pub connection_state: ConnectionState,
    pub reconnect_attempts: u64,
    pub frames_received: u64,
    pub parse_failures: u64,
}

/// Summary served to the query surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketStats {
    pub queue_size: usize,
    pub is_queue_full: bool,
    pub symbol: String,
    pub trades_last_hour: u64,
    pub total_records: u64,
}
