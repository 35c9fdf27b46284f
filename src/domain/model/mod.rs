// src/domain/model/mod.rs
// Core domain models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single trade as received from the feed.
///
/// Only constructible through [`TradeEvent::new`], which enforces a
/// non-empty symbol and strictly positive price and quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeEvent {
    symbol: String,
    price: Decimal,
    quantity: Decimal,
    event_time: DateTime<Utc>,
}

impl TradeEvent {
    pub fn new(
        symbol: impl Into<String>,
        price: Decimal,
        quantity: Decimal,
        event_time: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(DomainError::InvalidTrade("symbol is empty".into()));
        }
        if price <= Decimal::ZERO {
            return Err(DomainError::InvalidTrade(format!("price must be positive, got {}", price)));
        }
        if quantity <= Decimal::ZERO {
            return Err(DomainError::InvalidTrade(format!(
                "quantity must be positive, got {}",
                quantity
            )));
        }

        Ok(Self {
            symbol,
            price,
            quantity,
            event_time,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    /// Feed-supplied trade time. May lag arrival time.
    pub fn event_time(&self) -> DateTime<Utc> {
        self.event_time
    }
}

impl fmt::Display for TradeEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} @ {} ({})",
            self.symbol, self.quantity, self.price, self.event_time
        )
    }
}

/// Identifier assigned by the storage engine on save
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A trade ready to be persisted.
///
/// `created_at` is stamped by the worker that persists the event, so it
/// follows local processing order rather than feed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub event_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl TradeRecord {
    pub fn from_event(event: TradeEvent, created_at: DateTime<Utc>) -> Self {
        Self {
            symbol: event.symbol,
            price: event.price,
            quantity: event.quantity,
            event_time: event.event_time,
            created_at,
        }
    }
}

/// A persisted trade as returned by repository queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTrade {
    pub id: RecordId,
    #[serde(flatten)]
    pub record: TradeRecord,
}

/// Lifecycle of the single feed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "DISCONNECTED"),
            ConnectionState::Connecting => write!(f, "CONNECTING"),
            ConnectionState::Connected => write!(f, "CONNECTED"),
            ConnectionState::Closing => write!(f, "CLOSING"),
        }
    }
}

// Domain-level errors
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Invalid trade: {0}")]
    InvalidTrade(String),
}
