// src/domain/errors.rs
use std::time::Duration;
use thiserror::Error;

use crate::domain::model::DomainError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures establishing or driving the feed connection
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Connection attempt rejected while {0}")]
    InvalidState(String),

    #[error("Connection manager has been shut down")]
    ShutDown,
}

/// Reasons a feed frame could not be turned into a trade event.
///
/// Always handled where the frame is received: logged, counted, dropped.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame is not valid UTF-8")]
    NotUtf8,

    #[error("Invalid {field} value: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Invalid trade timestamp: {0}")]
    InvalidTimestamp(i64),

    #[error("Invalid trade: {0}")]
    InvalidTrade(#[from] DomainError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Record rejected: {0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Pipeline is already running")]
    AlreadyRunning,

    #[error("Pipeline is not running")]
    NotRunning,

    #[error("Workers did not drain within {0:?}")]
    ShutdownTimeout(Duration),
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
pub type ConnectionResult<T> = Result<T, ConnectionError>;
pub type ParseResult<T> = Result<T, ParseError>;
pub type StorageResult<T> = Result<T, StorageError>;
